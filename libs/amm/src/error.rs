//! Error taxonomy for pool mechanics and arbitrage sizing
//!
//! Every variant reflects either a caller contract violation or a genuine
//! absence of opportunity. Nothing here is retryable: errors are raised at
//! the offending call and carry the values that caused them.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by [`Pool`](crate::Pool), the profit model and the optimizer
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmmError {
    /// A reserve was zero or negative at construction
    #[error("Invalid reserves: both must be positive, got reserve_a={reserve_a}, reserve_b={reserve_b}")]
    InvalidReserve {
        reserve_a: Decimal,
        reserve_b: Decimal,
    },

    /// Fee multiplier outside (0, 1]
    #[error("Invalid fee multiplier {fee}: must be in (0, 1] (0.997 = 0.3% fee)")]
    InvalidFee { fee: Decimal },

    /// Swap or liquidity amount was zero or negative
    #[error("Invalid amount {amount} for {operation}: must be positive")]
    InvalidAmount {
        amount: Decimal,
        operation: &'static str,
    },

    /// Liquidity amounts not proportional to the current reserves
    #[error("Invalid ratio: {amount_a}/{amount_b} does not match reserves {reserve_a}/{reserve_b} (tolerance {tolerance})")]
    InvalidRatio {
        amount_a: Decimal,
        amount_b: Decimal,
        reserve_a: Decimal,
        reserve_b: Decimal,
        tolerance: Decimal,
    },

    /// Removal would drain a reserve to zero or below
    #[error("Insufficient reserves: removing {amount_a}/{amount_b} from {reserve_a}/{reserve_b} would leave a reserve at or below zero")]
    InsufficientReserves {
        amount_a: Decimal,
        amount_b: Decimal,
        reserve_a: Decimal,
        reserve_b: Decimal,
    },

    /// The two pools do not quote the same asset pair
    #[error("Asset mismatch: pool quotes {first} but counterpart quotes {second}")]
    AssetMismatch { first: String, second: String },

    /// The search interval for the trade size is empty
    #[error("No feasible trade domain: upper bound {upper_bound} is not positive")]
    NoFeasibleDomain { upper_bound: Decimal },

    /// Golden-section search hit its iteration cap before the bracket closed
    #[error("Optimization did not converge after {iterations} iterations (bracket width {width}, target {target})")]
    OptimizationDidNotConverge {
        iterations: u32,
        width: Decimal,
        target: Decimal,
    },

    /// Post-swap product fell below the pre-swap product beyond epsilon
    #[error("Invariant violation: k changed by factor {k_ratio}, below 1 - {epsilon}")]
    InvariantViolation { k_ratio: Decimal, epsilon: Decimal },

    /// Decimal arithmetic exceeded its representable range
    #[error("Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    /// A plain number could not be represented as a Decimal
    #[error("Cannot represent {value} as a decimal quantity")]
    NonFiniteInput { value: f64 },
}

/// Result alias used throughout the crate
pub type AmmResult<T> = Result<T, AmmError>;
