//! Uniswap V2 constant product math with exact decimal arithmetic
//!
//! Fees are expressed as the multiplier γ applied to the input amount
//! (0.997 for a 0.3% pool). Every operation is overflow-checked and reports
//! [`AmmError::ArithmeticOverflow`] instead of panicking.

use crate::error::{AmmError, AmmResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Basis points in one whole
const BPS_DENOMINATOR: u32 = 10_000;

/// V2 AMM math functions with zero binary floating-point drift
pub struct V2Math;

impl V2Math {
    /// Convert a fee in basis points into the input multiplier γ
    ///
    /// `30` bps becomes `0.997`. Values above 10 000 bps are rejected.
    pub fn fee_multiplier_from_bps(fee_bps: u32) -> AmmResult<Decimal> {
        if fee_bps >= BPS_DENOMINATOR {
            return Err(AmmError::InvalidFee {
                fee: Decimal::from(BPS_DENOMINATOR as i64 - fee_bps as i64)
                    / Decimal::from(BPS_DENOMINATOR),
            });
        }
        Ok(Decimal::from(BPS_DENOMINATOR - fee_bps) / Decimal::from(BPS_DENOMINATOR))
    }

    /// Calculate exact output amount for the x*y=k formula
    ///
    /// # Arguments
    /// * `amount_in` - Input token amount
    /// * `reserve_in` - Input token reserve
    /// * `reserve_out` - Output token reserve
    /// * `fee` - Input multiplier γ in (0, 1]
    ///
    /// # Returns
    /// `reserve_out * γ·amount_in / (reserve_in + γ·amount_in)`
    pub fn calculate_output_amount(
        amount_in: Decimal,
        reserve_in: Decimal,
        reserve_out: Decimal,
        fee: Decimal,
    ) -> AmmResult<Decimal> {
        if amount_in <= dec!(0) {
            return Err(AmmError::InvalidAmount {
                amount: amount_in,
                operation: "swap",
            });
        }
        if reserve_in <= dec!(0) || reserve_out <= dec!(0) {
            return Err(AmmError::InvalidReserve {
                reserve_a: reserve_in,
                reserve_b: reserve_out,
            });
        }

        Self::raw_output_amount(amount_in, reserve_in, reserve_out, fee)
    }

    /// Output formula without input validation, used by the profit model
    /// where a zero input is a legitimate evaluation point
    pub(crate) fn raw_output_amount(
        amount_in: Decimal,
        reserve_in: Decimal,
        reserve_out: Decimal,
        fee: Decimal,
    ) -> AmmResult<Decimal> {
        let amount_in_after_fee = checked_mul(amount_in, fee, "fee application")?;
        let denominator = reserve_in
            .checked_add(amount_in_after_fee)
            .ok_or(AmmError::ArithmeticOverflow {
                context: "output denominator",
            })?;

        // Share of reserve_out first, so 18-decimal base-unit reserves
        // never form a product beyond Decimal range
        let share = checked_div(amount_in_after_fee, denominator, "output share")?;
        checked_mul(reserve_out, share, "output amount")
    }

    /// Calculate required input amount for a desired output (reverse calculation)
    pub fn calculate_input_amount(
        amount_out: Decimal,
        reserve_in: Decimal,
        reserve_out: Decimal,
        fee: Decimal,
    ) -> AmmResult<Decimal> {
        if amount_out <= dec!(0) {
            return Err(AmmError::InvalidAmount {
                amount: amount_out,
                operation: "reverse quote",
            });
        }
        if amount_out >= reserve_out {
            return Err(AmmError::InsufficientReserves {
                amount_a: dec!(0),
                amount_b: amount_out,
                reserve_a: reserve_in,
                reserve_b: reserve_out,
            });
        }

        // amount_in = reserve_in * amount_out / ((reserve_out - amount_out) * γ)
        let numerator = checked_mul(reserve_in, amount_out, "input numerator")?;
        let denominator = checked_mul(reserve_out - amount_out, fee, "input denominator")?;

        checked_div(numerator, denominator, "input division")
    }

    /// Calculate square root of a Decimal using Newton's method
    pub fn decimal_sqrt(value: Decimal) -> AmmResult<Decimal> {
        if value < dec!(0) {
            return Err(AmmError::InvalidAmount {
                amount: value,
                operation: "square root",
            });
        }
        if value == dec!(0) {
            return Ok(dec!(0));
        }

        let mut x = if value > dec!(1) { value / dec!(2) } else { dec!(1) };
        let epsilon = dec!(0.000000000000000001);

        // Newton's method: x_new = (x + value/x) / 2
        let max_iterations = 200;
        for _ in 0..max_iterations {
            let next_x = (x + checked_div(value, x, "square root step")?) / dec!(2);

            if (next_x - x).abs() <= epsilon * next_x.max(dec!(1)) {
                return Ok(next_x);
            }

            x = next_x;
        }

        // Return best approximation if not fully converged
        Ok(x)
    }
}

pub(crate) fn checked_mul(a: Decimal, b: Decimal, context: &'static str) -> AmmResult<Decimal> {
    a.checked_mul(b)
        .ok_or(AmmError::ArithmeticOverflow { context })
}

pub(crate) fn checked_div(a: Decimal, b: Decimal, context: &'static str) -> AmmResult<Decimal> {
    a.checked_div(b)
        .ok_or(AmmError::ArithmeticOverflow { context })
}
