//! Pool trait definitions for a uniform quoting interface

use crate::error::AmmResult;
use crate::pool::{Pool, SwapDirection};
use crate::v2_math::V2Math;
use rust_decimal::Decimal;

/// Read-only view of a constant product pool used by the profit model
pub trait AmmPool {
    /// Calculate output amount for given input
    fn get_amount_out(&self, amount_in: Decimal, direction: SwapDirection) -> AmmResult<Decimal>;

    /// Calculate required input for desired output
    fn get_amount_in(&self, amount_out: Decimal, direction: SwapDirection) -> AmmResult<Decimal>;

    /// Get current reserves as (reserve_a, reserve_b)
    fn get_liquidity(&self) -> (Decimal, Decimal);

    /// Get fee multiplier γ
    fn get_fee(&self) -> Decimal;
}

impl AmmPool for Pool {
    fn get_amount_out(&self, amount_in: Decimal, direction: SwapDirection) -> AmmResult<Decimal> {
        self.quote(amount_in, direction)
    }

    fn get_amount_in(&self, amount_out: Decimal, direction: SwapDirection) -> AmmResult<Decimal> {
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        V2Math::calculate_input_amount(amount_out, reserve_in, reserve_out, self.fee())
    }

    fn get_liquidity(&self) -> (Decimal, Decimal) {
        (self.reserve_a(), self.reserve_b())
    }

    fn get_fee(&self) -> Decimal {
        self.fee()
    }
}
