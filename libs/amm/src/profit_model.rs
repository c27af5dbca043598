//! Two-pool arbitrage profit function
//!
//! The strategy sells `y` units of the bridge asset (B) into the *buy* pool,
//! where asset A is cheapest, and sells the A received into the *sell* pool
//! for B. With buy reserves `X1, Y1`, sell reserves `X2, Y2` and fee
//! multipliers `γ1, γ2`:
//!
//! ```text
//! a_out(y)  = X1 - k1 / (Y1 + γ1·y)
//! b_out(d)  = Y2 - k2 / (X2 + γ2·d)
//! profit(y) = b_out(a_out(y)) - y
//! ```
//!
//! The composition collapses to `a·y / (b + c·y) - y` with
//! `a = γ1γ2·X1·Y2`, `b = Y1·X2`, `c = γ1·X2 + γ1γ2·X1`, which is strictly
//! concave on `y >= 0`.
//!
//! The coefficients are products of reserves. [`ReserveScale`] moves both
//! legs into power-of-ten units first, so pools quoted in 18-decimal base
//! units stay inside Decimal range; profit is homogeneous in each asset's
//! unit, so the located optimum scales back exactly.

use crate::error::{AmmError, AmmResult};
use crate::pool_traits::AmmPool;
use crate::v2_math::{checked_div, checked_mul, V2Math};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Reserve snapshot of one leg: asset A, bridge asset B and fee multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegReserves {
    pub reserve_a: Decimal,
    pub reserve_b: Decimal,
    pub fee: Decimal,
}

impl LegReserves {
    pub fn new(reserve_a: Decimal, reserve_b: Decimal, fee: Decimal) -> Self {
        Self {
            reserve_a,
            reserve_b,
            fee,
        }
    }

    pub fn from_pool(pool: &dyn AmmPool) -> Self {
        let (reserve_a, reserve_b) = pool.get_liquidity();
        Self::new(reserve_a, reserve_b, pool.get_fee())
    }

    fn is_valid(&self) -> bool {
        self.reserve_a > dec!(0)
            && self.reserve_b > dec!(0)
            && self.fee > dec!(0)
            && self.fee <= dec!(1)
    }
}

/// Reserves above this are expressed in a coarser power-of-ten unit
const MAX_NORMALIZED_RESERVE: Decimal = dec!(1_000_000_000_000);

/// Power-of-ten units for asset A and the bridge asset B
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReserveScale {
    pub unit_a: Decimal,
    pub unit_b: Decimal,
}

impl ReserveScale {
    /// Smallest units that bring every reserve of both legs to at most 1e12
    ///
    /// Legs with reserves at or below 1e12 keep unit 1, so ordinary pools
    /// are evaluated exactly as given.
    pub fn for_legs(first: &LegReserves, second: &LegReserves) -> AmmResult<Self> {
        Ok(Self {
            unit_a: power_of_ten_unit(first.reserve_a.max(second.reserve_a))?,
            unit_b: power_of_ten_unit(first.reserve_b.max(second.reserve_b))?,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.unit_a == dec!(1) && self.unit_b == dec!(1)
    }

    /// Express a leg in scaled units
    pub fn normalize(&self, leg: &LegReserves) -> AmmResult<LegReserves> {
        Ok(LegReserves::new(
            checked_div(leg.reserve_a, self.unit_a, "normalize reserve A")?,
            checked_div(leg.reserve_b, self.unit_b, "normalize reserve B")?,
            leg.fee,
        ))
    }

    /// Scaled asset A amount back in pool units
    pub fn asset_a_amount(&self, scaled: Decimal) -> AmmResult<Decimal> {
        checked_mul(scaled, self.unit_a, "denormalize asset A")
    }

    /// Scaled bridge amount back in pool units
    pub fn bridge_amount(&self, scaled: Decimal) -> AmmResult<Decimal> {
        checked_mul(scaled, self.unit_b, "denormalize bridge asset")
    }
}

fn power_of_ten_unit(largest: Decimal) -> AmmResult<Decimal> {
    let mut unit = dec!(1);
    while checked_div(largest, unit, "reserve scale")? > MAX_NORMALIZED_RESERVE {
        unit = checked_mul(unit, dec!(10), "reserve scale")?;
    }
    Ok(unit)
}

/// Closed-form coefficients of `profit(y) = a·y / (b + c·y) - y`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitCoefficients {
    pub a: Decimal,
    pub b: Decimal,
    pub c: Decimal,
}

/// Pure profit function over explicit reserve snapshots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitModel {
    buy: LegReserves,
    sell: LegReserves,
}

impl ProfitModel {
    /// Build from raw reserves. No validation happens here: a malformed
    /// model simply has no feasible domain.
    pub fn new(buy: LegReserves, sell: LegReserves) -> Self {
        Self { buy, sell }
    }

    /// Build from two pools already expressed in the same asset order
    pub fn from_pools(buy: &dyn AmmPool, sell: &dyn AmmPool) -> Self {
        Self::new(LegReserves::from_pool(buy), LegReserves::from_pool(sell))
    }

    pub fn buy_leg(&self) -> LegReserves {
        self.buy
    }

    pub fn sell_leg(&self) -> LegReserves {
        self.sell
    }

    /// All reserves positive and both fees in (0, 1]
    pub fn is_well_formed(&self) -> bool {
        self.buy.is_valid() && self.sell.is_valid()
    }

    /// Asset A received for selling `y` of B into the buy pool
    pub fn first_leg_out(&self, y: Decimal) -> Option<Decimal> {
        if y < dec!(0) || !self.is_well_formed() {
            return None;
        }
        let out =
            V2Math::raw_output_amount(y, self.buy.reserve_b, self.buy.reserve_a, self.buy.fee)
                .ok()?;
        (out < self.buy.reserve_a).then_some(out)
    }

    /// Asset B received for selling `d` of A into the sell pool
    pub fn second_leg_out(&self, d: Decimal) -> Option<Decimal> {
        if d < dec!(0) || !self.is_well_formed() {
            return None;
        }
        let out =
            V2Math::raw_output_amount(d, self.sell.reserve_a, self.sell.reserve_b, self.sell.fee)
                .ok()?;
        (out < self.sell.reserve_b).then_some(out)
    }

    /// Net bridge-asset profit of trading `y`
    ///
    /// `None` outside the feasible domain (negative input, drained leg,
    /// malformed reserves or overflow); the optimizer ranks it below every
    /// real value. `evaluate(0)` is exactly zero.
    pub fn evaluate(&self, y: Decimal) -> Option<Decimal> {
        let a_out = self.first_leg_out(y)?;
        let b_out = self.second_leg_out(a_out)?;
        Some(b_out - y)
    }

    pub fn coefficients(&self) -> AmmResult<ProfitCoefficients> {
        if !self.is_well_formed() {
            return Err(AmmError::NoFeasibleDomain {
                upper_bound: self.sell.reserve_b.min(dec!(0)),
            });
        }
        let fees = checked_mul(self.buy.fee, self.sell.fee, "fee product")?;
        let a = checked_mul(
            checked_mul(fees, self.buy.reserve_a, "coefficient a")?,
            self.sell.reserve_b,
            "coefficient a",
        )?;
        let b = checked_mul(self.buy.reserve_b, self.sell.reserve_a, "coefficient b")?;
        let c = checked_mul(self.buy.fee, self.sell.reserve_a, "coefficient c")?
            .checked_add(checked_mul(fees, self.buy.reserve_a, "coefficient c")?)
            .ok_or(AmmError::ArithmeticOverflow {
                context: "coefficient c",
            })?;
        Ok(ProfitCoefficients { a, b, c })
    }

    /// `profit'(0) = a/b - 1`; positive iff trading in this direction pays
    pub fn marginal_profit_at_zero(&self) -> AmmResult<Decimal> {
        let ProfitCoefficients { a, b, .. } = self.coefficients()?;
        Ok(checked_div(a, b, "marginal profit")? - dec!(1))
    }

    /// Positive root of `profit(y) = 0`, if any
    pub fn break_even(&self) -> AmmResult<Option<Decimal>> {
        let ProfitCoefficients { a, b, c } = self.coefficients()?;
        if a <= b {
            return Ok(None);
        }
        Ok(Some(checked_div(a - b, c, "break-even")?))
    }

    /// Right end of the search interval
    ///
    /// The second leg pays strictly less than `Y2`, so any `y >= Y2` loses;
    /// beyond break-even profit is negative as well. Zero when there is no
    /// positive-profit region.
    pub fn upper_bound(&self) -> AmmResult<Decimal> {
        Ok(match self.break_even()? {
            Some(root) => root.min(self.sell.reserve_b),
            None => dec!(0),
        })
    }

    /// Analytic maximizer `(sqrt(a·b) - b) / c`, clamped at zero
    pub fn closed_form_optimum(&self) -> AmmResult<Decimal> {
        let ProfitCoefficients { a, b, c } = self.coefficients()?;
        if a <= b {
            return Ok(dec!(0));
        }
        let root = checked_mul(
            V2Math::decimal_sqrt(a)?,
            V2Math::decimal_sqrt(b)?,
            "optimum root",
        )?;
        Ok(checked_div(root - b, c, "optimum")?.max(dec!(0)))
    }
}
