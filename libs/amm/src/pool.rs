//! Constant product pool with validated state transitions
//!
//! A [`Pool`] owns its two reserves and fee multiplier. Fields are private:
//! every mutation goes through [`Pool::swap`], [`Pool::add_liquidity`] or
//! [`Pool::remove_liquidity`], each of which re-validates its inputs and
//! re-checks the `k = reserve_a * reserve_b` invariant before committing.
//!
//! The invariant is compared as a ratio of per-reserve changes, so pools
//! quoted in 18-decimal base units work even though their `k` exceeds the
//! Decimal range.

use crate::error::{AmmError, AmmResult};
use crate::v2_math::{checked_div, checked_mul, V2Math};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Canonical Uniswap V2 fee multiplier (0.3% fee)
pub const DEFAULT_FEE: Decimal = dec!(0.997);

/// Relative tolerance for proportional liquidity changes
pub const DEFAULT_RATIO_TOLERANCE: Decimal = dec!(0.000001);

/// Relative slack allowed when comparing k before and after a swap
pub const DEFAULT_INVARIANT_EPSILON: Decimal = dec!(0.000000000000000001);

/// Ordered pair of asset identifiers quoted by a pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "AssetPairFields")]
pub struct AssetPair {
    asset_a: String,
    asset_b: String,
}

impl AssetPair {
    /// Build a pair from two distinct, non-empty symbols
    pub fn new(asset_a: impl Into<String>, asset_b: impl Into<String>) -> AmmResult<Self> {
        let asset_a = asset_a.into();
        let asset_b = asset_b.into();
        if asset_a.is_empty() || asset_b.is_empty() || asset_a == asset_b {
            return Err(AmmError::AssetMismatch {
                first: asset_a,
                second: asset_b,
            });
        }
        Ok(Self { asset_a, asset_b })
    }

    pub fn asset_a(&self) -> &str {
        &self.asset_a
    }

    pub fn asset_b(&self) -> &str {
        &self.asset_b
    }

    /// Same assets in the opposite order
    pub fn reversed(&self) -> Self {
        Self {
            asset_a: self.asset_b.clone(),
            asset_b: self.asset_a.clone(),
        }
    }
}

#[derive(Deserialize)]
struct AssetPairFields {
    asset_a: String,
    asset_b: String,
}

impl TryFrom<AssetPairFields> for AssetPair {
    type Error = AmmError;

    fn try_from(fields: AssetPairFields) -> AmmResult<Self> {
        Self::new(fields.asset_a, fields.asset_b)
    }
}

impl Default for AssetPair {
    fn default() -> Self {
        Self {
            asset_a: "DAI".to_string(),
            asset_b: "ETH".to_string(),
        }
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset_a, self.asset_b)
    }
}

/// Which asset is sold into the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Sell asset A, receive asset B
    AIn,
    /// Sell asset B, receive asset A
    BIn,
}

impl SwapDirection {
    pub fn opposite(self) -> Self {
        match self {
            SwapDirection::AIn => SwapDirection::BIn,
            SwapDirection::BIn => SwapDirection::AIn,
        }
    }
}

/// Tolerances applied by a pool when validating mutations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolTolerances {
    /// Relative tolerance on `amount_a / reserve_a == amount_b / reserve_b`
    pub ratio_tolerance: Decimal,
    /// Relative slack on `k' >= k` after a swap
    pub invariant_epsilon: Decimal,
}

impl Default for PoolTolerances {
    fn default() -> Self {
        Self {
            ratio_tolerance: DEFAULT_RATIO_TOLERANCE,
            invariant_epsilon: DEFAULT_INVARIANT_EPSILON,
        }
    }
}

/// Proportional liquidity change request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidityEvent {
    pub amount_a: Decimal,
    pub amount_b: Decimal,
}

impl LiquidityEvent {
    pub fn new(amount_a: Decimal, amount_b: Decimal) -> Self {
        Self { amount_a, amount_b }
    }

    /// Whether the amounts are proportional to the given reserves
    pub fn matches_ratio(
        &self,
        reserve_a: Decimal,
        reserve_b: Decimal,
        tolerance: Decimal,
    ) -> AmmResult<bool> {
        let share_a = checked_div(self.amount_a, reserve_a, "liquidity share A")?;
        let share_b = checked_div(self.amount_b, reserve_b, "liquidity share B")?;

        let scale = share_a.abs().max(share_b.abs());
        Ok((share_a - share_b).abs() <= tolerance * scale)
    }

    fn validate_amounts(&self, operation: &'static str) -> AmmResult<()> {
        for amount in [self.amount_a, self.amount_b] {
            if amount <= dec!(0) {
                return Err(AmmError::InvalidAmount { amount, operation });
            }
        }
        Ok(())
    }
}

/// Uniswap V2 style constant product pool
///
/// Serializable for snapshots, but only constructible through the
/// validating constructors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pool {
    pair: AssetPair,
    reserve_a: Decimal,
    reserve_b: Decimal,
    fee: Decimal,
    tolerances: PoolTolerances,
}

impl Pool {
    /// Create a DAI/ETH pool
    ///
    /// Fails with [`AmmError::InvalidReserve`] if either reserve is not
    /// positive and [`AmmError::InvalidFee`] if `fee` is outside (0, 1].
    pub fn new(reserve_a: Decimal, reserve_b: Decimal, fee: Decimal) -> AmmResult<Self> {
        Self::with_pair(AssetPair::default(), reserve_a, reserve_b, fee)
    }

    /// Create a pool over an explicit asset pair
    pub fn with_pair(
        pair: AssetPair,
        reserve_a: Decimal,
        reserve_b: Decimal,
        fee: Decimal,
    ) -> AmmResult<Self> {
        if reserve_a <= dec!(0) || reserve_b <= dec!(0) {
            return Err(AmmError::InvalidReserve {
                reserve_a,
                reserve_b,
            });
        }
        if fee <= dec!(0) || fee > dec!(1) {
            return Err(AmmError::InvalidFee { fee });
        }

        Ok(Self {
            pair,
            reserve_a,
            reserve_b,
            fee,
            tolerances: PoolTolerances::default(),
        })
    }

    /// Create a pool from a fee in basis points (30 = 0.3%)
    pub fn with_fee_bps(reserve_a: Decimal, reserve_b: Decimal, fee_bps: u32) -> AmmResult<Self> {
        Self::new(reserve_a, reserve_b, V2Math::fee_multiplier_from_bps(fee_bps)?)
    }

    /// Create a DAI/ETH pool from plain numbers
    pub fn from_f64(reserve_a: f64, reserve_b: f64, fee: f64) -> AmmResult<Self> {
        Self::new(to_decimal(reserve_a)?, to_decimal(reserve_b)?, to_decimal(fee)?)
    }

    /// Replace the validation tolerances
    pub fn with_tolerances(mut self, tolerances: PoolTolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn pair(&self) -> &AssetPair {
        &self.pair
    }

    pub fn reserve_a(&self) -> Decimal {
        self.reserve_a
    }

    pub fn reserve_b(&self) -> Decimal {
        self.reserve_b
    }

    pub fn fee(&self) -> Decimal {
        self.fee
    }

    pub fn tolerances(&self) -> PoolTolerances {
        self.tolerances
    }

    /// Invariant product `reserve_a * reserve_b`
    ///
    /// Reports [`AmmError::ArithmeticOverflow`] for base-unit reserves whose
    /// product is beyond Decimal range; [`Pool::k_ratio_since`] works there.
    pub fn k(&self) -> AmmResult<Decimal> {
        checked_mul(self.reserve_a, self.reserve_b, "k")
    }

    /// `k / earlier.k` without forming either product
    pub fn k_ratio_since(&self, earlier: &Pool) -> AmmResult<Decimal> {
        k_ratio(
            (earlier.reserve_a, earlier.reserve_b),
            (self.reserve_a, self.reserve_b),
        )
    }

    /// Spot price of one unit of A in units of B
    pub fn price_a_in_b(&self) -> AmmResult<Decimal> {
        checked_div(self.reserve_b, self.reserve_a, "spot price")
    }

    /// Spot price of one unit of B in units of A
    pub fn price_b_in_a(&self) -> AmmResult<Decimal> {
        checked_div(self.reserve_a, self.reserve_b, "spot price")
    }

    /// Reserves ordered as (reserve_in, reserve_out) for a direction
    pub fn reserves_for(&self, direction: SwapDirection) -> (Decimal, Decimal) {
        match direction {
            SwapDirection::AIn => (self.reserve_a, self.reserve_b),
            SwapDirection::BIn => (self.reserve_b, self.reserve_a),
        }
    }

    /// Output amount a swap would produce, without mutating the pool
    pub fn quote(&self, amount_in: Decimal, direction: SwapDirection) -> AmmResult<Decimal> {
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        V2Math::calculate_output_amount(amount_in, reserve_in, reserve_out, self.fee)
    }

    /// Sell `amount_in` of the asset selected by `direction`
    ///
    /// Returns the amount of the other asset paid out. The pool is left
    /// untouched on any error.
    pub fn swap(&mut self, amount_in: Decimal, direction: SwapDirection) -> AmmResult<Decimal> {
        let amount_out = self.quote(amount_in, direction)?;

        let (reserve_in, reserve_out) = self.reserves_for(direction);
        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or(AmmError::ArithmeticOverflow {
                context: "swap reserve in",
            })?;
        let new_out = reserve_out - amount_out;
        if new_out <= dec!(0) {
            return Err(AmmError::InsufficientReserves {
                amount_a: amount_in,
                amount_b: amount_out,
                reserve_a: reserve_in,
                reserve_b: reserve_out,
            });
        }

        let (new_a, new_b) = match direction {
            SwapDirection::AIn => (new_in, new_out),
            SwapDirection::BIn => (new_out, new_in),
        };
        let k_growth = k_ratio((self.reserve_a, self.reserve_b), (new_a, new_b))?;

        // Rounding in the last decimal digit may shave k; only a drop beyond
        // epsilon is an inconsistency.
        let epsilon = self.tolerances.invariant_epsilon;
        if k_growth < dec!(1) - epsilon {
            return Err(AmmError::InvariantViolation {
                k_ratio: k_growth,
                epsilon,
            });
        }

        debug!(
            pair = %self.pair,
            ?direction,
            %amount_in,
            %amount_out,
            old_a = %self.reserve_a,
            old_b = %self.reserve_b,
            new_a = %new_a,
            new_b = %new_b,
            %k_growth,
            "swap executed"
        );

        self.reserve_a = new_a;
        self.reserve_b = new_b;
        Ok(amount_out)
    }

    /// Deposit amounts proportional to the current reserves
    pub fn add_liquidity(&mut self, amount_a: Decimal, amount_b: Decimal) -> AmmResult<()> {
        let event = LiquidityEvent::new(amount_a, amount_b);
        self.validate_liquidity(&event, "add liquidity")?;

        let overflow = AmmError::ArithmeticOverflow {
            context: "add liquidity",
        };
        let new_a = self.reserve_a.checked_add(amount_a).ok_or(overflow.clone())?;
        let new_b = self.reserve_b.checked_add(amount_b).ok_or(overflow)?;

        debug!(
            pair = %self.pair,
            %amount_a,
            %amount_b,
            old_a = %self.reserve_a,
            old_b = %self.reserve_b,
            new_a = %new_a,
            new_b = %new_b,
            "liquidity added"
        );

        self.reserve_a = new_a;
        self.reserve_b = new_b;
        Ok(())
    }

    /// Withdraw amounts proportional to the current reserves
    pub fn remove_liquidity(&mut self, amount_a: Decimal, amount_b: Decimal) -> AmmResult<()> {
        let event = LiquidityEvent::new(amount_a, amount_b);
        self.validate_liquidity(&event, "remove liquidity")?;

        if amount_a >= self.reserve_a || amount_b >= self.reserve_b {
            return Err(AmmError::InsufficientReserves {
                amount_a,
                amount_b,
                reserve_a: self.reserve_a,
                reserve_b: self.reserve_b,
            });
        }

        let new_a = self.reserve_a - amount_a;
        let new_b = self.reserve_b - amount_b;

        debug!(
            pair = %self.pair,
            %amount_a,
            %amount_b,
            old_a = %self.reserve_a,
            old_b = %self.reserve_b,
            new_a = %new_a,
            new_b = %new_b,
            "liquidity removed"
        );

        self.reserve_a = new_a;
        self.reserve_b = new_b;
        Ok(())
    }

    /// Copy of this pool expressed in `pair` order
    ///
    /// Swaps the reserves when the pool quotes the same assets reversed and
    /// fails with [`AmmError::AssetMismatch`] when the assets differ.
    pub fn oriented_to(&self, pair: &AssetPair) -> AmmResult<Self> {
        if &self.pair == pair {
            return Ok(self.clone());
        }
        if self.pair.reversed() == *pair {
            return Ok(Self {
                pair: pair.clone(),
                reserve_a: self.reserve_b,
                reserve_b: self.reserve_a,
                fee: self.fee,
                tolerances: self.tolerances,
            });
        }
        Err(AmmError::AssetMismatch {
            first: pair.to_string(),
            second: self.pair.to_string(),
        })
    }

    fn validate_liquidity(&self, event: &LiquidityEvent, operation: &'static str) -> AmmResult<()> {
        event.validate_amounts(operation)?;

        let tolerance = self.tolerances.ratio_tolerance;
        if !event.matches_ratio(self.reserve_a, self.reserve_b, tolerance)? {
            return Err(AmmError::InvalidRatio {
                amount_a: event.amount_a,
                amount_b: event.amount_b,
                reserve_a: self.reserve_a,
                reserve_b: self.reserve_b,
                tolerance,
            });
        }
        Ok(())
    }
}

/// `(a'·b') / (a·b)` as a product of per-reserve ratios
fn k_ratio(before: (Decimal, Decimal), after: (Decimal, Decimal)) -> AmmResult<Decimal> {
    let growth_a = checked_div(after.0, before.0, "k ratio")?;
    let growth_b = checked_div(after.1, before.1, "k ratio")?;
    checked_mul(growth_a, growth_b, "k ratio")
}

/// Convert a plain number into a Decimal quantity
pub fn to_decimal(value: f64) -> AmmResult<Decimal> {
    Decimal::from_f64(value).ok_or(AmmError::NonFiniteInput { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::value::{Error as ValueError, MapDeserializer};

    fn dai_eth(reserve_a: Decimal, reserve_b: Decimal) -> Pool {
        Pool::new(reserve_a, reserve_b, DEFAULT_FEE).unwrap()
    }

    #[test]
    fn test_construction_rejects_bad_reserves() {
        for (a, b) in [(dec!(0), dec!(10)), (dec!(10), dec!(-1)), (dec!(-5), dec!(-5))] {
            let err = Pool::new(a, b, DEFAULT_FEE).unwrap_err();
            assert!(matches!(err, AmmError::InvalidReserve { .. }));
        }
    }

    #[test]
    fn test_construction_rejects_bad_fee() {
        for fee in [dec!(0), dec!(-0.5), dec!(1.0001)] {
            let err = Pool::new(dec!(100), dec!(100), fee).unwrap_err();
            assert!(matches!(err, AmmError::InvalidFee { .. }));
        }
        assert!(Pool::new(dec!(100), dec!(100), dec!(1)).is_ok());
    }

    #[test]
    fn test_swap_moves_reserves_and_grows_k() {
        let mut pool = dai_eth(dec!(1000), dec!(2000));
        let k_before = pool.k().unwrap();

        let out = pool.swap(dec!(100), SwapDirection::AIn).unwrap();

        assert!((out - dec!(181.32)).abs() < dec!(0.01));
        assert_eq!(pool.reserve_a(), dec!(1100));
        assert_eq!(pool.reserve_b(), dec!(2000) - out);
        assert!(pool.k().unwrap() > k_before);
    }

    #[test]
    fn test_base_unit_reserves_construct_and_swap() {
        let wei = dec!(1_000_000_000_000_000_000);
        let mut pool = dai_eth(dec!(7_400_000) * wei, dec!(5_000) * wei);
        assert!(matches!(pool.k(), Err(AmmError::ArithmeticOverflow { .. })));

        let before = pool.clone();
        let out = pool.swap(dec!(100) * wei, SwapDirection::BIn).unwrap();

        let mut unit_pool = dai_eth(dec!(7_400_000), dec!(5_000));
        let unit_out = unit_pool.swap(dec!(100), SwapDirection::BIn).unwrap();
        assert!((out / wei - unit_out).abs() < dec!(0.000000001));
        assert!(pool.k_ratio_since(&before).unwrap() > dec!(1));

        assert!(Pool::from_f64(7.4e24, 5e21, 0.997).is_ok());
    }

    #[test]
    fn test_k_ratio_matches_products() {
        let mut pool = dai_eth(dec!(1000), dec!(2000));
        let before = pool.clone();
        pool.swap(dec!(100), SwapDirection::AIn).unwrap();

        let direct = pool.k().unwrap() / before.k().unwrap();
        let ratio = pool.k_ratio_since(&before).unwrap();
        assert!((ratio - direct).abs() < dec!(0.000000000000000001));
    }

    #[test]
    fn test_swap_b_in_direction() {
        let mut pool = dai_eth(dec!(2000), dec!(1000));
        let quoted = pool.quote(dec!(100), SwapDirection::BIn).unwrap();
        let out = pool.swap(dec!(100), SwapDirection::BIn).unwrap();

        assert_eq!(quoted, out);
        assert_eq!(pool.reserve_b(), dec!(1100));
        assert_eq!(pool.reserve_a(), dec!(2000) - out);
    }

    #[test]
    fn test_swap_rejects_non_positive_amount() {
        let mut pool = dai_eth(dec!(1000), dec!(2000));
        let before = pool.clone();
        for amount in [dec!(0), dec!(-3)] {
            let err = pool.swap(amount, SwapDirection::BIn).unwrap_err();
            assert!(matches!(err, AmmError::InvalidAmount { .. }));
        }
        assert_eq!(pool, before);
    }

    #[test]
    fn test_feeless_swap_preserves_k_within_epsilon() {
        let mut pool = Pool::new(dec!(3000), dec!(7), dec!(1)).unwrap();
        let k_before = pool.k().unwrap();
        pool.swap(dec!(13.5), SwapDirection::AIn).unwrap();
        let k_after = pool.k().unwrap();
        assert!((k_after - k_before).abs() <= k_before * DEFAULT_INVARIANT_EPSILON);
    }

    #[test]
    fn test_add_then_remove_restores_reserves() {
        let mut pool = dai_eth(dec!(1000), dec!(4));
        let k_before = pool.k().unwrap();

        pool.add_liquidity(dec!(250), dec!(1)).unwrap();
        assert_eq!(pool.reserve_a(), dec!(1250));
        assert_eq!(pool.reserve_b(), dec!(5));

        pool.remove_liquidity(dec!(250), dec!(1)).unwrap();
        assert_eq!(pool.reserve_a(), dec!(1000));
        assert_eq!(pool.reserve_b(), dec!(4));
        assert_eq!(pool.k().unwrap(), k_before);
    }

    #[test]
    fn test_liquidity_rejects_disproportionate_amounts() {
        let mut pool = dai_eth(dec!(1000), dec!(4));
        let err = pool.add_liquidity(dec!(250), dec!(2)).unwrap_err();
        assert!(matches!(err, AmmError::InvalidRatio { .. }));

        let err = pool.remove_liquidity(dec!(100), dec!(0.5)).unwrap_err();
        assert!(matches!(err, AmmError::InvalidRatio { .. }));
    }

    #[test]
    fn test_liquidity_accepts_ratio_within_tolerance() {
        let mut pool = dai_eth(dec!(1000), dec!(4));
        // 1e-8 relative deviation is inside the 1e-6 tolerance
        pool.add_liquidity(dec!(250), dec!(1.00000001)).unwrap();
    }

    #[test]
    fn test_liquidity_rejects_non_positive_amounts() {
        let mut pool = dai_eth(dec!(1000), dec!(4));
        let err = pool.add_liquidity(dec!(0), dec!(0)).unwrap_err();
        assert!(matches!(err, AmmError::InvalidAmount { .. }));

        let err = pool.remove_liquidity(dec!(-250), dec!(-1)).unwrap_err();
        assert!(matches!(err, AmmError::InvalidAmount { .. }));
    }

    #[test]
    fn test_remove_rejects_draining_reserves() {
        let mut pool = dai_eth(dec!(1000), dec!(4));
        let err = pool.remove_liquidity(dec!(1000), dec!(4)).unwrap_err();
        assert!(matches!(err, AmmError::InsufficientReserves { .. }));

        let err = pool.remove_liquidity(dec!(2000), dec!(8)).unwrap_err();
        assert!(matches!(err, AmmError::InsufficientReserves { .. }));
    }

    #[test]
    fn test_orientation() {
        let eth_dai = AssetPair::new("ETH", "DAI").unwrap();
        let pool = Pool::with_pair(eth_dai, dec!(4), dec!(1000), DEFAULT_FEE).unwrap();

        let oriented = pool.oriented_to(&AssetPair::default()).unwrap();
        assert_eq!(oriented.reserve_a(), dec!(1000));
        assert_eq!(oriented.reserve_b(), dec!(4));
        assert_eq!(oriented.price_a_in_b().unwrap(), dec!(0.004));
        assert_eq!(oriented.price_b_in_a().unwrap(), pool.price_a_in_b().unwrap());

        let other = AssetPair::new("USDC", "ETH").unwrap();
        let err = pool.oriented_to(&other).unwrap_err();
        assert!(matches!(err, AmmError::AssetMismatch { .. }));
    }

    #[test]
    fn test_asset_pair_requires_distinct_symbols() {
        assert!(AssetPair::new("ETH", "ETH").is_err());
        assert!(AssetPair::new("", "ETH").is_err());
    }

    fn deserialize_pair(asset_a: &str, asset_b: &str) -> Result<AssetPair, ValueError> {
        let fields = vec![("asset_a", asset_a), ("asset_b", asset_b)];
        AssetPair::deserialize(MapDeserializer::<_, ValueError>::new(fields.into_iter()))
    }

    #[test]
    fn test_asset_pair_deserialization_validates() {
        let pair = deserialize_pair("ETH", "DAI").unwrap();
        assert_eq!(pair, AssetPair::default().reversed());

        let err = deserialize_pair("ETH", "ETH").unwrap_err();
        assert!(err.to_string().contains("Asset mismatch"));
        assert!(deserialize_pair("", "DAI").is_err());
    }

    #[test]
    fn test_fee_bps_and_f64_constructors() {
        let pool = Pool::with_fee_bps(dec!(1000), dec!(10), 30).unwrap();
        assert_eq!(pool.fee(), dec!(0.997));

        let pool = Pool::from_f64(7_400_000.0, 5_000.0, 0.997).unwrap();
        assert_eq!(pool.reserve_a(), dec!(7400000));
        assert!(Pool::from_f64(f64::NAN, 1.0, 0.997).is_err());
    }
}
