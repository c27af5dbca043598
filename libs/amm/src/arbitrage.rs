//! Two-pool arbitrage detection and execution replay
//!
//! [`find_arbitrage`] validates that both pools quote the same asset pair,
//! picks the pool where asset A is cheapest as the buy pool, and sizes the
//! trade with the [`Optimizer`]. Nothing is mutated: replaying the trade is
//! an explicit, separate step through [`ArbitrageOpportunity::execute`].

use crate::error::{AmmError, AmmResult};
use crate::optimizer::{Optimizer, OptimizerConfig};
use crate::pool::{AssetPair, Pool, SwapDirection};
use crate::profit_model::{LegReserves, ProfitModel, ReserveScale};
use crate::v2_math::checked_mul;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Identifies one of the two pools handed to [`find_arbitrage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolId {
    First,
    Second,
}

impl PoolId {
    pub fn other(self) -> Self {
        match self {
            PoolId::First => PoolId::Second,
            PoolId::Second => PoolId::First,
        }
    }
}

/// Result of an arbitrage query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    /// Asset order all amounts refer to; asset B is the bridge asset
    pub pair: AssetPair,
    /// Bridge asset sold into the buy pool
    pub input_amount: Decimal,
    /// Asset A received from the buy pool and sold into the sell pool
    pub intermediate_amount: Decimal,
    /// Net bridge asset gained
    pub profit: Decimal,
    /// Pool where asset A is bought; `None` when there is nothing to trade
    pub buy_pool: Option<PoolId>,
    /// Golden-section iterations spent sizing the trade
    pub iterations: u32,
}

impl ArbitrageOpportunity {
    fn no_opportunity(pair: AssetPair) -> Self {
        Self {
            pair,
            input_amount: dec!(0),
            intermediate_amount: dec!(0),
            profit: dec!(0),
            buy_pool: None,
            iterations: 0,
        }
    }

    pub fn is_profitable(&self) -> bool {
        self.buy_pool.is_some() && self.profit > dec!(0)
    }

    pub fn sell_pool(&self) -> Option<PoolId> {
        self.buy_pool.map(PoolId::other)
    }

    /// Get profit margin as percentage of the input
    pub fn profit_margin_pct(&self) -> Decimal {
        if self.input_amount == dec!(0) {
            return dec!(0);
        }
        (self.profit / self.input_amount) * dec!(100)
    }

    /// Replay the trade through both pools' `swap`
    ///
    /// `first` and `second` must be the pools in the order they were given
    /// to [`find_arbitrage`]. Both legs run on copies and are committed
    /// together, so a failure leaves both pools untouched.
    pub fn execute(&self, first: &mut Pool, second: &mut Pool) -> AmmResult<TradeReceipt> {
        let buy_id = match self.buy_pool {
            Some(id) if self.input_amount > dec!(0) => id,
            _ => {
                return Err(AmmError::InvalidAmount {
                    amount: self.input_amount,
                    operation: "execute arbitrage",
                })
            }
        };

        let (buy, sell) = match buy_id {
            PoolId::First => (&mut *first, &mut *second),
            PoolId::Second => (&mut *second, &mut *first),
        };
        let mut next_buy = buy.clone();
        let mut next_sell = sell.clone();

        let bridge_into_buy = bridge_direction(&next_buy, &self.pair)?;
        let bridge_into_sell = bridge_direction(&next_sell, &self.pair)?;

        let asset_a_received = next_buy.swap(self.input_amount, bridge_into_buy)?;
        let bridge_received = next_sell.swap(asset_a_received, bridge_into_sell.opposite())?;

        let receipt = TradeReceipt {
            bridge_in: self.input_amount,
            asset_a_received,
            bridge_received,
            realized_profit: bridge_received - self.input_amount,
            buy_pool_k_ratio: next_buy.k_ratio_since(buy)?,
            sell_pool_k_ratio: next_sell.k_ratio_since(sell)?,
        };

        info!(
            pair = %self.pair,
            buy_pool = ?buy_id,
            bridge_in = %receipt.bridge_in,
            realized_profit = %receipt.realized_profit,
            "arbitrage executed"
        );

        *buy = next_buy;
        *sell = next_sell;
        Ok(receipt)
    }
}

/// Outcome of replaying an opportunity through the pools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub bridge_in: Decimal,
    pub asset_a_received: Decimal,
    pub bridge_received: Decimal,
    pub realized_profit: Decimal,
    /// `k_after / k_before` of the buy pool
    pub buy_pool_k_ratio: Decimal,
    /// `k_after / k_before` of the sell pool
    pub sell_pool_k_ratio: Decimal,
}

/// Find the optimal single-shot arbitrage between two pools with default settings
pub fn find_arbitrage(first: &Pool, second: &Pool) -> AmmResult<ArbitrageOpportunity> {
    find_arbitrage_with(first, second, &OptimizerConfig::default())
}

/// Find the optimal single-shot arbitrage between two pools
///
/// Amounts are expressed in `first`'s asset order. `second` may quote the
/// same assets reversed; different assets fail with
/// [`AmmError::AssetMismatch`].
pub fn find_arbitrage_with(
    first: &Pool,
    second: &Pool,
    config: &OptimizerConfig,
) -> AmmResult<ArbitrageOpportunity> {
    let pair = first.pair().clone();
    let second = second.oriented_to(&pair)?;

    let first_leg = LegReserves::from_pool(first);
    let second_leg = LegReserves::from_pool(&second);
    let scale = ReserveScale::for_legs(&first_leg, &second_leg)?;
    if !scale.is_identity() {
        debug!(%pair, unit_a = %scale.unit_a, unit_b = %scale.unit_b, "sizing in scaled units");
    }
    let first_leg = scale.normalize(&first_leg)?;
    let second_leg = scale.normalize(&second_leg)?;

    // Compare reserve_b/reserve_a across pools without dividing
    let first_price = checked_mul(first_leg.reserve_b, second_leg.reserve_a, "price comparison")?;
    let second_price = checked_mul(second_leg.reserve_b, first_leg.reserve_a, "price comparison")?;

    let (buy, sell, buy_id) = match first_price.cmp(&second_price) {
        Ordering::Less => (first_leg, second_leg, PoolId::First),
        Ordering::Greater => (second_leg, first_leg, PoolId::Second),
        Ordering::Equal => {
            debug!(%pair, "pools quote identical prices");
            return Ok(ArbitrageOpportunity::no_opportunity(pair));
        }
    };

    let model = ProfitModel::new(buy, sell);
    let optimum = Optimizer::new(config.clone()).maximize(&model)?;

    if !optimum.is_profitable() {
        debug!(%pair, buy_pool = ?buy_id, "spread does not cover fees");
        return Ok(ArbitrageOpportunity {
            iterations: optimum.iterations,
            ..ArbitrageOpportunity::no_opportunity(pair)
        });
    }

    let intermediate_amount = model
        .first_leg_out(optimum.input)
        .ok_or(AmmError::NoFeasibleDomain {
            upper_bound: optimum.input,
        })?;
    let input_amount = scale.bridge_amount(optimum.input)?;
    let profit = scale.bridge_amount(optimum.profit)?;

    info!(
        %pair,
        buy_pool = ?buy_id,
        input = %input_amount,
        %profit,
        iterations = optimum.iterations,
        "arbitrage opportunity found"
    );

    Ok(ArbitrageOpportunity {
        pair,
        input_amount,
        intermediate_amount: scale.asset_a_amount(intermediate_amount)?,
        profit,
        buy_pool: Some(buy_id),
        iterations: optimum.iterations,
    })
}

/// Direction that sells the bridge asset of `pair` into `pool`
fn bridge_direction(pool: &Pool, pair: &AssetPair) -> AmmResult<SwapDirection> {
    if pool.pair() == pair {
        Ok(SwapDirection::BIn)
    } else if pool.pair().reversed() == *pair {
        Ok(SwapDirection::AIn)
    } else {
        Err(AmmError::AssetMismatch {
            first: pair.to_string(),
            second: pool.pair().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DEFAULT_FEE;

    fn reference_pools() -> (Pool, Pool) {
        (
            Pool::new(dec!(7_400_000), dec!(5_000), DEFAULT_FEE).unwrap(),
            Pool::new(dec!(7_500_000), dec!(4_000), DEFAULT_FEE).unwrap(),
        )
    }

    #[test]
    fn test_reference_scenario() {
        let (first, second) = reference_pools();
        let opportunity = find_arbitrage(&first, &second).unwrap();

        assert_eq!(opportunity.buy_pool, Some(PoolId::Second));
        assert_eq!(opportunity.sell_pool(), Some(PoolId::First));
        assert!((opportunity.profit - dec!(29.793)).abs() < dec!(0.001));
        assert!((opportunity.input_amount - dec!(243.831)).abs() < dec!(0.001));
        assert!(opportunity.profit_margin_pct() > dec!(12));
    }

    #[test]
    fn test_argument_order_flips_buy_pool() {
        let (first, second) = reference_pools();
        let forward = find_arbitrage(&first, &second).unwrap();
        let backward = find_arbitrage(&second, &first).unwrap();

        assert_eq!(backward.buy_pool, Some(PoolId::First));
        assert_eq!(forward.input_amount, backward.input_amount);
        assert_eq!(forward.profit, backward.profit);
    }

    #[test]
    fn test_execute_realizes_predicted_profit() {
        let (mut first, mut second) = reference_pools();
        let opportunity = find_arbitrage(&first, &second).unwrap();

        let receipt = opportunity.execute(&mut first, &mut second).unwrap();

        assert_eq!(receipt.asset_a_received, opportunity.intermediate_amount);
        assert!((receipt.realized_profit - opportunity.profit).abs() < dec!(0.000000001));
        assert!(receipt.buy_pool_k_ratio > dec!(1));
        assert!(receipt.sell_pool_k_ratio > dec!(1));
        assert_eq!(second.reserve_b(), dec!(4_000) + opportunity.input_amount);

        // Prices moved toward each other, so a second pass finds far less
        let after = find_arbitrage(&first, &second).unwrap();
        assert!(after.profit < dec!(0.001));
    }

    #[test]
    fn test_execute_without_opportunity_fails() {
        let mut first = Pool::new(dec!(1_000), dec!(10), DEFAULT_FEE).unwrap();
        let mut second = Pool::new(dec!(2_000), dec!(20), DEFAULT_FEE).unwrap();
        let opportunity = find_arbitrage(&first, &second).unwrap();

        assert!(!opportunity.is_profitable());
        let err = opportunity.execute(&mut first, &mut second).unwrap_err();
        assert!(matches!(err, AmmError::InvalidAmount { .. }));
        assert_eq!(first.reserve_a(), dec!(1_000));
    }

    #[test]
    fn test_reversed_pair_is_oriented() {
        let (mut first, _) = reference_pools();
        let eth_dai = AssetPair::new("ETH", "DAI").unwrap();
        let mut second =
            Pool::with_pair(eth_dai, dec!(4_000), dec!(7_500_000), DEFAULT_FEE).unwrap();

        let opportunity = find_arbitrage(&first, &second).unwrap();
        assert_eq!(opportunity.buy_pool, Some(PoolId::Second));
        assert!((opportunity.profit - dec!(29.793)).abs() < dec!(0.001));

        opportunity.execute(&mut first, &mut second).unwrap();
        assert_eq!(second.reserve_a(), dec!(4_000) + opportunity.input_amount);
    }

    #[test]
    fn test_base_unit_reserves_find_and_execute() {
        let wei = dec!(1_000_000_000_000_000_000);
        let mut first = Pool::new(dec!(7_400_000) * wei, dec!(5_000) * wei, DEFAULT_FEE).unwrap();
        let mut second = Pool::new(dec!(7_500_000) * wei, dec!(4_000) * wei, DEFAULT_FEE).unwrap();

        let opportunity = find_arbitrage(&first, &second).unwrap();
        assert_eq!(opportunity.buy_pool, Some(PoolId::Second));
        assert!((opportunity.profit / wei - dec!(29.793)).abs() < dec!(0.001));
        assert!((opportunity.input_amount / wei - dec!(243.831)).abs() < dec!(0.001));

        let receipt = opportunity.execute(&mut first, &mut second).unwrap();
        assert!(receipt.buy_pool_k_ratio > dec!(1));
        assert!(receipt.sell_pool_k_ratio > dec!(1));
        assert!((receipt.realized_profit / wei - dec!(29.793)).abs() < dec!(0.001));
    }

    #[test]
    fn test_different_assets_are_rejected() {
        let (first, _) = reference_pools();
        let usdc_eth = AssetPair::new("USDC", "ETH").unwrap();
        let second = Pool::with_pair(usdc_eth, dec!(7_500_000), dec!(4_000), DEFAULT_FEE).unwrap();

        let err = find_arbitrage(&first, &second).unwrap_err();
        assert!(matches!(err, AmmError::AssetMismatch { .. }));
    }
}
