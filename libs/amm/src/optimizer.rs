//! Optimal trade sizing for two-pool arbitrage
//!
//! Maximizes [`ProfitModel::evaluate`] over `[0, upper_bound]` with a
//! golden-section search. The profit function is strictly concave there, so
//! the bracket always contains the maximizer.
//!
//! Convergence: the search stops once the bracket width is at most
//! `absolute_tolerance + relative_tolerance * upper_bound`. Reaching
//! `max_iterations` first is reported as
//! [`AmmError::OptimizationDidNotConverge`].

use crate::error::{AmmError, AmmResult};
use crate::profit_model::ProfitModel;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 1/φ, the golden-section shrink factor
const INV_PHI: Decimal = dec!(0.6180339887498948482045868344);

/// Configuration for the trade size search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Absolute part of the bracket width target
    pub absolute_tolerance: Decimal,
    /// Relative part of the bracket width target, scaled by the upper bound
    pub relative_tolerance: Decimal,
    /// Iteration cap for the search
    pub max_iterations: u32,
    /// Profits at or below this are reported as no opportunity
    pub min_profit: Decimal,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            absolute_tolerance: dec!(0.000000001),
            relative_tolerance: dec!(0.000000000001),
            max_iterations: 200,
            min_profit: dec!(0.000000000001),
        }
    }
}

/// Located maximum of the profit function
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Optimum {
    /// Bridge asset sent into the buy pool
    pub input: Decimal,
    /// Net bridge asset gained
    pub profit: Decimal,
    /// Golden-section iterations spent
    pub iterations: u32,
}

impl Optimum {
    pub fn no_opportunity() -> Self {
        Self {
            input: dec!(0),
            profit: dec!(0),
            iterations: 0,
        }
    }

    pub fn is_profitable(&self) -> bool {
        self.profit > dec!(0)
    }
}

/// Bounded golden-section maximizer
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Find `argmax profit(y)` and its profit
    ///
    /// Returns [`Optimum::no_opportunity`] when the profit slope at zero is
    /// not positive (equal prices, or fees exceed the spread) and when the
    /// located profit does not clear `min_profit`.
    pub fn maximize(&self, model: &ProfitModel) -> AmmResult<Optimum> {
        if model.marginal_profit_at_zero()? <= dec!(0) {
            debug!("profit slope at zero is not positive, skipping search");
            return Ok(Optimum::no_opportunity());
        }

        let upper = model.upper_bound()?;
        if upper <= dec!(0) {
            return Err(AmmError::NoFeasibleDomain { upper_bound: upper });
        }

        let target = self.config.absolute_tolerance + self.config.relative_tolerance * upper;
        let (input, iterations) = self.golden_section(model, upper, target)?;
        let profit = model
            .evaluate(input)
            .ok_or(AmmError::NoFeasibleDomain { upper_bound: upper })?;

        debug!(
            iterations,
            %upper,
            %input,
            %profit,
            "golden-section search converged"
        );

        if profit <= self.config.min_profit {
            return Ok(Optimum {
                iterations,
                ..Optimum::no_opportunity()
            });
        }

        Ok(Optimum {
            input,
            profit,
            iterations,
        })
    }

    fn golden_section(
        &self,
        model: &ProfitModel,
        upper: Decimal,
        target: Decimal,
    ) -> AmmResult<(Decimal, u32)> {
        let mut lo = dec!(0);
        let mut hi = upper;
        let mut x1 = hi - INV_PHI * (hi - lo);
        let mut x2 = lo + INV_PHI * (hi - lo);
        // None ranks below every Some, matching an infeasible point at -inf
        let mut f1 = model.evaluate(x1);
        let mut f2 = model.evaluate(x2);
        let mut iterations = 0u32;

        while hi - lo > target {
            if iterations >= self.config.max_iterations {
                return Err(AmmError::OptimizationDidNotConverge {
                    iterations,
                    width: hi - lo,
                    target,
                });
            }
            iterations += 1;

            if f1 < f2 {
                lo = x1;
                x1 = x2;
                f1 = f2;
                x2 = lo + INV_PHI * (hi - lo);
                f2 = model.evaluate(x2);
            } else {
                hi = x2;
                x2 = x1;
                f2 = f1;
                x1 = hi - INV_PHI * (hi - lo);
                f1 = model.evaluate(x1);
            }
        }

        Ok(((lo + hi) / dec!(2), iterations))
    }
}
