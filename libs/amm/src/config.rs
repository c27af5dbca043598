//! Engine configuration
//!
//! Loads [`EngineConfig`] from an optional TOML file with environment
//! variable overrides. Missing keys fall back to the defaults, so an empty
//! source yields [`EngineConfig::default`].
//!
//! ```toml
//! [optimizer]
//! absolute_tolerance = "0.000000001"
//! max_iterations = 200
//!
//! [pool]
//! ratio_tolerance = "0.000001"
//! ```
//!
//! Environment overrides use `<PREFIX>_<SECTION>__<KEY>`, for example
//! `UNIARB_OPTIMIZER__MAX_ITERATIONS=500`.

use crate::optimizer::OptimizerConfig;
use crate::pool::{Pool, PoolTolerances};
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Default environment variable prefix
pub const ENV_PREFIX: &str = "UNIARB";

/// Complete configuration for pools and the optimizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trade size search parameters
    pub optimizer: OptimizerConfig,
    /// Validation tolerances applied to pools
    pub pool: PoolTolerances,
}

impl EngineConfig {
    /// Load from `path` (if given) with `UNIARB_` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load with a custom environment variable prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if path.exists() {
                info!("Loading engine config: {:?}", path);
                builder = builder.add_source(File::from(path).required(true));
            } else {
                warn!("Engine config not found, using defaults: {:?}", path);
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder
            .build()
            .context("Failed to build engine configuration")?
            .try_deserialize()
            .context("Failed to deserialize engine configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the optimizer or pools cannot work with
    pub fn validate(&self) -> Result<()> {
        let optimizer = &self.optimizer;
        if optimizer.max_iterations == 0 {
            bail!("optimizer.max_iterations must be at least 1");
        }
        if optimizer.absolute_tolerance < dec!(0) || optimizer.relative_tolerance < dec!(0) {
            bail!("optimizer tolerances must not be negative");
        }
        if optimizer.absolute_tolerance + optimizer.relative_tolerance <= dec!(0) {
            bail!("optimizer needs a positive absolute or relative tolerance to terminate");
        }
        if optimizer.min_profit < dec!(0) {
            bail!("optimizer.min_profit must not be negative");
        }
        check_unit_interval("pool.ratio_tolerance", self.pool.ratio_tolerance)?;
        check_unit_interval("pool.invariant_epsilon", self.pool.invariant_epsilon)?;
        // Feeless swaps need slack for last-digit rounding
        if self.pool.invariant_epsilon == dec!(0) {
            bail!("pool.invariant_epsilon must be positive");
        }
        Ok(())
    }

    /// Apply the configured tolerances to a pool
    pub fn configure_pool(&self, pool: Pool) -> Pool {
        pool.with_tolerances(self.pool)
    }
}

fn check_unit_interval(name: &str, value: Decimal) -> Result<()> {
    if value < dec!(0) || value >= dec!(1) {
        bail!("{} must be in [0, 1), got {}", name, value);
    }
    Ok(())
}
