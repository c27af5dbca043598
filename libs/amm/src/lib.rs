//! # Uniarb AMM Library - Constant Product Pools and Two-Pool Arbitrage
//!
//! ## Purpose
//!
//! Decimal-precise model of Uniswap V2 style constant product pools and the
//! optimal single-shot arbitrage between two pools quoting the same asset
//! pair at different prices. Callers supply reserves for both pools and get
//! back the trade size that maximizes profit, the profit itself, and which
//! pool to buy from.
//!
//! ## Integration Points
//!
//! - **Input**: reserve quantities and fee multipliers as [`Decimal`] (or
//!   plain `f64` through [`Pool::from_f64`])
//! - **Output**: [`ArbitrageOpportunity`] with input amount, profit and buy
//!   pool; [`TradeReceipt`] when the trade is replayed through the pools
//! - **Configuration**: [`EngineConfig`] from TOML plus `UNIARB_` environment
//!   overrides
//! - **Errors**: every failure is an [`AmmError`] raised at the offending call
//!
//! ## Architecture Role
//!
//! ```text
//! Pool ──(reserves, fee)──► ProfitModel ──► Optimizer ──► ArbitrageOpportunity
//!   ▲                                                            │
//!   └─────────────────────── execute (Pool::swap × 2) ◄──────────┘
//! ```
//!
//! - [`Pool`] enforces the `k = reserve_a * reserve_b` invariant on every swap
//!   and liquidity change
//! - [`ProfitModel`] is a pure function of the two reserve snapshots
//! - [`Optimizer`] runs a bounded golden-section search with an explicit
//!   convergence criterion and iteration cap
//!
//! ## Concurrency
//!
//! Everything is synchronous. Queries borrow pools immutably, so a pool
//! cannot be mutated while a query against it is in flight.

pub mod arbitrage;
pub mod config;
pub mod error;
pub mod optimizer;
pub mod pool;
pub mod pool_traits;
pub mod profit_model;
pub mod v2_math;

pub use arbitrage::{
    find_arbitrage, find_arbitrage_with, ArbitrageOpportunity, PoolId, TradeReceipt,
};
pub use config::EngineConfig;
pub use error::{AmmError, AmmResult};
pub use optimizer::{Optimizer, OptimizerConfig, Optimum};
pub use pool::{AssetPair, LiquidityEvent, Pool, PoolTolerances, SwapDirection, DEFAULT_FEE};
pub use pool_traits::AmmPool;
pub use profit_model::{LegReserves, ProfitCoefficients, ProfitModel, ReserveScale};
pub use v2_math::V2Math;

/// Common types for AMM calculations
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
