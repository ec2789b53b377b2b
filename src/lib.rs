//! paperlab - a declarative backtesting lab for strategies from the literature.
//!
//! # Overview
//!
//! Strategies are declared in a YAML file as a policy kind plus parameters and a
//! universe. Each policy turns a date × instrument price [`Panel`] into target
//! weights; a vectorized engine simulates daily close-to-close returns with a
//! one-day execution lag and turnover costs, and the leaderboard ranks every
//! strategy by Sharpe ratio next to a buy-and-hold benchmark.
//!
//! - **Panels**: aligned date × instrument grids with missing values as `NaN`
//! - **Seventeen policies**: trend filters, breakouts, mean reversion, time-series
//!   and cross-sectional momentum, value, low volatility, residual momentum and a
//!   multi-factor blend
//! - **Monthly rebalancing**: decisions on the last trading day of each month,
//!   held until the next one
//! - **Costs**: fee and slippage in basis points of turnover
//! - **Metrics**: CAGR, volatility, Sharpe, Sortino, Calmar, max drawdown
//! - **Configuration files**: TOML run settings for reproducible leaderboards
//!
//! # Quick Start
//!
//! ```no_run
//! use paperlab::{
//!     engine::{run_portfolio_backtest, BacktestConfig},
//!     strategy::{run_strategy_weights, MarketData},
//!     spec_file::load_strategy_specs,
//!     data::{CsvDataSource, DataSource},
//!     analytics::{MetricsConfig, PerformanceMetrics},
//! };
//!
//! let specs = load_strategy_specs("strategies.yaml").unwrap();
//! let source = CsvDataSource::new("data");
//! let prices = source.load_prices(&["SPY".to_string()], None, None).unwrap();
//!
//! let data = MarketData::new(prices.clone());
//! let weights = run_strategy_weights(&data, &specs[0]).unwrap();
//! let result = run_portfolio_backtest(&prices, &weights, &BacktestConfig::new(1.0, 2.0)).unwrap();
//!
//! let metrics = PerformanceMetrics::from_result(&result, &MetricsConfig::default());
//! println!("Sharpe: {:.2}", metrics.sharpe);
//! ```
//!
//! # Modules
//!
//! - [`panel`]: the date × instrument grid and its alignment operations
//! - [`rolling`]: trailing-window statistics
//! - [`weights`]: row normalization of target weights
//! - [`rebalance`]: rebalance schedules and monthly holding
//! - [`strategies`]: the signal policies
//! - [`strategy`]: strategy specs and the inputs policies run on
//! - [`engine`]: vectorized portfolio backtest
//! - [`analytics`]: performance metrics and reporting
//! - [`data`]: CSV panel loading behind the [`DataSource`] trait
//! - [`universe`]: liquid equity universe construction
//! - [`spec_file`]: YAML strategy spec files
//! - [`config`]: TOML configuration file support
//! - [`leaderboard`]: Sharpe-ranked comparison against buy-and-hold

pub mod analytics;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod panel;
pub mod rebalance;
pub mod rolling;
pub mod spec_file;
pub mod strategies;
pub mod strategy;
pub mod universe;
pub mod weights;

// Re-exports for convenience
pub use analytics::{MetricsConfig, PerformanceMetrics, ResultFormatter};
pub use config::LabConfig;
pub use data::{CsvDataSource, DataSource};
pub use engine::{run_portfolio_backtest, BacktestConfig, PortfolioBacktestResult};
pub use error::{BacktestError, ErrorHelp, Result};
pub use leaderboard::{run_leaderboard, LeaderboardOptions, LeaderboardRow};
pub use panel::Panel;
pub use rebalance::RebalanceFrequency;
pub use spec_file::{load_strategy_specs, parse_strategy_specs};
pub use strategies::{ParamMap, Policy, SignalPolicy};
pub use strategy::{run_strategy_weights, MarketData, StrategySpec, Universe};
pub use universe::LiquidUniverseConfig;
pub use weights::normalize_weights;
