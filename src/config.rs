//! Configuration file support.
//!
//! Run settings (costs, window, data location, leaderboard benchmark) load
//! from a TOML file so a leaderboard can be reproduced exactly.

use crate::analytics::MetricsConfig;
use crate::data::{parse_date, CsvDataSource};
use crate::engine::BacktestConfig;
use crate::error::{BacktestError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding `[data] dir`.
pub const DATA_DIR_ENV: &str = "PAPERLAB_DATA_DIR";

/// Complete run configuration loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default)]
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardSettings,
}

/// Costs and evaluation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Commission in basis points of turnover.
    #[serde(default)]
    pub fee_bps: f64,
    /// Slippage in basis points of turnover.
    #[serde(default)]
    pub slippage_bps: f64,
    #[serde(default = "default_lag")]
    pub lag_days: usize,
    /// Trailing years evaluated when no start date is set.
    #[serde(default = "default_years")]
    pub years: u32,
    /// Start date (YYYY-MM-DD format).
    #[serde(default)]
    pub start_date: Option<String>,
    /// End date (YYYY-MM-DD format).
    #[serde(default)]
    pub end_date: Option<String>,
}

fn default_lag() -> usize { 1 }
fn default_years() -> u32 { 5 }

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            fee_bps: 0.0,
            slippage_bps: 0.0,
            lag_days: 1,
            years: 5,
            start_date: None,
            end_date: None,
        }
    }
}

/// Data location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    /// Directory holding the CSV files.
    #[serde(default = "default_data_dir")]
    pub dir: String,
    #[serde(default = "default_prices_file")]
    pub prices_file: String,
    #[serde(default = "default_metrics_file")]
    pub metrics_file: String,
    /// Date format in CSV, ISO dates when unset.
    #[serde(default)]
    pub date_format: Option<String>,
}

fn default_data_dir() -> String { "data".to_string() }
fn default_prices_file() -> String { "prices.csv".to_string() }
fn default_metrics_file() -> String { "metrics.csv".to_string() }

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            prices_file: default_prices_file(),
            metrics_file: default_metrics_file(),
            date_format: None,
        }
    }
}

/// Leaderboard benchmark and data requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSettings {
    /// Ticker held buy-and-hold as the reference.
    #[serde(default = "default_benchmark")]
    pub benchmark: String,
    /// Strategies with fewer common dates are skipped.
    #[serde(default = "default_min_days")]
    pub min_days: usize,
}

fn default_benchmark() -> String { "SPY".to_string() }
fn default_min_days() -> usize { 252 }

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            benchmark: default_benchmark(),
            min_days: default_min_days(),
        }
    }
}

impl LabConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: LabConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BacktestError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Engine settings, validated.
    pub fn to_backtest_config(&self) -> Result<BacktestConfig> {
        let cfg = BacktestConfig::new(self.backtest.fee_bps, self.backtest.slippage_bps)
            .with_lag(self.backtest.lag_days);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn start_date(&self) -> Result<Option<NaiveDate>> {
        self.backtest
            .start_date
            .as_deref()
            .map(|s| parse_date(s, None))
            .transpose()
    }

    pub fn end_date(&self) -> Result<Option<NaiveDate>> {
        self.backtest
            .end_date
            .as_deref()
            .map(|s| parse_date(s, None))
            .transpose()
    }

    /// Data directory: the environment override if set, else `[data] dir`.
    pub fn data_dir(&self) -> PathBuf {
        match std::env::var(DATA_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => {
                debug!("Using {}={}", DATA_DIR_ENV, dir);
                PathBuf::from(dir)
            }
            _ => PathBuf::from(&self.data.dir),
        }
    }

    /// CSV source for the configured files under `dir`.
    pub fn data_source(&self, dir: impl Into<PathBuf>) -> CsvDataSource {
        CsvDataSource::new(dir)
            .with_prices_file(self.data.prices_file.clone())
            .with_metrics_file(self.data.metrics_file.clone())
            .with_date_format(self.data.date_format.clone())
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# paperlab configuration file

[backtest]
fee_bps = 1.0
slippage_bps = 2.0
lag_days = 1
years = 5           # trailing window when no start_date
# start_date = "2015-01-01"
# end_date = "2024-12-31"

[data]
dir = "data"        # overridden by PAPERLAB_DATA_DIR
prices_file = "prices.csv"    # ticker,date,close,volume
metrics_file = "metrics.csv"  # ticker,date,pe,pb,ps
# date_format = "%Y-%m-%d"

[metrics]
risk_free_rate = 0.0
periods_per_year = 252.0

[leaderboard]
benchmark = "SPY"
min_days = 252
"#
        .to_string()
    }
}
