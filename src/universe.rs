//! Liquid equity universe construction.
//!
//! Ranks every ticker on file by average daily dollar volume (close × volume)
//! over the requested window and keeps the most liquid names whose last price
//! clears a floor, so penny stocks never enter a ranking universe.

use crate::data::DataSource;
use crate::error::Result;
use crate::panel::Panel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Parameters of a liquid universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidUniverseConfig {
    /// Maximum number of tickers kept.
    pub max_tickers: usize,
    /// Minimum last price in the window.
    pub min_price: f64,
}

impl Default for LiquidUniverseConfig {
    fn default() -> Self {
        Self {
            max_tickers: 500,
            min_price: 5.0,
        }
    }
}

/// Average of `close × volume` over dates where both are present.
/// Tickers with no such date are omitted.
pub fn average_dollar_volume(close: &Panel, volume: &Panel) -> Vec<(String, f64)> {
    let vol = volume.reindex_like(close, f64::NAN);
    close
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(j, ticker)| {
            let (sum, count) = (0..close.n_rows())
                .map(|i| close.get(i, j) * vol.get(i, j))
                .filter(|dv| dv.is_finite())
                .fold((0.0, 0usize), |(s, c), dv| (s + dv, c + 1));
            (count > 0).then(|| (ticker.clone(), sum / count as f64))
        })
        .collect()
}

/// Last present close per column.
fn last_prices(close: &Panel) -> Vec<f64> {
    (0..close.n_cols())
        .map(|j| {
            (0..close.n_rows())
                .rev()
                .map(|i| close.get(i, j))
                .find(|p| !p.is_nan())
                .unwrap_or(f64::NAN)
        })
        .collect()
}

/// Most liquid tickers whose last price is at least `min_price`, in
/// descending order of average dollar volume. Ties keep ticker order.
pub fn rank_liquid_universe(close: &Panel, volume: &Panel, config: &LiquidUniverseConfig) -> Vec<String> {
    let last = last_prices(close);
    let mut ranked: Vec<(String, f64)> = average_dollar_volume(close, volume)
        .into_iter()
        .filter(|(t, _)| {
            close
                .column_position(t)
                .map(|j| last[j] >= config.min_price)
                .unwrap_or(false)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(config.max_tickers);
    debug!(
        "Liquid universe: {} of {} tickers pass min_price={}",
        ranked.len(),
        close.n_cols(),
        config.min_price
    );
    ranked.into_iter().map(|(t, _)| t).collect()
}

/// Build a liquid universe from a data source.
pub fn build_liquid_universe(
    source: &dyn DataSource,
    config: &LiquidUniverseConfig,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<String>> {
    let (close, volume) = source.load_liquidity(start, end)?;
    let tickers = rank_liquid_universe(&close, &volume, config);
    info!(
        "Built liquid universe with {} tickers (max_tickers={}, min_price={})",
        tickers.len(),
        config.max_tickers,
        config.min_price
    );
    Ok(tickers)
}
