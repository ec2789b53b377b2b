//! Vectorized portfolio backtest engine.
//!
//! Given a price panel and a target-weights panel the engine simulates daily
//! close-to-close returns:
//!
//! 1. weights are aligned to the prices; unmatched or missing cells are zero
//! 2. simple returns come from consecutive quotes; gaps and infinities are zero
//! 3. weights execute `lag_days` rows after they are decided
//! 4. turnover is the sum of absolute weight changes, charged at
//!    `(fee_bps + slippage_bps) / 10_000` per unit
//! 5. equity compounds the net returns from 1.0

use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Basis points per unit.
const BPS: f64 = 10_000.0;

/// Frictions and execution timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Commission per unit of turnover, in basis points.
    pub fee_bps: f64,
    /// Slippage per unit of turnover, in basis points.
    pub slippage_bps: f64,
    /// Rows between a weight decision and its execution.
    pub lag_days: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            fee_bps: 0.0,
            slippage_bps: 0.0,
            lag_days: 1,
        }
    }
}

impl BacktestConfig {
    pub fn new(fee_bps: f64, slippage_bps: f64) -> Self {
        Self {
            fee_bps,
            slippage_bps,
            ..Self::default()
        }
    }

    pub fn with_lag(mut self, lag_days: usize) -> Self {
        self.lag_days = lag_days;
        self
    }

    /// Reject negative or non-finite cost rates.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("fee_bps", self.fee_bps), ("slippage_bps", self.slippage_bps)] {
            if !v.is_finite() || v < 0.0 {
                return Err(BacktestError::InvalidParameter(format!(
                    "Expected {} >= 0, got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }

    /// Cost charged per unit of turnover.
    pub fn cost_rate(&self) -> f64 {
        (self.fee_bps + self.slippage_bps) / BPS
    }
}

/// Daily series produced by a portfolio backtest, all on the price index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioBacktestResult {
    pub index: Vec<NaiveDate>,
    pub equity_curve: Vec<f64>,
    pub daily_returns: Vec<f64>,
    pub turnover: Vec<f64>,
}

impl PortfolioBacktestResult {
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().copied().unwrap_or(1.0)
    }

    pub fn total_turnover(&self) -> f64 {
        self.turnover.iter().sum()
    }

    /// Mean daily turnover, 0.0 when empty.
    pub fn average_turnover(&self) -> f64 {
        if self.turnover.is_empty() {
            0.0
        } else {
            self.total_turnover() / self.turnover.len() as f64
        }
    }
}

/// Weights as they are actually held: aligned to the prices, cleaned and
/// shifted by `lag_days`.
pub fn executed_weights(prices: &Panel, weights: &Panel, lag_days: usize) -> Panel {
    weights
        .reindex_like(prices, 0.0)
        .replace_non_finite(0.0)
        .shift(lag_days)
        .fill_nan(0.0)
}

/// Run a vectorized backtest of `weights` against `prices`.
///
/// An empty price panel gives an empty result, not an error.
pub fn run_portfolio_backtest(
    prices: &Panel,
    weights: &Panel,
    config: &BacktestConfig,
) -> Result<PortfolioBacktestResult> {
    config.validate()?;
    if prices.n_rows() == 0 {
        debug!("Empty price panel, nothing to backtest");
        return Ok(PortfolioBacktestResult::default());
    }

    let returns = prices.pct_change(1).replace_non_finite(0.0);
    let held = executed_weights(prices, weights, config.lag_days);
    let cost_rate = config.cost_rate();

    let n = prices.n_rows();
    let mut equity_curve = Vec::with_capacity(n);
    let mut daily_returns = Vec::with_capacity(n);
    let mut turnover = Vec::with_capacity(n);
    let mut equity = 1.0;

    for t in 0..n {
        let w = held.row(t);
        let delta: f64 = if t == 0 {
            w.iter().map(|x| x.abs()).sum()
        } else {
            w.iter().zip(held.row(t - 1)).map(|(a, b)| (a - b).abs()).sum()
        };
        let gross: f64 = w.iter().zip(returns.row(t)).map(|(a, r)| a * r).sum();
        let net = gross - delta * cost_rate;

        equity *= 1.0 + net;
        turnover.push(delta);
        daily_returns.push(net);
        equity_curve.push(equity);
    }

    info!(
        "Backtest over {} days: final equity {:.4}, total turnover {:.2}",
        n,
        equity,
        turnover.iter().sum::<f64>()
    );

    Ok(PortfolioBacktestResult {
        index: prices.index().to_vec(),
        equity_curve,
        daily_returns,
        turnover,
    })
}

/// Single-series long-only backtest of a signal in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesBacktestResult {
    pub index: Vec<NaiveDate>,
    pub equity_curve: Vec<f64>,
    pub daily_returns: Vec<f64>,
}

/// Backtest one instrument against a signal.
///
/// Dates without a price are dropped. The signal is aligned to the remaining
/// dates (missing is 0), clipped to `[0, 1]` and applied one period late.
pub fn run_long_only_backtest(
    index: &[NaiveDate],
    prices: &[f64],
    signal: &[f64],
) -> Result<SeriesBacktestResult> {
    if index.len() != prices.len() || index.len() != signal.len() {
        return Err(BacktestError::InvalidInput(format!(
            "Length mismatch: {} dates, {} prices, {} signal values",
            index.len(),
            prices.len(),
            signal.len()
        )));
    }

    let kept: Vec<usize> = (0..prices.len()).filter(|&i| !prices[i].is_nan()).collect();
    let mut out = SeriesBacktestResult {
        index: kept.iter().map(|&i| index[i]).collect(),
        ..Default::default()
    };

    let mut equity = 1.0;
    let mut prev_signal = 0.0;
    let mut prev_price: Option<f64> = None;
    for &i in &kept {
        let r = prev_price.map(|p| prices[i] / p - 1.0).unwrap_or(0.0);
        let r = if r.is_finite() { r } else { 0.0 };
        let strat = r * prev_signal;
        equity *= 1.0 + strat;
        out.daily_returns.push(strat);
        out.equity_curve.push(equity);

        let s = signal[i];
        prev_signal = if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) };
        prev_price = Some(prices[i]);
    }
    Ok(out)
}

/// Mean gross exposure of `weights` once executed with a one-period lag.
pub fn average_exposure(weights: &Panel) -> f64 {
    if weights.n_rows() == 0 {
        return 0.0;
    }
    let held = weights.shift(1).fill_nan(0.0);
    held.row_sums().iter().sum::<f64>() / weights.n_rows() as f64
}
