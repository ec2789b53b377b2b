//! Performance analytics and reporting.
//!
//! Metric functions take plain slices. `NaN` observations are dropped first,
//! and every ratio with a zero denominator (or too little data) is 0.0 rather
//! than infinite or `NaN`.

use crate::engine::PortfolioBacktestResult;
use crate::strategies::{Policy, SignalPolicy};
use crate::strategy::StrategySpec;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{builder::Builder, settings::Style};

/// Trading days used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

fn clean(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|x| !x.is_nan()).collect()
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (divisor `n - 1`). Needs at least two values.
fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    Some(var.sqrt())
}

/// Per-period rate equivalent to an annual rate.
fn per_period_rate(annual: f64, periods_per_year: f64) -> f64 {
    (1.0 + annual).powf(1.0 / periods_per_year) - 1.0
}

/// Most negative peak-to-trough decline of an equity curve, e.g. -0.25.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for &e in equity_curve.iter().filter(|x| !x.is_nan()) {
        peak = peak.max(e);
        if peak > 0.0 {
            worst = worst.min(e / peak - 1.0);
        }
    }
    worst
}

/// Compound annual growth rate of a return series.
///
/// A total loss (growth at or below zero) is reported as -1.0.
pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> f64 {
    let r = clean(returns);
    if r.is_empty() {
        return 0.0;
    }
    let years = r.len() as f64 / periods_per_year;
    if years <= 0.0 {
        return 0.0;
    }
    let growth: f64 = r.iter().map(|x| 1.0 + x).product();
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(1.0 / years) - 1.0
}

/// Annualized sample volatility.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    sample_std(&clean(returns))
        .map(|s| s * periods_per_year.sqrt())
        .unwrap_or(0.0)
}

/// Annualized Sharpe ratio over a de-annualized risk-free rate.
///
/// A perfectly constant series has zero volatility in exact arithmetic, but the
/// sample std of its floating-point excess returns is often a tiny rounding
/// residue, so the result is either 0 or a huge positive number.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let rf = per_period_rate(risk_free_rate, periods_per_year);
    let excess: Vec<f64> = clean(returns).into_iter().map(|r| r - rf).collect();
    match sample_std(&excess) {
        Some(vol) if vol > 0.0 => mean(&excess) / vol * periods_per_year.sqrt(),
        _ => 0.0,
    }
}

/// Annualized Sortino ratio: mean excess return over downside deviation, the
/// root mean square of the negative excess returns (positives count as zero).
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let rf = per_period_rate(risk_free_rate, periods_per_year);
    let excess: Vec<f64> = clean(returns).into_iter().map(|r| r - rf).collect();
    if excess.is_empty() {
        return 0.0;
    }
    let downside =
        (excess.iter().map(|x| x.min(0.0).powi(2)).sum::<f64>() / excess.len() as f64).sqrt();
    if downside > 0.0 {
        mean(&excess) / downside * periods_per_year.sqrt()
    } else {
        0.0
    }
}

/// Equity curve starting from 1.0, compounding `returns`.
pub fn equity_from_returns(returns: &[f64]) -> Vec<f64> {
    let mut equity = 1.0;
    clean(returns)
        .into_iter()
        .map(|r| {
            equity *= 1.0 + r;
            equity
        })
        .collect()
}

/// CAGR divided by the magnitude of the maximum drawdown.
pub fn calmar_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    let mdd = max_drawdown(&equity_from_returns(returns));
    if mdd == 0.0 {
        return 0.0;
    }
    annualized_return(returns, periods_per_year) / mdd.abs()
}

/// Risk-free rate and annualization used for ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Annual risk-free rate, e.g. 0.02 for 2%.
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            periods_per_year: TRADING_DAYS_PER_YEAR,
        }
    }
}

/// The six headline statistics of a backtest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub total_return: f64,
    pub days: usize,
}

impl PerformanceMetrics {
    pub fn from_result(result: &PortfolioBacktestResult, config: &MetricsConfig) -> Self {
        let r = &result.daily_returns;
        let ppy = config.periods_per_year;
        Self {
            cagr: annualized_return(r, ppy),
            volatility: annualized_volatility(r, ppy),
            sharpe: sharpe_ratio(r, config.risk_free_rate, ppy),
            sortino: sortino_ratio(r, config.risk_free_rate, ppy),
            calmar: calmar_ratio(r, ppy),
            max_drawdown: max_drawdown(&result.equity_curve),
            total_return: result.final_equity() - 1.0,
            days: result.len(),
        }
    }
}

/// Format results for terminal display.
pub struct ResultFormatter;

impl ResultFormatter {
    /// Print the metrics of one backtest.
    pub fn print_report(title: &str, period: Option<(String, String)>, metrics: &PerformanceMetrics) {
        println!();
        println!("{}", "═".repeat(60).blue());
        println!("{}", format!(" {} ", title).bold().blue());
        println!("{}", "═".repeat(60).blue());
        if let Some((start, end)) = period {
            println!("  Period:          {} to {}", start, end);
        }
        println!("  Trading Days:    {}", metrics.days);
        println!();

        let mut builder = Builder::new();
        builder.push_record(["metric", "value"]);
        builder.push_record(["CAGR".to_string(), Self::format_pct(metrics.cagr)]);
        builder.push_record(["Vol".to_string(), format!("{:.2}%", metrics.volatility * 100.0)]);
        builder.push_record(["Sharpe".to_string(), format!("{:.2}", metrics.sharpe)]);
        builder.push_record(["Sortino".to_string(), format!("{:.2}", metrics.sortino)]);
        builder.push_record(["Calmar".to_string(), format!("{:.2}", metrics.calmar)]);
        builder.push_record([
            "Max drawdown".to_string(),
            format!("{:.2}%", metrics.max_drawdown * 100.0),
        ]);
        println!("{}", builder.build().with(Style::rounded()));
    }

    /// Percentage with color by sign.
    fn format_pct(x: f64) -> String {
        let s = format!("{:.2}%", x * 100.0);
        if x >= 0.0 {
            s.green().to_string()
        } else {
            s.red().to_string()
        }
    }

    /// Table of strategy specs.
    pub fn print_strategies(title: &str, specs: &[StrategySpec]) {
        let mut builder = Builder::new();
        builder.push_record(["paper", "id", "name", "kind", "universe", "description"]);
        for s in specs {
            builder.push_record([
                s.paper_section.clone().unwrap_or_default(),
                s.id.clone(),
                s.name.clone(),
                s.kind().to_string(),
                s.universe.label(None),
                s.description.clone().unwrap_or_default(),
            ]);
        }
        println!("{}", title.bold());
        println!("{}", builder.build().with(Style::rounded()));
    }

    /// Every policy kind with its defaults.
    pub fn print_kinds(policies: &[Policy]) {
        let mut builder = Builder::new();
        builder.push_record(["kind", "rebalance", "defaults"]);
        for p in policies {
            let defaults = p
                .parameters()
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            builder.push_record([
                p.kind().to_string(),
                format!("{:?}", p.rebalance()).to_lowercase(),
                defaults,
            ]);
        }
        println!("{}", builder.build().with(Style::rounded()));
    }

    pub fn to_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PPY: f64 = TRADING_DAYS_PER_YEAR;

    #[test]
    fn test_empty_inputs_are_zero() {
        assert_eq!(annualized_return(&[], PPY), 0.0);
        assert_eq!(annualized_volatility(&[], PPY), 0.0);
        assert_eq!(sharpe_ratio(&[], 0.0, PPY), 0.0);
        assert_eq!(sortino_ratio(&[], 0.0, PPY), 0.0);
        assert_eq!(calmar_ratio(&[], PPY), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_max_drawdown_basic() {
        assert!((max_drawdown(&[1.0, 1.2, 0.9, 1.1]) - (-0.25)).abs() < 1e-9);
        assert_eq!(max_drawdown(&[1.0, 1.1, 1.2]), 0.0);
    }

    #[test]
    fn test_constant_positive_returns() {
        let r = vec![0.001; 300];
        assert!(sharpe_ratio(&r, 0.0, PPY) > 0.0);
        assert_eq!(sortino_ratio(&r, 0.0, PPY), 0.0);
        assert_eq!(calmar_ratio(&r, PPY), 0.0);
    }

    #[test]
    fn test_annualized_return_one_year() {
        // 252 days of a return that compounds to +10%
        let daily = 1.1f64.powf(1.0 / 252.0) - 1.0;
        let r = vec![daily; 252];
        assert!((annualized_return(&r, PPY) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_annualized_return_total_loss() {
        assert_eq!(annualized_return(&[-1.0, 0.1], PPY), -1.0);
    }

    #[test]
    fn test_volatility_sample_std() {
        let r = [0.01, -0.01, 0.01, -0.01];
        let expected = (0.0004f64 / 3.0).sqrt() * PPY.sqrt();
        assert!((annualized_volatility(&r, PPY) - expected).abs() < 1e-12);
        assert_eq!(annualized_volatility(&[0.01], PPY), 0.0);
    }

    #[test]
    fn test_nan_dropped() {
        let r = [0.01, f64::NAN, -0.01];
        assert!((annualized_volatility(&r, PPY)
            - annualized_volatility(&[0.01, -0.01], PPY))
        .abs()
            < 1e-15);
    }

    #[test]
    fn test_risk_free_rate_lowers_sharpe() {
        let r = [0.002, -0.001, 0.003, 0.0, 0.001];
        assert!(sharpe_ratio(&r, 0.05, PPY) < sharpe_ratio(&r, 0.0, PPY));
    }

    #[test]
    fn test_sortino_and_calmar_with_losses() {
        let r = [0.02, -0.01, 0.015, -0.005, 0.01];
        assert!(sortino_ratio(&r, 0.0, PPY) > 0.0);
        let calmar = calmar_ratio(&r, PPY);
        let mdd = max_drawdown(&equity_from_returns(&r));
        assert!((calmar - annualized_return(&r, PPY) / mdd.abs()).abs() < 1e-12);
    }

    #[test]
    fn test_performance_metrics_from_result() {
        let result = PortfolioBacktestResult {
            index: vec![],
            equity_curve: vec![1.0, 1.1, 0.99],
            daily_returns: vec![0.0, 0.1, -0.1],
            turnover: vec![0.0, 1.0, 0.0],
        };
        let m = PerformanceMetrics::from_result(&result, &MetricsConfig::default());
        assert!((m.max_drawdown - (-0.1)).abs() < 1e-12);
        assert!((m.total_return - (-0.01)).abs() < 1e-12);
    }
}
