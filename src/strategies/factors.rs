//! Cross-sectional equity factors.
//!
//! All four rank the instruments quoted on each month end and hold the top N
//! at equal weight until the next month end. Value reads a fundamental feature
//! panel; residual momentum reads a benchmark price panel.

use super::params::ParamMap;
use super::{annualized_vol, monthly_weights, select_top_n, top_k_param, vol_days_param};
use super::SignalPolicy;
use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use crate::rebalance::RebalanceFrequency;
use crate::rolling::{rolling_mean, rolling_sum};
use crate::strategy::MarketData;
use crate::weights::equal_weights;

/// Multiples that are meaningless unless strictly positive.
const POSITIVE_MULTIPLES: &[&str] = &["pe", "pb", "ps"];

/// Cheapest stocks by a valuation multiple.
///
/// # Parameters
/// - `value_field`: feature panel name, e.g. `pe`, `pb`, `ps` (default `pe`)
/// - `top_k`: number of holdings (default 50)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquityValue {
    value_field: String,
    top_k: usize,
}

impl EquityValue {
    pub fn new(value_field: impl Into<String>, top_k: usize) -> Result<Self> {
        let value_field = value_field.into();
        if value_field.is_empty() {
            return Err(BacktestError::InvalidParameter(
                "Expected non-empty value_field".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(BacktestError::InvalidParameter("Expected top_k > 0".to_string()));
        }
        Ok(Self { value_field, top_k })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(params.string_or("value_field", "pe")?, top_k_param(params, 50)?)
    }
}

impl SignalPolicy for EquityValue {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let value = value_scores(data, &self.value_field)?;
        monthly_weights(px, |i| {
            let picks = select_top_n(value.row(i), true, self.top_k);
            equal_weights(px.n_cols(), &picks)
        })
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("value_field".to_string(), self.value_field.clone()),
            ("top_k".to_string(), self.top_k.to_string()),
        ]
    }

    fn required_features(&self) -> Vec<String> {
        vec![self.value_field.clone()]
    }

    fn rebalance(&self) -> RebalanceFrequency {
        RebalanceFrequency::Monthly
    }
}

/// Calmest stocks by trailing annualized volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquityLowVolatility {
    vol_days: usize,
    top_k: usize,
}

impl EquityLowVolatility {
    pub fn new(vol_days: usize, top_k: usize) -> Result<Self> {
        if vol_days < 2 {
            return Err(BacktestError::InvalidParameter("Expected vol_days > 1".to_string()));
        }
        if top_k == 0 {
            return Err(BacktestError::InvalidParameter("Expected top_k > 0".to_string()));
        }
        Ok(Self { vol_days, top_k })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(vol_days_param(params, 63)?, top_k_param(params, 50)?)
    }
}

impl SignalPolicy for EquityLowVolatility {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let vol = annualized_vol(px, self.vol_days).map(|v| if v > 0.0 { v } else { f64::NAN });
        monthly_weights(px, |i| {
            let picks = select_top_n(vol.row(i), true, self.top_k);
            equal_weights(px.n_cols(), &picks)
        })
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("vol_days".to_string(), self.vol_days.to_string()),
            ("top_k".to_string(), self.top_k.to_string()),
        ]
    }

    fn rebalance(&self) -> RebalanceFrequency {
        RebalanceFrequency::Monthly
    }
}

/// Momentum of the part of each stock's return the benchmark does not explain.
///
/// Beta comes from rolling population moments over `beta_days`:
/// `beta = (E[r·m] - E[r]E[m]) / (E[m²] - E[m]²)`. The score is the trailing
/// sum of `ln(1 + residual)` over `lookback_days`.
///
/// # Parameters
/// - `lookback_days`: residual momentum horizon (default 252)
/// - `beta_days`: beta estimation window (default 252)
/// - `top_k`: number of holdings (default 50)
/// - `benchmark`: feature panel holding benchmark prices (default `benchmark`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquityResidualMomentum {
    lookback_days: usize,
    beta_days: usize,
    top_k: usize,
    benchmark: String,
}

impl EquityResidualMomentum {
    pub fn new(
        lookback_days: usize,
        beta_days: usize,
        top_k: usize,
        benchmark: impl Into<String>,
    ) -> Result<Self> {
        if lookback_days == 0 {
            return Err(BacktestError::InvalidParameter(
                "Expected lookback_days > 0".to_string(),
            ));
        }
        if beta_days < 2 {
            return Err(BacktestError::InvalidParameter("Expected beta_days > 1".to_string()));
        }
        if top_k == 0 {
            return Err(BacktestError::InvalidParameter("Expected top_k > 0".to_string()));
        }
        Ok(Self {
            lookback_days,
            beta_days,
            top_k,
            benchmark: benchmark.into(),
        })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(
            params.window_or("lookback_days", 252)?,
            params.window_or("beta_days", 252)?,
            top_k_param(params, 50)?,
            params.string_or("benchmark", "benchmark")?,
        )
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }
}

impl SignalPolicy for EquityResidualMomentum {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let bench = benchmark_returns(data, &self.benchmark)?;
        let scores = residual_momentum_scores(px, &bench, self.beta_days, self.lookback_days);
        monthly_weights(px, |i| {
            let picks = select_top_n(scores.row(i), false, self.top_k);
            equal_weights(px.n_cols(), &picks)
        })
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("lookback_days".to_string(), self.lookback_days.to_string()),
            ("beta_days".to_string(), self.beta_days.to_string()),
            ("top_k".to_string(), self.top_k.to_string()),
            ("benchmark".to_string(), self.benchmark.clone()),
        ]
    }

    fn required_features(&self) -> Vec<String> {
        vec![self.benchmark.clone()]
    }

    fn rebalance(&self) -> RebalanceFrequency {
        RebalanceFrequency::Monthly
    }
}

/// Blend of value, momentum and low volatility via per-date z-scores.
///
/// Each factor is standardized across the instruments that have all three
/// scores on the rebalance date. Value and volatility are sign-flipped so that
/// higher is always better, then combined with the given weights.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityMultifactor {
    value_field: String,
    momentum_days: usize,
    vol_days: usize,
    top_k: usize,
    value_weight: f64,
    momentum_weight: f64,
    low_vol_weight: f64,
}

impl EquityMultifactor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        value_field: impl Into<String>,
        momentum_days: usize,
        vol_days: usize,
        top_k: usize,
        value_weight: f64,
        momentum_weight: f64,
        low_vol_weight: f64,
    ) -> Result<Self> {
        let value_field = value_field.into();
        if value_field.is_empty() {
            return Err(BacktestError::InvalidParameter(
                "Expected non-empty value_field".to_string(),
            ));
        }
        if momentum_days == 0 {
            return Err(BacktestError::InvalidParameter(
                "Expected momentum_days > 0".to_string(),
            ));
        }
        if vol_days < 2 {
            return Err(BacktestError::InvalidParameter("Expected vol_days > 1".to_string()));
        }
        if top_k == 0 {
            return Err(BacktestError::InvalidParameter("Expected top_k > 0".to_string()));
        }
        Ok(Self {
            value_field,
            momentum_days,
            vol_days,
            top_k,
            value_weight,
            momentum_weight,
            low_vol_weight,
        })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(
            params.string_or("value_field", "pe")?,
            params.window_or("momentum_days", 252)?,
            vol_days_param(params, 63)?,
            top_k_param(params, 50)?,
            params.float_or("value_weight", 1.0)?,
            params.float_or("momentum_weight", 1.0)?,
            params.float_or("low_vol_weight", 1.0)?,
        )
    }
}

impl SignalPolicy for EquityMultifactor {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let value = value_scores(data, &self.value_field)?;
        let mom = px.pct_change(self.momentum_days).replace_non_finite(f64::NAN);
        let vol = annualized_vol(px, self.vol_days);

        monthly_weights(px, |i| {
            let n = px.n_cols();
            let complete: Vec<usize> = (0..n)
                .filter(|&j| {
                    value.get(i, j).is_finite() && mom.get(i, j).is_finite() && vol.get(i, j).is_finite()
                })
                .collect();

            let zv = zscores(&complete, |j| value.get(i, j));
            let zm = zscores(&complete, |j| mom.get(i, j));
            let zl = zscores(&complete, |j| vol.get(i, j));

            let mut combined = vec![f64::NAN; n];
            for (k, &j) in complete.iter().enumerate() {
                combined[j] = self.value_weight * -zv[k]
                    + self.momentum_weight * zm[k]
                    + self.low_vol_weight * -zl[k];
            }
            let picks = select_top_n(&combined, false, self.top_k);
            equal_weights(n, &picks)
        })
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("value_field".to_string(), self.value_field.clone()),
            ("momentum_days".to_string(), self.momentum_days.to_string()),
            ("vol_days".to_string(), self.vol_days.to_string()),
            ("top_k".to_string(), self.top_k.to_string()),
            ("value_weight".to_string(), self.value_weight.to_string()),
            ("momentum_weight".to_string(), self.momentum_weight.to_string()),
            ("low_vol_weight".to_string(), self.low_vol_weight.to_string()),
        ]
    }

    fn required_features(&self) -> Vec<String> {
        vec![self.value_field.clone()]
    }

    fn rebalance(&self) -> RebalanceFrequency {
        RebalanceFrequency::Monthly
    }
}

/// Valuation feature aligned to the prices, with non-positive multiples and
/// unquoted instruments masked out.
fn value_scores(data: &MarketData, field: &str) -> Result<Panel> {
    let px = &data.prices;
    let raw = data
        .feature(field)?
        .reindex_asof(px.index(), px.columns());
    let positive_only = POSITIVE_MULTIPLES.contains(&field.to_ascii_lowercase().as_str());
    Ok(raw.zip_with(px, |v, p| {
        if p.is_nan() || !v.is_finite() || (positive_only && v <= 0.0) {
            f64::NAN
        } else {
            v
        }
    }))
}

/// Daily simple returns of the benchmark, on the price index.
fn benchmark_returns(data: &MarketData, name: &str) -> Result<Vec<f64>> {
    let px = &data.prices;
    let bench = data.feature(name)?;
    let column = bench.columns().first().cloned().ok_or_else(|| {
        BacktestError::InvalidInput(format!("Benchmark feature {:?} has no columns", name))
    })?;
    let aligned = bench.reindex(px.index(), &[column], f64::NAN);
    Ok(aligned
        .pct_change(1)
        .replace_non_finite(f64::NAN)
        .column(0))
}

/// Trailing sum of `ln(1 + residual)` per instrument.
pub(crate) fn residual_momentum_scores(
    prices: &Panel,
    bench: &[f64],
    beta_days: usize,
    lookback_days: usize,
) -> Panel {
    let returns = prices.pct_change(1).replace_non_finite(f64::NAN);
    returns.map_columns(|r| {
        // Benchmark moments only over dates where the stock has a return.
        let m: Vec<f64> = r
            .iter()
            .zip(bench)
            .map(|(&ri, &mi)| if ri.is_nan() { f64::NAN } else { mi })
            .collect();
        let rm: Vec<f64> = r.iter().zip(&m).map(|(a, b)| a * b).collect();
        let mm: Vec<f64> = m.iter().map(|b| b * b).collect();

        let e_r = rolling_mean(r, beta_days);
        let e_m = rolling_mean(&m, beta_days);
        let e_rm = rolling_mean(&rm, beta_days);
        let e_mm = rolling_mean(&mm, beta_days);

        let log_resid: Vec<f64> = (0..r.len())
            .map(|t| {
                let var = e_mm[t] - e_m[t] * e_m[t];
                if !(var > 0.0) {
                    return f64::NAN;
                }
                let beta = (e_rm[t] - e_r[t] * e_m[t]) / var;
                let resid = r[t] - beta * m[t];
                if resid > -1.0 {
                    resid.ln_1p()
                } else {
                    f64::NAN
                }
            })
            .collect();
        rolling_sum(&log_resid, lookback_days)
    })
}

/// Cross-sectional z-scores (sample standard deviation) over `members`.
/// A degenerate cross-section scores everyone zero.
fn zscores(members: &[usize], value: impl Fn(usize) -> f64) -> Vec<f64> {
    let xs: Vec<f64> = members.iter().map(|&j| value(j)).collect();
    if xs.len() < 2 {
        return vec![0.0; xs.len()];
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let std = (xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
    if std == 0.0 || !std.is_finite() {
        return vec![0.0; xs.len()];
    }
    xs.iter().map(|x| (x - mean) / std).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::test_support::daily_index;
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn prices(n: usize, growth: &[f64]) -> Panel {
        let cols = growth
            .iter()
            .enumerate()
            .map(|(k, g)| {
                let name = ((b'A' + k as u8) as char).to_string();
                (name, (0..n).map(|i| 100.0 * g.powi(i as i32)).collect())
            })
            .collect();
        Panel::from_columns(daily_index(start(), n), cols).unwrap()
    }

    #[test]
    fn test_value_prefers_cheap_positive_multiples() {
        let px = prices(40, &[1.0, 1.0, 1.0]);
        // C has a negative earnings multiple and must be skipped
        let pe = Panel::from_columns(
            vec![start()],
            vec![
                ("A".into(), vec![25.0]),
                ("B".into(), vec![12.0]),
                ("C".into(), vec![-4.0]),
            ],
        )
        .unwrap();
        let data = MarketData::new(px).with_feature("pe", pe);
        let w = EquityValue::new("pe", 1).unwrap().weights(&data).unwrap();
        assert_eq!(w.row(30), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_value_missing_feature() {
        let data = MarketData::new(prices(40, &[1.0]));
        let err = EquityValue::new("pb", 5).unwrap().weights(&data).unwrap_err();
        assert!(matches!(err, BacktestError::UnknownFeature { .. }));
    }

    #[test]
    fn test_low_volatility_ranks_ascending() {
        let n = 40;
        let a: Vec<f64> = (0..n).map(|i| 100.0 + if i % 2 == 0 { 2.0 } else { -2.0 }).collect();
        let b: Vec<f64> = (0..n).map(|i| 100.0 + if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let px = Panel::from_columns(daily_index(start(), n), vec![("A".into(), a), ("B".into(), b)])
            .unwrap();
        let w = EquityLowVolatility::new(5, 1)
            .unwrap()
            .weights(&MarketData::new(px))
            .unwrap();
        assert_eq!(w.row(30), &[0.0, 1.0]);
    }

    #[test]
    fn test_residual_momentum_strips_market_beta() {
        let n = 60;
        // market alternates +1% / -0.5%
        let m: Vec<f64> = (0..n)
            .map(|i| if i % 2 == 0 { 0.01 } else { -0.005 })
            .collect();
        let mut bench = vec![100.0];
        let mut hi_beta = vec![100.0];
        let mut alpha = vec![100.0];
        for t in 1..n {
            bench.push(bench[t - 1] * (1.0 + m[t]));
            // pure 2x market exposure, no idiosyncratic drift
            hi_beta.push(hi_beta[t - 1] * (1.0 + 2.0 * m[t]));
            // half market exposure plus steady 0.2% per day
            alpha.push(alpha[t - 1] * (1.0 + 0.5 * m[t] + 0.002));
        }
        let idx = daily_index(start(), n);
        let px = Panel::from_columns(
            idx.clone(),
            vec![("HI".into(), hi_beta), ("ALPHA".into(), alpha)],
        )
        .unwrap();
        let bench = Panel::from_columns(idx, vec![("SPY".into(), bench)]).unwrap();
        let data = MarketData::new(px).with_feature("benchmark", bench);

        let policy = EquityResidualMomentum::new(10, 10, 1, "benchmark").unwrap();
        let w = policy.weights(&data).unwrap();
        assert_eq!(w.row(30), &[0.0, 1.0]);
    }

    #[test]
    fn test_residual_scores_nan_when_market_flat() {
        let px = prices(30, &[1.01]);
        let flat = vec![0.0; 30];
        let scores = residual_momentum_scores(&px, &flat, 5, 5);
        assert!(scores.column(0).iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_zscores() {
        let z = zscores(&[0, 1, 2], |j| [1.0, 2.0, 3.0][j]);
        assert_eq!(z, vec![-1.0, 0.0, 1.0]);
        assert_eq!(zscores(&[0], |_| 5.0), vec![0.0]);
        assert_eq!(zscores(&[0, 1], |_| 5.0), vec![0.0, 0.0]);
    }

    #[test]
    fn test_multifactor_blends_factors() {
        // A: cheap and strong; B: expensive and weak; C: middling
        let px = prices(40, &[1.01, 0.99, 1.0]);
        let pe = Panel::from_columns(
            vec![start()],
            vec![
                ("A".into(), vec![8.0]),
                ("B".into(), vec![40.0]),
                ("C".into(), vec![15.0]),
            ],
        )
        .unwrap();
        let data = MarketData::new(px).with_feature("pe", pe);
        let policy = EquityMultifactor::new("pe", 5, 5, 1, 1.0, 1.0, 0.0).unwrap();
        let w = policy.weights(&data).unwrap();
        assert_eq!(w.row(30), &[1.0, 0.0, 0.0]);
        assert_eq!(policy.required_features(), vec!["pe".to_string()]);
    }
}
