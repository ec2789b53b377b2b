//! Momentum rules: absolute (time-series) and cross-sectional.

use super::params::ParamMap;
use super::{annualized_vol, monthly_weights, select_top_n, top_k_param, vol_days_param};
use super::SignalPolicy;
use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use crate::rebalance::RebalanceFrequency;
use crate::strategy::MarketData;
use crate::weights::{equal_weights, normalize_row, normalize_weights};

/// Long every instrument whose trailing return is positive, re-decided daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSeriesMomentum {
    lookback_days: usize,
}

impl TimeSeriesMomentum {
    pub fn new(lookback_days: usize) -> Result<Self> {
        lookback(lookback_days)?;
        Ok(Self { lookback_days })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(params.window_or("lookback_days", 252)?)
    }
}

impl SignalPolicy for TimeSeriesMomentum {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let raw = data
            .prices
            .pct_change(self.lookback_days)
            .map(|r| if r > 0.0 { 1.0 } else { 0.0 });
        Ok(normalize_weights(&raw))
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![("lookback_days".to_string(), self.lookback_days.to_string())]
    }
}

/// Rotate monthly into the `top_k` strongest instruments, optionally only
/// those trading above their long moving average.
///
/// # Parameters
/// - `lookback_days`: momentum horizon (default 126)
/// - `top_k`: number of holdings (default 3)
/// - `ma_filter_days`: trend filter window, `null` to disable (default 200)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorMomentumRotation {
    lookback_days: usize,
    top_k: usize,
    ma_filter_days: Option<usize>,
}

impl SectorMomentumRotation {
    pub fn new(lookback_days: usize, top_k: usize, ma_filter_days: Option<usize>) -> Result<Self> {
        lookback(lookback_days)?;
        if top_k == 0 {
            return Err(BacktestError::InvalidParameter("Expected top_k > 0".to_string()));
        }
        if ma_filter_days == Some(0) {
            return Err(BacktestError::InvalidParameter(
                "Expected ma_filter_days > 0".to_string(),
            ));
        }
        Ok(Self {
            lookback_days,
            top_k,
            ma_filter_days,
        })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(
            params.window_or("lookback_days", 126)?,
            top_k_param(params, 3)?,
            params.optional_window_or("ma_filter_days", Some(200))?,
        )
    }
}

impl SignalPolicy for SectorMomentumRotation {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let mom = px.pct_change(self.lookback_days);
        // Without a filter every instrument passes.
        let ok = match self.ma_filter_days {
            Some(days) => px.zip_with(&px.rolling_mean(days), |p, m| if p > m { 1.0 } else { 0.0 }),
            None => px.full_like(1.0),
        };

        monthly_weights(px, |i| {
            let scores: Vec<f64> = mom
                .row(i)
                .iter()
                .zip(ok.row(i))
                .map(|(&m, &pass)| if pass > 0.0 { m } else { f64::NAN })
                .collect();
            let picks = select_top_n(&scores, false, self.top_k);
            equal_weights(px.n_cols(), &picks)
        })
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("lookback_days".to_string(), self.lookback_days.to_string()),
            ("top_k".to_string(), self.top_k.to_string()),
            (
                "ma_filter_days".to_string(),
                self.ma_filter_days
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "none".to_string()),
            ),
        ]
    }

    fn rebalance(&self) -> RebalanceFrequency {
        RebalanceFrequency::Monthly
    }
}

/// Equal-weight every instrument with positive trailing return, monthly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiAssetTrendEqual {
    lookback_days: usize,
}

impl MultiAssetTrendEqual {
    pub fn new(lookback_days: usize) -> Result<Self> {
        lookback(lookback_days)?;
        Ok(Self { lookback_days })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(params.window_or("lookback_days", 252)?)
    }
}

impl SignalPolicy for MultiAssetTrendEqual {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let mom = px.pct_change(self.lookback_days);
        monthly_weights(px, |i| {
            let eligible: Vec<usize> = (0..px.n_cols()).filter(|&j| mom.get(i, j) > 0.0).collect();
            equal_weights(px.n_cols(), &eligible)
        })
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![("lookback_days".to_string(), self.lookback_days.to_string())]
    }

    fn rebalance(&self) -> RebalanceFrequency {
        RebalanceFrequency::Monthly
    }
}

/// Positive-momentum instruments weighted by inverse annualized volatility.
///
/// # Parameters
/// - `lookback_days`: momentum horizon (default 252)
/// - `vol_days`: volatility window in daily returns (default 63)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendFollowInvVol {
    lookback_days: usize,
    vol_days: usize,
}

impl TrendFollowInvVol {
    pub fn new(lookback_days: usize, vol_days: usize) -> Result<Self> {
        lookback(lookback_days)?;
        if vol_days < 2 {
            return Err(BacktestError::InvalidParameter("Expected vol_days > 1".to_string()));
        }
        Ok(Self {
            lookback_days,
            vol_days,
        })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(
            params.window_or("lookback_days", 252)?,
            vol_days_param(params, 63)?,
        )
    }
}

impl SignalPolicy for TrendFollowInvVol {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let mom = px.pct_change(self.lookback_days);
        let vol = annualized_vol(px, self.vol_days);

        monthly_weights(px, |i| {
            let inv: Vec<f64> = (0..px.n_cols())
                .map(|j| {
                    let (m, v) = (mom.get(i, j), vol.get(i, j));
                    if m > 0.0 && v > 0.0 {
                        1.0 / v
                    } else {
                        0.0
                    }
                })
                .collect();
            normalize_row(&inv)
        })
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("lookback_days".to_string(), self.lookback_days.to_string()),
            ("vol_days".to_string(), self.vol_days.to_string()),
        ]
    }

    fn rebalance(&self) -> RebalanceFrequency {
        RebalanceFrequency::Monthly
    }
}

/// Top-N stocks by trailing return, monthly, equal weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquityMomentum {
    lookback_days: usize,
    top_k: usize,
}

impl EquityMomentum {
    pub fn new(lookback_days: usize, top_k: usize) -> Result<Self> {
        lookback(lookback_days)?;
        if top_k == 0 {
            return Err(BacktestError::InvalidParameter("Expected top_k > 0".to_string()));
        }
        Ok(Self {
            lookback_days,
            top_k,
        })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(params.window_or("lookback_days", 252)?, top_k_param(params, 50)?)
    }
}

impl SignalPolicy for EquityMomentum {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let mom = px.pct_change(self.lookback_days).replace_non_finite(f64::NAN);
        monthly_weights(px, |i| {
            let picks = select_top_n(mom.row(i), false, self.top_k);
            equal_weights(px.n_cols(), &picks)
        })
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("lookback_days".to_string(), self.lookback_days.to_string()),
            ("top_k".to_string(), self.top_k.to_string()),
        ]
    }

    fn rebalance(&self) -> RebalanceFrequency {
        RebalanceFrequency::Monthly
    }
}

fn lookback(days: usize) -> Result<()> {
    if days == 0 {
        return Err(BacktestError::InvalidParameter(
            "Expected lookback_days > 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::test_support::daily_index;
    use chrono::NaiveDate;

    /// Three instruments over Jan-Feb 2024: A rises fastest, B slower, C falls.
    fn trending() -> MarketData {
        let n = 60;
        let index = daily_index(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), n);
        let a = (0..n).map(|i| 100.0 * 1.01f64.powi(i as i32)).collect();
        let b = (0..n).map(|i| 100.0 * 1.005f64.powi(i as i32)).collect();
        let c = (0..n).map(|i| 100.0 * 0.99f64.powi(i as i32)).collect();
        let prices = Panel::from_columns(
            index,
            vec![("A".into(), a), ("B".into(), b), ("C".into(), c)],
        )
        .unwrap();
        MarketData::new(prices)
    }

    #[test]
    fn test_time_series_momentum() {
        let data = trending();
        let w = TimeSeriesMomentum::new(5).unwrap().weights(&data).unwrap();
        assert_eq!(w.row(4), &[0.0, 0.0, 0.0]);
        assert_eq!(w.row(5), &[0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_sector_rotation_picks_leaders_on_month_end() {
        let data = trending();
        let policy = SectorMomentumRotation::new(5, 1, None).unwrap();
        let w = policy.weights(&data).unwrap();
        // nothing decided before the first month end (Jan 31, row 30)
        assert_eq!(w.row(29), &[0.0, 0.0, 0.0]);
        assert_eq!(w.row(30), &[1.0, 0.0, 0.0]);
        assert_eq!(w.row(59), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sector_rotation_filter_excludes_downtrends() {
        let data = trending();
        let policy = SectorMomentumRotation::new(5, 3, Some(10)).unwrap();
        let w = policy.weights(&data).unwrap();
        // C is below its moving average, so only two names are held
        assert_eq!(w.row(30), &[0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_multi_asset_trend_equal() {
        let data = trending();
        let w = MultiAssetTrendEqual::new(20).unwrap().weights(&data).unwrap();
        assert_eq!(w.row(45), &[0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_inverse_vol_weights_favor_calmer_instrument() {
        let n = 40;
        let index = daily_index(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), n);
        // both trend up; B swings twice as much as A
        let a: Vec<f64> = (0..n)
            .map(|i| 100.0 + i as f64 + if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let b: Vec<f64> = (0..n)
            .map(|i| 100.0 + i as f64 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let prices = Panel::from_columns(index, vec![("A".into(), a), ("B".into(), b)]).unwrap();
        let w = TrendFollowInvVol::new(10, 5)
            .unwrap()
            .weights(&MarketData::new(prices))
            .unwrap();
        let row = w.row(30);
        assert!((row[0] + row[1] - 1.0).abs() < 1e-12);
        assert!(row[0] > row[1]);
    }

    #[test]
    fn test_top_n_with_fewer_eligible() {
        let data = trending();
        let w = EquityMomentum::new(5, 50).unwrap().weights(&data).unwrap();
        let row = w.row(30);
        for x in row {
            assert!((x - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_validation() {
        assert!(TimeSeriesMomentum::new(0).is_err());
        assert!(SectorMomentumRotation::new(10, 0, None).is_err());
        assert!(TrendFollowInvVol::new(10, 1).is_err());
        assert!(EquityMomentum::new(0, 5).is_err());
    }
}
