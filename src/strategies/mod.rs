//! Signal policies.
//!
//! A policy maps market data to a raw weights panel shaped like the prices.
//! Policy kinds form a closed set resolved once, when a spec is loaded:
//!
//! Stateless threshold rules:
//! - [`BuyAndHold`]: every quoted instrument
//! - [`MovingAverageCrossover`]: fast SMA above slow SMA
//! - [`SingleMovingAverage`]: price above its SMA
//! - [`ThreeMovingAverages`]: fast > mid > slow
//! - [`TimeSeriesMomentum`]: positive trailing return
//!
//! Path-dependent rules (FLAT/LONG per instrument, see [`state`]):
//! - [`ChannelBreakout`]: Donchian entry/exit channels
//! - [`DrawdownReversion`]: buy short-term drops
//!
//! Monthly cross-sectional rules (decided on month ends, held in between):
//! - [`SectorMomentumRotation`], [`MultiAssetTrendEqual`], [`TrendFollowInvVol`]
//! - [`EquityMomentum`], [`EquityValue`], [`EquityLowVolatility`],
//!   [`EquityResidualMomentum`], [`EquityMultifactor`]

mod breakout;
mod factors;
mod mean_reversion;
mod momentum;
pub mod params;
pub mod state;
mod trend;

pub use breakout::ChannelBreakout;
pub use factors::{EquityLowVolatility, EquityMultifactor, EquityResidualMomentum, EquityValue};
pub use mean_reversion::DrawdownReversion;
pub use momentum::{
    EquityMomentum, MultiAssetTrendEqual, SectorMomentumRotation, TimeSeriesMomentum,
    TrendFollowInvVol,
};
pub use params::ParamMap;
pub use trend::{BuyAndHold, MovingAverageCrossover, SingleMovingAverage, ThreeMovingAverages};

use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use crate::rebalance::{apply_monthly_rebalance, RebalanceFrequency};
use crate::rolling::rolling_std;
use crate::strategy::MarketData;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Behaviour shared by every policy.
pub trait SignalPolicy {
    /// Raw target weights, same index and columns as `data.prices`.
    fn weights(&self, data: &MarketData) -> Result<Panel>;

    /// Parameter names and values, for display.
    fn parameters(&self) -> Vec<(String, String)>;

    /// Feature panels this policy reads from [`MarketData`].
    fn required_features(&self) -> Vec<String> {
        Vec::new()
    }

    fn rebalance(&self) -> RebalanceFrequency {
        RebalanceFrequency::Daily
    }
}

/// Every supported policy kind, as written in spec files.
pub const KNOWN_KINDS: &[&str] = &[
    "buy_and_hold",
    "channel_breakout",
    "equity_low_volatility",
    "equity_momentum",
    "equity_multifactor",
    "equity_residual_momentum",
    "equity_value",
    "mean_reversion_drawdown",
    "multi_asset_trend_equal",
    "sector_momentum_rotation",
    "single_moving_average",
    "sma_crossover",
    "support_resistance_breakout",
    "three_moving_averages",
    "time_series_momentum",
    "trend_follow_invvol",
    "two_moving_averages",
];

/// A resolved, validated policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Policy {
    BuyAndHold(BuyAndHold),
    SmaCrossover(MovingAverageCrossover),
    TwoMovingAverages(MovingAverageCrossover),
    SingleMovingAverage(SingleMovingAverage),
    ThreeMovingAverages(ThreeMovingAverages),
    TimeSeriesMomentum(TimeSeriesMomentum),
    ChannelBreakout(ChannelBreakout),
    SupportResistanceBreakout(ChannelBreakout),
    MeanReversionDrawdown(DrawdownReversion),
    SectorMomentumRotation(SectorMomentumRotation),
    MultiAssetTrendEqual(MultiAssetTrendEqual),
    TrendFollowInvVol(TrendFollowInvVol),
    EquityMomentum(EquityMomentum),
    EquityValue(EquityValue),
    EquityLowVolatility(EquityLowVolatility),
    EquityResidualMomentum(EquityResidualMomentum),
    EquityMultifactor(EquityMultifactor),
}

impl Policy {
    /// Resolve `kind` and validate its parameters. Missing keys take the
    /// kind's defaults; unrecognised keys are ignored with a warning.
    pub fn from_kind(kind: &str, params: &ParamMap) -> Result<Self> {
        let kind = kind.trim();
        let policy = match kind {
            "buy_and_hold" => Policy::BuyAndHold(BuyAndHold),
            "sma_crossover" => {
                Policy::SmaCrossover(MovingAverageCrossover::from_params(params, 20, 100)?)
            }
            "two_moving_averages" => {
                Policy::TwoMovingAverages(MovingAverageCrossover::from_params(params, 50, 200)?)
            }
            "single_moving_average" => {
                Policy::SingleMovingAverage(SingleMovingAverage::from_params(params)?)
            }
            "three_moving_averages" => {
                Policy::ThreeMovingAverages(ThreeMovingAverages::from_params(params)?)
            }
            "time_series_momentum" => {
                Policy::TimeSeriesMomentum(TimeSeriesMomentum::from_params(params)?)
            }
            "channel_breakout" => Policy::ChannelBreakout(ChannelBreakout::from_params(params)?),
            "support_resistance_breakout" => Policy::SupportResistanceBreakout(
                ChannelBreakout::symmetric_from_params(params)?,
            ),
            "mean_reversion_drawdown" => {
                Policy::MeanReversionDrawdown(DrawdownReversion::from_params(params)?)
            }
            "sector_momentum_rotation" => {
                Policy::SectorMomentumRotation(SectorMomentumRotation::from_params(params)?)
            }
            "multi_asset_trend_equal" => {
                Policy::MultiAssetTrendEqual(MultiAssetTrendEqual::from_params(params)?)
            }
            "trend_follow_invvol" => {
                Policy::TrendFollowInvVol(TrendFollowInvVol::from_params(params)?)
            }
            "equity_momentum" => Policy::EquityMomentum(EquityMomentum::from_params(params)?),
            "equity_value" => Policy::EquityValue(EquityValue::from_params(params)?),
            "equity_low_volatility" => {
                Policy::EquityLowVolatility(EquityLowVolatility::from_params(params)?)
            }
            "equity_residual_momentum" => {
                Policy::EquityResidualMomentum(EquityResidualMomentum::from_params(params)?)
            }
            "equity_multifactor" => {
                Policy::EquityMultifactor(EquityMultifactor::from_params(params)?)
            }
            _ => {
                return Err(BacktestError::UnknownStrategyKind {
                    kind: kind.to_string(),
                    known: KNOWN_KINDS.iter().map(|k| k.to_string()).collect(),
                })
            }
        };

        let known: Vec<String> = policy.parameters().into_iter().map(|(k, _)| k).collect();
        let known: Vec<&str> = known.iter().map(String::as_str).collect();
        let unknown = params.unknown_keys(&known);
        if !unknown.is_empty() {
            warn!("Ignoring unknown params for kind={}: {:?}", kind, unknown);
        }
        Ok(policy)
    }

    /// Every kind with its default parameters.
    pub fn catalog() -> Vec<Policy> {
        let defaults = ParamMap::new();
        KNOWN_KINDS
            .iter()
            .filter_map(|k| Policy::from_kind(k, &defaults).ok())
            .collect()
    }

    /// Kind name as written in spec files.
    pub fn kind(&self) -> &'static str {
        match self {
            Policy::BuyAndHold(_) => "buy_and_hold",
            Policy::SmaCrossover(_) => "sma_crossover",
            Policy::TwoMovingAverages(_) => "two_moving_averages",
            Policy::SingleMovingAverage(_) => "single_moving_average",
            Policy::ThreeMovingAverages(_) => "three_moving_averages",
            Policy::TimeSeriesMomentum(_) => "time_series_momentum",
            Policy::ChannelBreakout(_) => "channel_breakout",
            Policy::SupportResistanceBreakout(_) => "support_resistance_breakout",
            Policy::MeanReversionDrawdown(_) => "mean_reversion_drawdown",
            Policy::SectorMomentumRotation(_) => "sector_momentum_rotation",
            Policy::MultiAssetTrendEqual(_) => "multi_asset_trend_equal",
            Policy::TrendFollowInvVol(_) => "trend_follow_invvol",
            Policy::EquityMomentum(_) => "equity_momentum",
            Policy::EquityValue(_) => "equity_value",
            Policy::EquityLowVolatility(_) => "equity_low_volatility",
            Policy::EquityResidualMomentum(_) => "equity_residual_momentum",
            Policy::EquityMultifactor(_) => "equity_multifactor",
        }
    }

    fn inner(&self) -> &dyn SignalPolicy {
        match self {
            Policy::BuyAndHold(p) => p,
            Policy::SmaCrossover(p) | Policy::TwoMovingAverages(p) => p,
            Policy::SingleMovingAverage(p) => p,
            Policy::ThreeMovingAverages(p) => p,
            Policy::TimeSeriesMomentum(p) => p,
            Policy::ChannelBreakout(p) | Policy::SupportResistanceBreakout(p) => p,
            Policy::MeanReversionDrawdown(p) => p,
            Policy::SectorMomentumRotation(p) => p,
            Policy::MultiAssetTrendEqual(p) => p,
            Policy::TrendFollowInvVol(p) => p,
            Policy::EquityMomentum(p) => p,
            Policy::EquityValue(p) => p,
            Policy::EquityLowVolatility(p) => p,
            Policy::EquityResidualMomentum(p) => p,
            Policy::EquityMultifactor(p) => p,
        }
    }
}

impl SignalPolicy for Policy {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        debug!(
            "Computing weights kind={} rows={} cols={}",
            self.kind(),
            data.prices.n_rows(),
            data.prices.n_cols()
        );
        self.inner().weights(data)
    }

    fn parameters(&self) -> Vec<(String, String)> {
        match self {
            // single window drives both channels
            Policy::SupportResistanceBreakout(p) => {
                vec![("window_days".to_string(), p.entry_days().to_string())]
            }
            _ => self.inner().parameters(),
        }
    }

    fn required_features(&self) -> Vec<String> {
        self.inner().required_features()
    }

    fn rebalance(&self) -> RebalanceFrequency {
        self.inner().rebalance()
    }
}

/// Positions of the `top_k` best finite scores.
///
/// Descending by default, ascending for "lower is better" factors. Ties keep
/// column order.
pub fn select_top_n(scores: &[f64], ascending: bool, top_k: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..scores.len())
        .filter(|&j| scores[j].is_finite())
        .collect();
    ranked.sort_by(|&a, &b| {
        let ord = scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    ranked.truncate(top_k);
    ranked
}

/// Decide weights on each month end with `decide(row)` and hold them until the
/// next month end.
pub(crate) fn monthly_weights(
    prices: &Panel,
    mut decide: impl FnMut(usize) -> Vec<f64>,
) -> Result<Panel> {
    let dates = RebalanceFrequency::Monthly.rebalance_dates(prices.index());
    let mut rows = Vec::with_capacity(dates.len());
    for d in &dates {
        let i = prices.position_of(*d).ok_or_else(|| {
            BacktestError::DataError(format!("Rebalance date {} not in price index", d))
        })?;
        rows.push(decide(i));
    }
    let sparse = Panel::new(dates, prices.columns().to_vec(), rows)?;
    Ok(apply_monthly_rebalance(&sparse, prices.index()))
}

/// Trailing annualized volatility of daily simple returns.
pub(crate) fn annualized_vol(prices: &Panel, vol_days: usize) -> Panel {
    prices
        .pct_change(1)
        .replace_non_finite(f64::NAN)
        .map_columns(|c| rolling_std(c, vol_days))
        .map(|s| s * crate::analytics::TRADING_DAYS_PER_YEAR.sqrt())
}

/// Cross-sectional breadth.
pub(crate) fn top_k_param(params: &ParamMap, default: usize) -> Result<usize> {
    params.window_or("top_k", default)
}

/// Volatility windows need at least two returns.
pub(crate) fn vol_days_param(params: &ParamMap, default: usize) -> Result<usize> {
    let n = params.window_or("vol_days", default)?;
    if n < 2 {
        return Err(BacktestError::InvalidParameter("Expected vol_days > 1".to_string()));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::test_support::single;

    #[test]
    fn test_unknown_kind_lists_known_kinds() {
        let err = Policy::from_kind("sma", &ParamMap::new()).unwrap_err();
        match err {
            BacktestError::UnknownStrategyKind { kind, known } => {
                assert_eq!(kind, "sma");
                assert_eq!(known.len(), KNOWN_KINDS.len());
                assert!(known.windows(2).all(|w| w[0] < w[1]));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_every_kind_resolves_with_defaults() {
        let catalog = Policy::catalog();
        assert_eq!(catalog.len(), KNOWN_KINDS.len());
        for (policy, kind) in catalog.iter().zip(KNOWN_KINDS) {
            assert_eq!(policy.kind(), *kind);
        }
    }

    #[test]
    fn test_aliases_use_their_own_defaults() {
        let sma = Policy::from_kind("sma_crossover", &ParamMap::new()).unwrap();
        let two = Policy::from_kind("two_moving_averages", &ParamMap::new()).unwrap();
        assert_eq!(
            sma.parameters(),
            vec![("fast".into(), "20".into()), ("slow".into(), "100".into())]
        );
        assert_eq!(
            two.parameters(),
            vec![("fast".into(), "50".into()), ("slow".into(), "200".into())]
        );
        let sr = Policy::from_kind("support_resistance_breakout", &ParamMap::new()).unwrap();
        assert_eq!(sr.parameters(), vec![("window_days".into(), "50".into())]);
    }

    #[test]
    fn test_validation_happens_at_resolution() {
        let p = ParamMap::new().with("fast", 50).with("slow", 20);
        assert!(matches!(
            Policy::from_kind("sma_crossover", &p),
            Err(BacktestError::InvalidParameter(_))
        ));
        let p = ParamMap::new().with("top_k", 0);
        let err = Policy::from_kind("sector_momentum_rotation", &p).unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_top_k_type_error_keeps_its_message() {
        let p = ParamMap::new().with("top_k", "ten");
        let err = Policy::from_kind("equity_momentum", &p).unwrap_err();
        assert!(err.to_string().contains("Expected integer for top_k"), "{}", err);

        let p = ParamMap::new().with("top_k", -3);
        let err = Policy::from_kind("equity_momentum", &p).unwrap_err();
        assert!(err.to_string().contains("Expected top_k > 0"), "{}", err);
    }

    #[test]
    fn test_select_top_n() {
        let scores = [0.1, f64::NAN, 0.5, 0.3, 0.5];
        assert_eq!(select_top_n(&scores, false, 2), vec![2, 4]);
        assert_eq!(select_top_n(&scores, true, 2), vec![0, 3]);
        assert_eq!(select_top_n(&scores, false, 10), vec![2, 4, 3, 0]);
        assert!(select_top_n(&[f64::NAN], false, 3).is_empty());
    }

    #[test]
    fn test_policy_dispatch() {
        let data = MarketData::new(single("A", &[1.0, 2.0]));
        let policy = Policy::from_kind("buy_and_hold", &ParamMap::new()).unwrap();
        let w = policy.weights(&data).unwrap();
        assert_eq!(w.column(0), vec![1.0, 1.0]);
        assert_eq!(policy.rebalance(), RebalanceFrequency::Daily);
    }
}
