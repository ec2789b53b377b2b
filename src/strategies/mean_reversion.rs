//! Drawdown mean reversion.

use super::params::ParamMap;
use super::state::{run_state_machine, TransitionRule};
use super::SignalPolicy;
use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use crate::strategy::MarketData;
use crate::weights::normalize_weights;

/// Buy after a short-term drop, sell once the trailing return recovers.
///
/// # Parameters
/// - `lookback_days`: trailing return horizon (default 5)
/// - `entry_return`: enter when the trailing return is at or below this (default -0.03)
/// - `exit_return`: exit when the trailing return is at or above this (default 0.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownReversion {
    lookback_days: usize,
    entry_return: f64,
    exit_return: f64,
}

impl DrawdownReversion {
    pub fn new(lookback_days: usize, entry_return: f64, exit_return: f64) -> Result<Self> {
        if lookback_days == 0 {
            return Err(BacktestError::InvalidParameter(
                "Expected lookback_days > 0".to_string(),
            ));
        }
        Ok(Self {
            lookback_days,
            entry_return,
            exit_return,
        })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(
            params.window_or("lookback_days", 5)?,
            params.float_or("entry_return", -0.03)?,
            params.float_or("exit_return", 0.0)?,
        )
    }
}

impl TransitionRule for DrawdownReversion {
    type Observation = f64;

    fn enter(&self, trailing: f64) -> bool {
        trailing <= self.entry_return
    }

    fn exit(&self, trailing: f64) -> bool {
        trailing >= self.exit_return
    }
}

impl SignalPolicy for DrawdownReversion {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let trailing = px.pct_change(self.lookback_days);
        let raw = run_state_machine(self, px, |i, j| {
            let x = trailing.get(i, j);
            (!x.is_nan()).then_some(x)
        });
        Ok(normalize_weights(&raw))
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("lookback_days".to_string(), self.lookback_days.to_string()),
            ("entry_return".to_string(), self.entry_return.to_string()),
            ("exit_return".to_string(), self.exit_return.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::test_support::single;

    #[test]
    fn test_buys_the_dip_and_exits_on_recovery() {
        let prices = [100.0, 95.0, 94.0, 96.0, 100.0, 99.0];
        let policy = DrawdownReversion::new(1, -0.03, 0.0).unwrap();
        let w = policy.weights(&MarketData::new(single("A", &prices))).unwrap();
        // -5% enters; -1.05% holds; +2.1% exits
        assert_eq!(w.column(0), vec![0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_lookback_rejected() {
        let err = DrawdownReversion::new(0, -0.03, 0.0).unwrap_err();
        assert!(err.to_string().contains("lookback_days"));
    }
}
