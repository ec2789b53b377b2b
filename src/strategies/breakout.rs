//! Channel breakout.
//!
//! Enter when price closes above the highest price of the previous
//! `entry_days` observations; exit when it closes below the lowest price of the
//! previous `exit_days` observations. The channels exclude the current date.

use super::params::ParamMap;
use super::state::{run_state_machine, TransitionRule};
use super::SignalPolicy;
use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use crate::strategy::MarketData;
use crate::weights::normalize_weights;

/// Donchian-style channel breakout with a FLAT/LONG state per instrument.
///
/// # Parameters
/// - `entry_days`: entry channel length (default 20, must be > 1)
/// - `exit_days`: exit channel length (default 10, must be > 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBreakout {
    entry_days: usize,
    exit_days: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelObservation {
    price: f64,
    upper: f64,
    lower: f64,
}

impl TransitionRule for ChannelBreakout {
    type Observation = ChannelObservation;

    fn enter(&self, obs: ChannelObservation) -> bool {
        obs.price > obs.upper
    }

    fn exit(&self, obs: ChannelObservation) -> bool {
        obs.price < obs.lower
    }
}

impl ChannelBreakout {
    pub fn new(entry_days: usize, exit_days: usize) -> Result<Self> {
        if entry_days <= 1 || exit_days <= 1 {
            return Err(BacktestError::InvalidParameter(
                "Expected entry_days and exit_days > 1".to_string(),
            ));
        }
        Ok(Self {
            entry_days,
            exit_days,
        })
    }

    /// Support/resistance breakout: one window for both channels.
    pub fn symmetric(window_days: usize) -> Result<Self> {
        Self::new(window_days, window_days).map_err(|_| {
            BacktestError::InvalidParameter("Expected window_days > 1".to_string())
        })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(
            params.window_or("entry_days", 20)?,
            params.window_or("exit_days", 10)?,
        )
    }

    pub(crate) fn symmetric_from_params(params: &ParamMap) -> Result<Self> {
        Self::symmetric(params.window_or("window_days", 50)?)
    }

    pub fn entry_days(&self) -> usize {
        self.entry_days
    }

    pub fn exit_days(&self) -> usize {
        self.exit_days
    }
}

impl SignalPolicy for ChannelBreakout {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let upper = px.rolling_max(self.entry_days).shift(1);
        let lower = px.rolling_min(self.exit_days).shift(1);

        let raw = run_state_machine(self, px, |i, j| {
            let obs = ChannelObservation {
                price: px.get(i, j),
                upper: upper.get(i, j),
                lower: lower.get(i, j),
            };
            let missing = obs.price.is_nan() || obs.upper.is_nan() || obs.lower.is_nan();
            (!missing).then_some(obs)
        });
        Ok(normalize_weights(&raw))
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("entry_days".to_string(), self.entry_days.to_string()),
            ("exit_days".to_string(), self.exit_days.to_string()),
        ]
    }
}
