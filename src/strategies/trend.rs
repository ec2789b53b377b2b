//! Moving-average trend rules.
//!
//! Stateless: the target on each date depends only on the trailing window
//! ending that date. A window that is not yet full compares false, so warmup
//! rows are flat.

use super::params::ParamMap;
use super::SignalPolicy;
use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use crate::strategy::MarketData;
use crate::weights::normalize_weights;

/// Hold every instrument that has a quote, equally weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuyAndHold;

impl SignalPolicy for BuyAndHold {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        Ok(normalize_weights(&data.prices.notna()))
    }

    fn parameters(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Long while the fast SMA is above the slow SMA.
///
/// # Parameters
/// - `fast`: fast window (default 20, or 50 for `two_moving_averages`)
/// - `slow`: slow window (default 100, or 200 for `two_moving_averages`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverageCrossover {
    fast: usize,
    slow: usize,
}

impl MovingAverageCrossover {
    pub fn new(fast: usize, slow: usize) -> Result<Self> {
        if fast == 0 || slow == 0 || fast >= slow {
            return Err(BacktestError::InvalidParameter(
                "Expected 0 < fast < slow".to_string(),
            ));
        }
        Ok(Self { fast, slow })
    }

    pub(crate) fn from_params(params: &ParamMap, fast: i64, slow: i64) -> Result<Self> {
        let fast = params.int_or("fast", fast)?;
        let slow = params.int_or("slow", slow)?;
        if fast <= 0 || slow <= 0 {
            return Err(BacktestError::InvalidParameter(
                "Expected positive fast and slow windows".to_string(),
            ));
        }
        Self::new(fast as usize, slow as usize)
    }
}

impl SignalPolicy for MovingAverageCrossover {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let raw = px
            .rolling_mean(self.fast)
            .zip_with(&px.rolling_mean(self.slow), |f, s| indicator(f > s));
        Ok(normalize_weights(&raw))
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("fast".to_string(), self.fast.to_string()),
            ("slow".to_string(), self.slow.to_string()),
        ]
    }
}

/// Long while price is above its SMA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleMovingAverage {
    window: usize,
}

impl SingleMovingAverage {
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(BacktestError::InvalidParameter("Expected window > 0".to_string()));
        }
        Ok(Self { window })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        Self::new(params.window_or("window", 200)?)
    }
}

impl SignalPolicy for SingleMovingAverage {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let raw = px.zip_with(&px.rolling_mean(self.window), |p, m| indicator(p > m));
        Ok(normalize_weights(&raw))
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![("window".to_string(), self.window.to_string())]
    }
}

/// Long while the three SMAs are stacked fast > mid > slow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreeMovingAverages {
    fast: usize,
    mid: usize,
    slow: usize,
}

impl ThreeMovingAverages {
    pub fn new(fast: usize, mid: usize, slow: usize) -> Result<Self> {
        if !(0 < fast && fast < mid && mid < slow) {
            return Err(BacktestError::InvalidParameter(
                "Expected 0 < fast < mid < slow".to_string(),
            ));
        }
        Ok(Self { fast, mid, slow })
    }

    pub(crate) fn from_params(params: &ParamMap) -> Result<Self> {
        let fast = params.int_or("fast", 20)?;
        let mid = params.int_or("mid", 50)?;
        let slow = params.int_or("slow", 200)?;
        if fast <= 0 || mid <= 0 || slow <= 0 {
            return Err(BacktestError::InvalidParameter(
                "Expected positive fast, mid and slow windows".to_string(),
            ));
        }
        Self::new(fast as usize, mid as usize, slow as usize)
    }
}

impl SignalPolicy for ThreeMovingAverages {
    fn weights(&self, data: &MarketData) -> Result<Panel> {
        let px = &data.prices;
        let f = px.rolling_mean(self.fast);
        let m = px.rolling_mean(self.mid);
        let s = px.rolling_mean(self.slow);
        let fm = f.zip_with(&m, |a, b| indicator(a > b));
        let ms = m.zip_with(&s, |a, b| indicator(a > b));
        let raw = fm.zip_with(&ms, |a, b| a * b);
        Ok(normalize_weights(&raw))
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("fast".to_string(), self.fast.to_string()),
            ("mid".to_string(), self.mid.to_string()),
            ("slow".to_string(), self.slow.to_string()),
        ]
    }
}

fn indicator(cond: bool) -> f64 {
    if cond {
        1.0
    } else {
        0.0
    }
}
