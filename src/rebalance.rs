//! Rebalance scheduling.
//!
//! Cross-sectional policies decide only on canonical rebalance dates (the last
//! trading day of each calendar month). The sparse decisions are then spread
//! over the daily index so weights stay constant between rebalances.

use crate::panel::Panel;
use crate::weights::normalize_weights;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How often a policy re-decides its weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    /// Every trading day.
    #[default]
    Daily,
    /// Last trading day of each calendar month.
    Monthly,
}

impl RebalanceFrequency {
    /// Dates on which a policy with this frequency makes a decision.
    pub fn rebalance_dates(&self, index: &[NaiveDate]) -> Vec<NaiveDate> {
        match self {
            RebalanceFrequency::Daily => index.to_vec(),
            RebalanceFrequency::Monthly => month_ends(index),
        }
    }
}

/// Last date of each calendar month present in `index`, ascending.
pub fn month_ends(index: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut last: BTreeMap<(i32, u32), NaiveDate> = BTreeMap::new();
    for &d in index {
        last.entry((d.year(), d.month()))
            .and_modify(|e| *e = (*e).max(d))
            .or_insert(d);
    }
    last.into_values().collect()
}

/// Spread sparse rebalance-day weights over the daily `index`.
///
/// An exact zero on a rebalance row means "no instruction", so each cell
/// carries its last nonzero value forward until the next nonzero value. Cells
/// with no prior instruction are zero. Rows are normalized afterwards.
///
/// A deliberate zero allocation cannot be told apart from "no instruction":
/// it inherits the previous nonzero weight for that instrument.
pub fn apply_monthly_rebalance(sparse: &Panel, index: &[NaiveDate]) -> Panel {
    let held = sparse
        .reindex(index, sparse.columns(), f64::NAN)
        .map(|w| if w == 0.0 { f64::NAN } else { w })
        .ffill()
        .fill_nan(0.0);
    normalize_weights(&held)
}
