//! Weight normalization.
//!
//! Policies emit raw indicator weights (typically 0/1 per instrument). Before
//! they reach the engine each row is projected onto the budget simplex: the row
//! either sums to one or is entirely flat.

use crate::panel::Panel;

/// Normalize a single row.
///
/// Non-finite cells become zero. A row whose sum is nonzero is divided by the
/// absolute value of that sum; a zero-sum row is returned as all zeros.
pub fn normalize_row(row: &[f64]) -> Vec<f64> {
    let clean: Vec<f64> = row
        .iter()
        .map(|&w| if w.is_finite() { w } else { 0.0 })
        .collect();
    let total: f64 = clean.iter().sum();
    if total.abs() > 0.0 {
        let scale = total.abs();
        clean.into_iter().map(|w| w / scale).collect()
    } else {
        vec![0.0; clean.len()]
    }
}

/// Normalize every row of a weights panel.
///
/// Idempotent: a row that already sums to one is divided by one.
pub fn normalize_weights(weights: &Panel) -> Panel {
    weights.with_values(weights.values().iter().map(|row| normalize_row(row)).collect())
}

/// Equal weights `1/n` for the selected column positions, zero elsewhere.
pub fn equal_weights(n_cols: usize, selected: &[usize]) -> Vec<f64> {
    let mut row = vec![0.0; n_cols];
    if selected.is_empty() {
        return row;
    }
    let w = 1.0 / selected.len() as f64;
    for &j in selected {
        row[j] = w;
    }
    row
}
