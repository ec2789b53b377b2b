//! Date-indexed panels of real values.
//!
//! A [`Panel`] is a rectangular table whose rows are trading dates (strictly
//! increasing) and whose columns are unique instrument identifiers. Missing
//! observations are stored as `NaN` and are never treated as zero unless a
//! transformation says so explicitly.
//!
//! Every transformation returns a new panel; inputs are never mutated.

use crate::error::{BacktestError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A date × instrument table of `f64` values, stored row-major.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    index: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl Panel {
    /// Build a panel from an index, column labels and row-major values.
    ///
    /// Fails when the index is not strictly increasing, column labels repeat, or
    /// the value matrix is not `index.len() × columns.len()`.
    pub fn new(index: Vec<NaiveDate>, columns: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if let Some(pos) = index.windows(2).position(|w| w[0] >= w[1]) {
            return Err(BacktestError::InvalidInput(format!(
                "Panel index must be strictly increasing (row {} = {}, row {} = {})",
                pos,
                index[pos],
                pos + 1,
                index[pos + 1]
            )));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for c in &columns {
            if !seen.insert(c.as_str()) {
                return Err(BacktestError::InvalidInput(format!(
                    "Duplicate panel column: {}",
                    c
                )));
            }
        }

        if values.len() != index.len() {
            return Err(BacktestError::InvalidInput(format!(
                "Panel has {} dates but {} value rows",
                index.len(),
                values.len()
            )));
        }
        if let Some((i, row)) = values
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(BacktestError::InvalidInput(format!(
                "Panel row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self {
            index,
            columns,
            values,
        })
    }

    /// Build a panel from named column vectors sharing one index.
    pub fn from_columns(index: Vec<NaiveDate>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let n = index.len();
        if let Some((name, col)) = columns.iter().find(|(_, col)| col.len() != n) {
            return Err(BacktestError::InvalidInput(format!(
                "Column {} has {} values, index has {}",
                name,
                col.len(),
                n
            )));
        }
        let labels: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let values = (0..n)
            .map(|i| columns.iter().map(|(_, col)| col[i]).collect())
            .collect();
        Self::new(index, labels, values)
    }

    /// Panel with this panel's shape, every cell set to `value`.
    pub fn full_like(&self, value: f64) -> Self {
        self.with_values(vec![vec![value; self.n_cols()]; self.n_rows()])
    }

    /// Same index and columns, new values. Shape is the caller's responsibility.
    pub(crate) fn with_values(&self, values: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(values.len(), self.index.len());
        Self {
            index: self.index.clone(),
            columns: self.columns.clone(),
            values,
        }
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True when either axis has length zero.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[col]).collect()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Row position of `date`, if present.
    pub fn position_of(&self, date: NaiveDate) -> Option<usize> {
        self.index.binary_search(&date).ok()
    }

    /// Apply `f` to every cell.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        self.with_values(
            self.values
                .iter()
                .map(|row| row.iter().map(|&x| f(x)).collect())
                .collect(),
        )
    }

    /// Combine two panels of identical shape cell by cell.
    pub fn zip_with(&self, other: &Panel, f: impl Fn(f64, f64) -> f64) -> Self {
        debug_assert_eq!(self.n_rows(), other.n_rows());
        debug_assert_eq!(self.n_cols(), other.n_cols());
        self.with_values(
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect())
                .collect(),
        )
    }

    /// Transform each column independently. `f` must return a vector of the
    /// same length as its input.
    pub fn map_columns(&self, mut f: impl FnMut(&[f64]) -> Vec<f64>) -> Self {
        let mut values = vec![vec![f64::NAN; self.n_cols()]; self.n_rows()];
        for j in 0..self.n_cols() {
            let out = f(&self.column(j));
            debug_assert_eq!(out.len(), self.n_rows());
            for (row, v) in values.iter_mut().zip(out) {
                row[j] = v;
            }
        }
        self.with_values(values)
    }

    /// Conform to a new index and column set. Cells with no source are `fill`.
    ///
    /// `index` is expected to be strictly increasing, typically another panel's
    /// index.
    pub fn reindex(&self, index: &[NaiveDate], columns: &[String], fill: f64) -> Self {
        debug_assert!(index.windows(2).all(|w| w[0] < w[1]));
        let col_map: Vec<Option<usize>> = columns.iter().map(|c| self.column_position(c)).collect();
        let values = index
            .iter()
            .map(|d| match self.position_of(*d) {
                Some(i) => col_map
                    .iter()
                    .map(|src| src.map(|j| self.values[i][j]).unwrap_or(fill))
                    .collect(),
                None => vec![fill; columns.len()],
            })
            .collect();
        Self {
            index: index.to_vec(),
            columns: columns.to_vec(),
            values,
        }
    }

    /// Conform to another panel's index and columns.
    pub fn reindex_like(&self, other: &Panel, fill: f64) -> Self {
        self.reindex(&other.index, &other.columns, fill)
    }

    /// Point-in-time alignment: each target date takes, per column, the latest
    /// value observed on or before it. Used for fundamentals that are published
    /// on dates that need not be trading days.
    pub fn reindex_asof(&self, index: &[NaiveDate], columns: &[String]) -> Self {
        let filled = self.ffill();
        let col_map: Vec<Option<usize>> = columns.iter().map(|c| self.column_position(c)).collect();
        let values = index
            .iter()
            .map(|d| {
                let upto = self.index.partition_point(|x| x <= d);
                match upto.checked_sub(1) {
                    Some(i) => col_map
                        .iter()
                        .map(|src| src.map(|j| filled.values[i][j]).unwrap_or(f64::NAN))
                        .collect(),
                    None => vec![f64::NAN; columns.len()],
                }
            })
            .collect();
        Self {
            index: index.to_vec(),
            columns: columns.to_vec(),
            values,
        }
    }

    /// Propagate the last observed value down each column over `NaN` gaps.
    pub fn ffill(&self) -> Self {
        let mut values = self.values.clone();
        for j in 0..self.n_cols() {
            let mut last = f64::NAN;
            for row in values.iter_mut() {
                if row[j].is_nan() {
                    row[j] = last;
                } else {
                    last = row[j];
                }
            }
        }
        self.with_values(values)
    }

    pub fn fill_nan(&self, value: f64) -> Self {
        self.map(|x| if x.is_nan() { value } else { x })
    }

    /// Replace `NaN` and both infinities with `value`.
    pub fn replace_non_finite(&self, value: f64) -> Self {
        self.map(|x| if x.is_finite() { x } else { value })
    }

    /// Move values `periods` rows later. Leading rows become `NaN`.
    pub fn shift(&self, periods: usize) -> Self {
        let n = self.n_rows();
        let values = (0..n)
            .map(|i| {
                if i >= periods {
                    self.values[i - periods].clone()
                } else {
                    vec![f64::NAN; self.n_cols()]
                }
            })
            .collect();
        self.with_values(values)
    }

    /// Simple return over `periods` rows: `x[t] / x[t - periods] - 1`.
    ///
    /// Missing observations are not filled, so a gap on either end gives `NaN`.
    /// A zero base gives an infinity, left for the caller to handle.
    pub fn pct_change(&self, periods: usize) -> Self {
        let n = self.n_rows();
        let values = (0..n)
            .map(|i| {
                if periods == 0 {
                    return vec![0.0; self.n_cols()];
                }
                if i < periods {
                    return vec![f64::NAN; self.n_cols()];
                }
                self.values[i]
                    .iter()
                    .zip(&self.values[i - periods])
                    .map(|(&now, &then)| now / then - 1.0)
                    .collect()
            })
            .collect();
        self.with_values(values)
    }

    /// 1.0 where a value is present, 0.0 where it is `NaN`.
    pub fn notna(&self) -> Self {
        self.map(|x| if x.is_nan() { 0.0 } else { 1.0 })
    }

    /// Row sums, skipping `NaN`.
    pub fn row_sums(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|row| row.iter().filter(|x| !x.is_nan()).sum())
            .collect()
    }

    fn take_rows(&self, rows: impl Iterator<Item = usize>) -> Self {
        let mut index = Vec::new();
        let mut values = Vec::new();
        for i in rows {
            index.push(self.index[i]);
            values.push(self.values[i].clone());
        }
        Self {
            index,
            columns: self.columns.clone(),
            values,
        }
    }

    /// Last `n` rows.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.n_rows().saturating_sub(n);
        self.take_rows(start..self.n_rows())
    }

    /// Rows whose date is in `dates`, in this panel's order.
    pub fn select_dates(&self, dates: &[NaiveDate]) -> Self {
        let wanted: HashSet<&NaiveDate> = dates.iter().collect();
        self.take_rows((0..self.n_rows()).filter(|&i| wanted.contains(&self.index[i])))
    }

    /// Rows within the inclusive `[start, end]` window. `None` leaves that side open.
    pub fn filter_dates(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.take_rows((0..self.n_rows()).filter(|&i| {
            let d = self.index[i];
            start.is_none_or(|s| d >= s) && end.is_none_or(|e| d <= e)
        }))
    }

    /// Drop rows where every value is missing.
    pub fn drop_empty_rows(&self) -> Self {
        self.take_rows((0..self.n_rows()).filter(|&i| self.values[i].iter().any(|x| !x.is_nan())))
    }

    /// Drop columns where every value is missing.
    pub fn drop_empty_columns(&self) -> Self {
        let keep: Vec<usize> = (0..self.n_cols())
            .filter(|&j| self.values.iter().any(|row| !row[j].is_nan()))
            .collect();
        Self {
            index: self.index.clone(),
            columns: keep.iter().map(|&j| self.columns[j].clone()).collect(),
            values: self
                .values
                .iter()
                .map(|row| keep.iter().map(|&j| row[j]).collect())
                .collect(),
        }
    }

    /// Dates present in both panels, ascending.
    pub fn common_index(&self, other: &Panel) -> Vec<NaiveDate> {
        let theirs: HashSet<&NaiveDate> = other.index.iter().collect();
        self.index
            .iter()
            .filter(|d| theirs.contains(d))
            .copied()
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_new_rejects_unsorted_index() {
        let result = Panel::new(
            vec![d(2024, 1, 2), d(2024, 1, 1)],
            vec!["A".into()],
            vec![vec![1.0], vec![2.0]],
        );
        assert!(matches!(result, Err(BacktestError::InvalidInput(_))));
    }

    #[test]
    fn test_new_rejects_duplicate_columns() {
        let result = Panel::new(
            vec![d(2024, 1, 1)],
            vec!["A".into(), "A".into()],
            vec![vec![1.0, 2.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let result = Panel::new(
            vec![d(2024, 1, 1), d(2024, 1, 2)],
            vec!["A".into(), "B".into()],
            vec![vec![1.0, 2.0], vec![3.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_reindex_fills_missing_cells() {
        let p = Panel::from_columns(
            vec![d(2024, 1, 1), d(2024, 1, 3)],
            vec![("A".into(), vec![1.0, 3.0])],
        )
        .unwrap();
        let idx = vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)];
        let cols = vec!["A".to_string(), "B".to_string()];
        let r = p.reindex(&idx, &cols, 0.0);
        assert_eq!(r.n_rows(), 3);
        assert_eq!(r.row(0), &[1.0, 0.0]);
        assert_eq!(r.row(1), &[0.0, 0.0]);
        assert_eq!(r.row(2), &[3.0, 0.0]);
    }

    #[test]
    fn test_reindex_asof_uses_latest_prior_value() {
        // quarterly-style observations on non-trading dates
        let p = Panel::from_columns(
            vec![d(2024, 1, 1), d(2024, 1, 4)],
            vec![("A".into(), vec![10.0, 12.0])],
        )
        .unwrap();
        let idx = vec![d(2023, 12, 31), d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 5)];
        let r = p.reindex_asof(&idx, &["A".to_string()]);
        let col = r.column(0);
        assert!(col[0].is_nan());
        assert_eq!(&col[1..], &[10.0, 10.0, 12.0]);
    }

    #[test]
    fn test_ffill_keeps_leading_nan() {
        let p = single("A", &[f64::NAN, 1.0, f64::NAN, f64::NAN, 4.0]);
        let f = p.ffill();
        let col = f.column(0);
        assert!(col[0].is_nan());
        assert_eq!(&col[1..], &[1.0, 1.0, 1.0, 4.0]);
    }

    #[test]
    fn test_shift_and_pct_change() {
        let p = single("A", &[100.0, 110.0, f64::NAN, 121.0]);
        let s = p.shift(1).column(0);
        assert!(s[0].is_nan());
        assert_eq!(s[1], 100.0);

        let r = p.pct_change(1).column(0);
        assert!(r[0].is_nan());
        assert!((r[1] - 0.1).abs() < 1e-12);
        assert!(r[2].is_nan());
        assert!(r[3].is_nan());
    }

    #[test]
    fn test_pct_change_zero_base_is_infinite() {
        let p = single("A", &[0.0, 5.0]);
        assert!(p.pct_change(1).get(1, 0).is_infinite());
    }

    #[test]
    fn test_drop_empty_rows_and_columns() {
        let p = Panel::from_columns(
            vec![d(2024, 1, 1), d(2024, 1, 2)],
            vec![
                ("A".into(), vec![f64::NAN, 1.0]),
                ("B".into(), vec![f64::NAN, f64::NAN]),
            ],
        )
        .unwrap();
        let cleaned = p.drop_empty_rows().drop_empty_columns();
        assert_eq!(cleaned.n_rows(), 1);
        assert_eq!(cleaned.columns(), &["A".to_string()]);
    }

    #[test]
    fn test_filter_dates_and_tail() {
        let p = single("A", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let w = p.filter_dates(Some(d(2024, 1, 2)), Some(d(2024, 1, 4)));
        assert_eq!(w.column(0), vec![2.0, 3.0, 4.0]);
        assert_eq!(p.tail(2).column(0), vec![4.0, 5.0]);
        assert_eq!(p.tail(10).n_rows(), 5);
    }

    #[test]
    fn test_common_index() {
        let a = single("A", &[1.0, 2.0, 3.0]);
        let b = a.tail(2);
        assert_eq!(a.common_index(&b), b.index().to_vec());
    }
}
