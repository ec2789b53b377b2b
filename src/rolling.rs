//! Trailing-window transforms.
//!
//! Every window includes the current observation and needs `window` valid
//! values: a window that is not yet full, or that contains a `NaN`, yields
//! `NaN`. This keeps indicators lagged by construction and never lets missing
//! quotes leak in as zeros.

use crate::panel::Panel;
use std::collections::VecDeque;

/// Trailing sum over `window` observations.
pub fn rolling_sum(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }

    let mut sum = 0.0;
    let mut missing = 0usize;
    for i in 0..values.len() {
        let x = values[i];
        if x.is_finite() {
            sum += x;
        } else {
            missing += 1;
        }
        if i >= window {
            let old = values[i - window];
            if old.is_finite() {
                sum -= old;
            } else {
                missing -= 1;
            }
        }
        if i + 1 >= window && missing == 0 {
            out[i] = sum;
        }
    }
    out
}

/// Simple moving average over `window` observations.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling_sum(values, window)
        .into_iter()
        .map(|s| s / window as f64)
        .collect()
}

fn rolling_extreme(values: &[f64], window: usize, better: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }

    // Monotonic deque of indices; the front is the current extreme.
    let mut deque: VecDeque<usize> = VecDeque::new();
    let mut last_missing: Option<usize> = None;
    for i in 0..values.len() {
        let x = values[i];
        if x.is_nan() {
            last_missing = Some(i);
        } else {
            while let Some(&back) = deque.back() {
                if better(x, values[back]) || x == values[back] {
                    deque.pop_back();
                } else {
                    break;
                }
            }
            deque.push_back(i);
        }
        while let Some(&front) = deque.front() {
            if front + window <= i {
                deque.pop_front();
            } else {
                break;
            }
        }

        let full = i + 1 >= window;
        let clean = last_missing.is_none_or(|m| m + window <= i);
        if full && clean {
            if let Some(&front) = deque.front() {
                out[i] = values[front];
            }
        }
    }
    out
}

/// Trailing maximum over `window` observations.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling_extreme(values, window, |a, b| a > b)
}

/// Trailing minimum over `window` observations.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling_extreme(values, window, |a, b| a < b)
}

/// Trailing sample standard deviation (divisor `n - 1`).
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window < 2 {
        return out;
    }
    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|x| !x.is_finite()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
        out[i] = var.sqrt();
    }
    out
}

impl Panel {
    pub fn rolling_mean(&self, window: usize) -> Panel {
        self.map_columns(|c| rolling_mean(c, window))
    }

    pub fn rolling_max(&self, window: usize) -> Panel {
        self.map_columns(|c| rolling_max(c, window))
    }

    pub fn rolling_min(&self, window: usize) -> Panel {
        self.map_columns(|c| rolling_min(c, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rolling_mean_warmup() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!(approx(out[2], 2.0));
        assert!(approx(out[3], 3.0));
    }

    #[test]
    fn test_rolling_mean_nan_poisons_window() {
        let out = rolling_mean(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert!(approx(out[3], 3.5));
        assert!(approx(out[4], 4.5));
    }

    #[test]
    fn test_rolling_max_min() {
        let v = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0];
        let hi = rolling_max(&v, 3);
        let lo = rolling_min(&v, 3);
        assert!(hi[1].is_nan());
        assert_eq!(&hi[2..], &[4.0, 4.0, 5.0, 9.0, 9.0]);
        assert_eq!(&lo[2..], &[1.0, 1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_rolling_max_recovers_after_nan() {
        let v = [1.0, f64::NAN, 2.0, 3.0, 1.0];
        let hi = rolling_max(&v, 2);
        assert!(hi[1].is_nan());
        assert!(hi[2].is_nan());
        assert_eq!(hi[3], 3.0);
        assert_eq!(hi[4], 3.0);
    }

    #[test]
    fn test_rolling_std_sample() {
        let out = rolling_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        // sample std of the classic example: sqrt(32 / 7)
        assert!(approx(out[7], (32.0_f64 / 7.0).sqrt()));
        assert!(out[6].is_nan());
    }

    #[test]
    fn test_rolling_sum_zero_window() {
        assert!(rolling_sum(&[1.0, 2.0], 0).iter().all(|x| x.is_nan()));
    }
}
