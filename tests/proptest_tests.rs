//! Property-based tests using proptest for invariant testing.
//!
//! These tests verify that:
//! 1. Normalized weight rows are all zero or sum to one, and normalizing twice
//!    changes nothing
//! 2. Backtest turnover is never negative and equity stays positive for
//!    long-only weights
//! 3. Drawdown is within [-1, 0]
//! 4. Monthly rebalanced weights only change on month ends

use chrono::NaiveDate;
use proptest::prelude::*;

use paperlab::analytics::max_drawdown;
use paperlab::engine::{run_portfolio_backtest, BacktestConfig};
use paperlab::panel::Panel;
use paperlab::rebalance::{apply_monthly_rebalance, RebalanceFrequency};
use paperlab::weights::normalize_weights;

fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    (0..n).map(|i| start + chrono::Duration::days(i as i64)).collect()
}

fn panel(rows: Vec<Vec<f64>>, n_cols: usize) -> Panel {
    let columns = (0..n_cols).map(|j| format!("T{}", j)).collect();
    Panel::new(dates(rows.len()), columns, rows).unwrap()
}

/// Non-negative weights with some missing cells and all-zero rows.
fn weight_rows(n_cols: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(
        prop::collection::vec(
            prop_oneof![
                3 => 0.0..5.0f64,
                1 => Just(0.0),
                1 => Just(f64::NAN),
            ],
            n_cols,
        ),
        1..60,
    )
}

/// Positive price paths built from bounded daily moves.
fn price_rows(n_cols: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-0.2..0.2f64, n_cols), 2..80).prop_map(
        move |moves| {
            let mut level = vec![100.0; n_cols];
            moves
                .into_iter()
                .map(|m| {
                    for (p, r) in level.iter_mut().zip(m) {
                        *p *= 1.0 + r;
                    }
                    level.clone()
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn prop_normalized_rows_sum_to_one_or_zero(rows in weight_rows(4)) {
        let w = normalize_weights(&panel(rows, 4));
        for s in w.row_sums() {
            prop_assert!(s == 0.0 || (s - 1.0).abs() < 1e-9, "row sum {}", s);
        }
    }

    #[test]
    fn prop_normalize_is_idempotent(rows in weight_rows(3)) {
        let once = normalize_weights(&panel(rows, 3));
        let twice = normalize_weights(&once);
        for (a, b) in once.values().iter().flatten().zip(twice.values().iter().flatten()) {
            prop_assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn prop_turnover_non_negative_and_equity_positive(
        prices in price_rows(3),
        fee in 0.0..50.0f64,
        slippage in 0.0..50.0f64,
        seed in 0u64..1000,
    ) {
        let n = prices.len();
        let px = panel(prices, 3);
        // deterministic long-only weights that move around
        let raw: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..3).map(|j| ((i as u64 * 7 + j as u64 * 13 + seed) % 5) as f64).collect())
            .collect();
        let w = normalize_weights(&panel(raw, 3));

        let res = run_portfolio_backtest(&px, &w, &BacktestConfig::new(fee, slippage)).unwrap();
        prop_assert_eq!(res.len(), n);
        prop_assert!(res.turnover.iter().all(|&t| t >= 0.0));
        prop_assert!(res.turnover.iter().all(|&t| t <= 2.0 + 1e-9));
        prop_assert!(res.equity_curve.iter().all(|&e| e > 0.0 && e.is_finite()));

        let mdd = max_drawdown(&res.equity_curve);
        prop_assert!((-1.0..=0.0).contains(&mdd));
    }

    #[test]
    fn prop_monthly_weights_change_only_on_month_ends(rows in weight_rows(2)) {
        let n = rows.len();
        let idx = dates(n);
        let sparse = panel(rows, 2);
        let decisions = RebalanceFrequency::Monthly.rebalance_dates(&idx);
        let decided = sparse.select_dates(&decisions);

        let held = apply_monthly_rebalance(&decided, &idx);
        prop_assert_eq!(held.index(), &idx[..]);
        for i in 1..n {
            if held.row(i) != held.row(i - 1) {
                prop_assert!(decisions.contains(&idx[i]), "changed on {}", idx[i]);
            }
        }
    }
}
