//! Performance benchmarks for the backtest engine and policies.
//!
//! Run with: cargo bench

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use paperlab::engine::{run_portfolio_backtest, BacktestConfig};
use paperlab::panel::Panel;
use paperlab::strategies::ParamMap;
use paperlab::strategy::{run_strategy_weights, MarketData, StrategySpec, Universe};
use paperlab::weights::normalize_weights;

/// Generate a synthetic price panel for benchmarking.
fn generate_prices(days: usize, instruments: usize) -> Panel {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let index = (0..days)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect();
    let columns = (0..instruments)
        .map(|j| {
            let mut price = 100.0;
            let values = (0..days)
                .map(|i| {
                    let x = i as f64 + j as f64 * 3.1;
                    let noise = ((x * 0.7).sin() * 2.0 + (x * 1.3).cos()) * 0.005;
                    price *= 1.0 + 0.0003 * (j % 3) as f64 + noise;
                    price
                })
                .collect();
            (format!("T{:03}", j), values)
        })
        .collect();
    Panel::from_columns(index, columns).unwrap()
}

fn spec(kind: &str) -> StrategySpec {
    StrategySpec::new(kind, kind, kind, ParamMap::new(), Universe::Tickers(vec![])).unwrap()
}

/// Benchmark the vectorized engine.
fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest");
    let config = BacktestConfig::new(1.0, 2.0);

    for instruments in [1, 10, 100].iter() {
        let prices = generate_prices(1260, *instruments);
        let weights = normalize_weights(&prices.full_like(1.0));

        group.bench_with_input(
            BenchmarkId::new("equal_weight_1260d", instruments),
            instruments,
            |b, _| b.iter(|| run_portfolio_backtest(black_box(&prices), &weights, &config)),
        );
    }

    group.finish();
}

/// Benchmark weight generation per policy.
fn bench_policies(c: &mut Criterion) {
    let data = MarketData::new(generate_prices(1260, 50));
    let mut group = c.benchmark_group("policies");

    for kind in [
        "sma_crossover",
        "channel_breakout",
        "time_series_momentum",
        "sector_momentum_rotation",
        "trend_follow_invvol",
        "equity_momentum",
        "equity_low_volatility",
    ] {
        let s = spec(kind);
        group.bench_function(kind, |b| {
            b.iter(|| run_strategy_weights(black_box(&data), &s))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_backtest, bench_policies);
criterion_main!(benches);
