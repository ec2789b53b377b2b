//! Sharpe-ranked leaderboard over a set of strategy specs.
//!
//! Every strategy is backtested on the dates it shares with the benchmark,
//! next to a buy-and-hold run of the benchmark over the same dates and costs,
//! so the `*_vs_bh` columns compare like with like.

use crate::analytics::{MetricsConfig, PerformanceMetrics};
use crate::config::LabConfig;
use crate::data::DataSource;
use crate::engine::{
    average_exposure, run_portfolio_backtest, BacktestConfig, PortfolioBacktestResult,
};
use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use crate::strategies::{Policy, SignalPolicy};
use crate::strategy::{run_strategy_weights, MarketData, StrategySpec, Universe};
use crate::universe::build_liquid_universe;
use chrono::{Local, NaiveDate};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use tabled::{builder::Builder, settings::Style};
use tracing::{debug, info, warn};

/// Trading days per year used for the trailing window.
const TRADING_DAYS: usize = 252;

/// Evaluation window, costs and benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardOptions {
    pub backtest: BacktestConfig,
    pub metrics: MetricsConfig,
    /// Trailing years kept when `start` is unset.
    pub years: u32,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub benchmark: String,
    pub min_days: usize,
    pub show_progress: bool,
}

impl Default for LeaderboardOptions {
    fn default() -> Self {
        Self {
            backtest: BacktestConfig::default(),
            metrics: MetricsConfig::default(),
            years: 5,
            start: None,
            end: None,
            benchmark: "SPY".to_string(),
            min_days: TRADING_DAYS,
            show_progress: false,
        }
    }
}

impl LeaderboardOptions {
    pub fn from_config(config: &LabConfig) -> Result<Self> {
        Ok(Self {
            backtest: config.to_backtest_config()?,
            metrics: config.metrics,
            years: config.backtest.years,
            start: config.start_date()?,
            end: config.end_date()?,
            benchmark: config.leaderboard.benchmark.trim().to_ascii_uppercase(),
            min_days: config.leaderboard.min_days,
            show_progress: false,
        })
    }

    pub fn bench_id(&self) -> String {
        format!("bh-{}", self.benchmark.to_lowercase())
    }
}

/// One leaderboard line. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub paper_section: String,
    pub id: String,
    pub name: String,
    pub kind: String,
    pub universe: String,
    pub start_date: String,
    pub end_date: String,
    pub days: usize,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub cagr: f64,
    pub vol: f64,
    pub maxdd: f64,
    pub avg_exposure: f64,
    pub avg_turnover: f64,
    pub bench_id: String,
    pub bench_sharpe: f64,
    pub bench_sortino: f64,
    pub bench_calmar: f64,
    pub bench_cagr: f64,
    pub bench_vol: f64,
    pub bench_maxdd: f64,
    pub sharpe_vs_bh: f64,
    pub sortino_vs_bh: f64,
    pub calmar_vs_bh: f64,
    pub cagr_vs_bh: f64,
    pub maxdd_vs_bh: f64,
}

/// Resolve a spec's universe to tickers plus a display label.
fn resolve_universe(
    source: &dyn DataSource,
    spec: &StrategySpec,
    opts: &LeaderboardOptions,
) -> Result<(Vec<String>, String)> {
    match &spec.universe {
        Universe::Tickers(tickers) => Ok((tickers.clone(), spec.universe.label(None))),
        Universe::Liquid(cfg) => {
            let tickers = build_liquid_universe(source, cfg, opts.start, opts.end)?;
            let label = spec.universe.label(Some(tickers.len()));
            Ok((tickers, label))
        }
    }
}

/// Feature panels the policy asks for. The residual-momentum benchmark comes
/// from the benchmark prices, everything else from the metrics file.
fn load_features(
    source: &dyn DataSource,
    spec: &StrategySpec,
    prices: &Panel,
    bench: &Panel,
    opts: &LeaderboardOptions,
) -> Result<MarketData> {
    let mut data = MarketData::new(prices.clone());
    for name in spec.policy.required_features() {
        let panel = match &spec.policy {
            Policy::EquityResidualMomentum(p) if p.benchmark() == name => bench.clone(),
            _ => source.load_metric(prices.columns(), &name, opts.start, opts.end)?,
        };
        data = data.with_feature(name, panel);
    }
    Ok(data)
}

/// Prices of the spec's universe over the evaluation window: the trailing
/// `years` unless a start date is set, without all-empty rows or columns.
/// Empty when the universe is empty or nothing is on file.
fn load_window_prices(
    source: &dyn DataSource,
    spec: &StrategySpec,
    opts: &LeaderboardOptions,
) -> Result<(Panel, String)> {
    let (tickers, universe) = resolve_universe(source, spec, opts)?;
    if tickers.is_empty() {
        return Ok((Panel::default(), universe));
    }

    let mut prices = source.load_prices(&tickers, opts.start, opts.end)?;
    if opts.start.is_none() {
        prices = prices.tail(TRADING_DAYS * opts.years as usize);
    }
    Ok((prices.drop_empty_rows().drop_empty_columns(), universe))
}

/// Result of backtesting a single spec.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyRun {
    pub id: String,
    pub name: String,
    pub universe: String,
    pub metrics: PerformanceMetrics,
    pub result: PortfolioBacktestResult,
}

/// Backtest one spec on its own, without benchmark alignment.
///
/// Errors when the universe is empty or has no prices in the window.
pub fn backtest_strategy(
    source: &dyn DataSource,
    spec: &StrategySpec,
    opts: &LeaderboardOptions,
) -> Result<StrategyRun> {
    opts.backtest.validate()?;
    if spec.universe.is_empty() {
        return Err(BacktestError::InvalidInput(format!(
            "Strategy {:?} has no universe",
            spec.id
        )));
    }
    let (px, universe) = load_window_prices(source, spec, opts)?;
    if px.is_empty() {
        return Err(BacktestError::DataError(format!(
            "No prices for strategy {:?} ({})",
            spec.id, universe
        )));
    }

    let bench = if matches!(spec.policy, Policy::EquityResidualMomentum(_)) {
        source
            .load_prices(std::slice::from_ref(&opts.benchmark), opts.start, opts.end)?
            .reindex(px.index(), &[opts.benchmark.clone()], f64::NAN)
    } else {
        Panel::default()
    };
    let data = load_features(source, spec, &px, &bench, opts)?;
    let weights = run_strategy_weights(&data, spec)?;
    let result = run_portfolio_backtest(&px, &weights, &opts.backtest)?;
    let metrics = PerformanceMetrics::from_result(&result, &opts.metrics);

    Ok(StrategyRun {
        id: spec.id.clone(),
        name: spec.name.clone(),
        universe,
        metrics,
        result,
    })
}

/// Backtest one spec against the benchmark. `None` when the strategy has no
/// usable data in the window.
fn evaluate(
    source: &dyn DataSource,
    spec: &StrategySpec,
    bench_full: &Panel,
    opts: &LeaderboardOptions,
) -> Result<Option<LeaderboardRow>> {
    let (prices, universe) = load_window_prices(source, spec, opts)?;
    if prices.is_empty() {
        warn!("Skipping {}: no prices for {:?}", spec.id, universe);
        return Ok(None);
    }

    let common = prices.common_index(bench_full);
    if common.len() < opts.min_days {
        info!(
            "Skipping {}: {} dates in common with {} (need {})",
            spec.id,
            common.len(),
            opts.benchmark,
            opts.min_days
        );
        return Ok(None);
    }
    let px = prices.select_dates(&common);
    let bench_px = bench_full.select_dates(&common);

    let data = load_features(source, spec, &px, &bench_px, opts)?;
    let weights = run_strategy_weights(&data, spec)?;
    let avg_exposure = average_exposure(&weights);

    let bt = run_portfolio_backtest(&px, &weights, &opts.backtest)?;
    let bench_bt = run_portfolio_backtest(&bench_px, &bench_px.full_like(1.0), &opts.backtest)?;

    let m = PerformanceMetrics::from_result(&bt, &opts.metrics);
    let b = PerformanceMetrics::from_result(&bench_bt, &opts.metrics);
    debug!("{}: sharpe {:.2} vs benchmark {:.2}", spec.id, m.sharpe, b.sharpe);

    let (start_date, end_date) = match (common.first(), common.last()) {
        (Some(s), Some(e)) => (s.to_string(), e.to_string()),
        _ => (String::new(), String::new()),
    };

    Ok(Some(LeaderboardRow {
        paper_section: spec.paper_section.clone().unwrap_or_default(),
        id: spec.id.clone(),
        name: spec.name.clone(),
        kind: spec.kind().to_string(),
        universe,
        start_date,
        end_date,
        days: px.n_rows(),
        sharpe: m.sharpe,
        sortino: m.sortino,
        calmar: m.calmar,
        cagr: m.cagr,
        vol: m.volatility,
        maxdd: m.max_drawdown,
        avg_exposure,
        avg_turnover: bt.average_turnover(),
        bench_id: opts.bench_id(),
        bench_sharpe: b.sharpe,
        bench_sortino: b.sortino,
        bench_calmar: b.calmar,
        bench_cagr: b.cagr,
        bench_vol: b.volatility,
        bench_maxdd: b.max_drawdown,
        sharpe_vs_bh: m.sharpe - b.sharpe,
        sortino_vs_bh: m.sortino - b.sortino,
        calmar_vs_bh: m.calmar - b.calmar,
        cagr_vs_bh: m.cagr - b.cagr,
        maxdd_vs_bh: m.max_drawdown - b.max_drawdown,
    }))
}

fn progress_bar(len: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Backtest every spec and rank by Sharpe, best first.
///
/// Strategies without enough data are skipped. Errors from any strategy
/// abort the run, and so does a run where every strategy was skipped.
pub fn run_leaderboard(
    source: &dyn DataSource,
    specs: &[StrategySpec],
    opts: &LeaderboardOptions,
) -> Result<Vec<LeaderboardRow>> {
    opts.backtest.validate()?;

    let bench = source
        .load_prices(std::slice::from_ref(&opts.benchmark), opts.start, opts.end)?
        .drop_empty_rows();
    if bench.is_empty() {
        return Err(BacktestError::DataError(format!(
            "Benchmark {} has no prices in the window",
            opts.benchmark
        )));
    }
    info!(
        "Running leaderboard of {} strategies against {} ({} dates)",
        specs.len(),
        opts.benchmark,
        bench.n_rows()
    );

    let pb = progress_bar(specs.len(), opts.show_progress);
    let results: Vec<Option<LeaderboardRow>> = specs
        .par_iter()
        .map(|spec| {
            let row = evaluate(source, spec, &bench, opts);
            pb.set_message(spec.id.clone());
            pb.inc(1);
            row
        })
        .collect::<Result<_>>()?;
    pb.finish_and_clear();

    let mut rows: Vec<LeaderboardRow> = results.into_iter().flatten().collect();
    if rows.is_empty() {
        return Err(BacktestError::DataError(
            "No strategies produced results (check universe/tickers)".to_string(),
        ));
    }
    rows.sort_by(|a, b| b.sharpe.partial_cmp(&a.sharpe).unwrap_or(Ordering::Equal));
    info!("Leaderboard has {} of {} strategies", rows.len(), specs.len());
    Ok(rows)
}

fn ratio(x: f64) -> String {
    format!("{:.2}", x)
}

fn pct(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}

fn signed_ratio(x: f64) -> String {
    format!("{:+.2}", x)
}

fn signed_pct(x: f64) -> String {
    format!("{:+.2}%", x * 100.0)
}

/// Print the ranked table to the terminal.
pub fn print_leaderboard(title: &str, rows: &[LeaderboardRow]) {
    let mut builder = Builder::new();
    builder.push_record([
        "paper_section",
        "id",
        "sharpe",
        "sortino",
        "calmar",
        "cagr",
        "vol",
        "maxdd",
        "sharpe_vs_bh",
        "avg_exposure",
        "avg_turnover",
    ]);
    for r in rows {
        let vs = signed_ratio(r.sharpe_vs_bh);
        let vs = if r.sharpe_vs_bh >= 0.0 {
            vs.green().to_string()
        } else {
            vs.red().to_string()
        };
        builder.push_record([
            r.paper_section.clone(),
            r.id.clone(),
            ratio(r.sharpe),
            ratio(r.sortino),
            ratio(r.calmar),
            pct(r.cagr),
            pct(r.vol),
            pct(r.maxdd),
            vs,
            ratio(r.avg_exposure),
            ratio(r.avg_turnover),
        ]);
    }
    println!("{}", title.bold());
    println!("{}", builder.build().with(Style::rounded()));
}

/// Write all rows with every column.
pub fn write_csv(rows: &[LeaderboardRow], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {} rows -> {}", rows.len(), path.display());
    Ok(())
}

const MARKDOWN_COLUMNS: [&str; 28] = [
    "paper_section",
    "id",
    "name",
    "kind",
    "universe",
    "start_date",
    "end_date",
    "days",
    "sharpe",
    "sortino",
    "calmar",
    "cagr",
    "vol",
    "maxdd",
    "avg_exposure",
    "avg_turnover",
    "bench_id",
    "bench_sharpe",
    "bench_sortino",
    "bench_calmar",
    "bench_cagr",
    "bench_vol",
    "bench_maxdd",
    "sharpe_vs_bh",
    "sortino_vs_bh",
    "calmar_vs_bh",
    "cagr_vs_bh",
    "maxdd_vs_bh",
];

fn markdown_cells(r: &LeaderboardRow) -> [String; 28] {
    [
        r.paper_section.clone(),
        r.id.clone(),
        r.name.clone(),
        r.kind.clone(),
        r.universe.clone(),
        r.start_date.clone(),
        r.end_date.clone(),
        r.days.to_string(),
        ratio(r.sharpe),
        ratio(r.sortino),
        ratio(r.calmar),
        pct(r.cagr),
        pct(r.vol),
        pct(r.maxdd),
        ratio(r.avg_exposure),
        ratio(r.avg_turnover),
        r.bench_id.clone(),
        ratio(r.bench_sharpe),
        ratio(r.bench_sortino),
        ratio(r.bench_calmar),
        pct(r.bench_cagr),
        pct(r.bench_vol),
        pct(r.bench_maxdd),
        signed_ratio(r.sharpe_vs_bh),
        signed_ratio(r.sortino_vs_bh),
        signed_ratio(r.calmar_vs_bh),
        signed_pct(r.cagr_vs_bh),
        signed_pct(r.maxdd_vs_bh),
    ]
}

/// Markdown report: assumptions followed by the full ranked table.
pub fn to_markdown(rows: &[LeaderboardRow], opts: &LeaderboardOptions, generated: &str) -> String {
    let mut lines = vec![
        "# Results".to_string(),
        String::new(),
        format!("Generated: `{}`", generated),
        String::new(),
        "## Inputs & Assumptions".to_string(),
        String::new(),
    ];
    match opts.start {
        Some(start) => {
            let end = opts.end.map(|e| format!(", end=`{}`", e)).unwrap_or_default();
            lines.push(format!("- Window: start=`{}`{}", start, end));
        }
        None => lines.push(format!(
            "- Window: trailing `{}` years (about `{}` trading days)",
            opts.years,
            TRADING_DAYS * opts.years as usize
        )),
    }
    lines.push("- Frequency: daily close-to-close; positions applied with a 1-day lag.".to_string());
    lines.push(format!(
        "- Costs: fee={} bps, slippage={} bps (applied to turnover).",
        opts.backtest.fee_bps, opts.backtest.slippage_bps
    ));
    lines.push(format!("- Benchmark: buy-and-hold `{}`.", opts.benchmark));
    lines.push(String::new());
    lines.push("## Leaderboard (Sharpe-ranked)".to_string());
    lines.push(String::new());

    lines.push(format!("| {} |", MARKDOWN_COLUMNS.join(" | ")));
    lines.push(format!("|{}|", vec!["---"; MARKDOWN_COLUMNS.len()].join("|")));
    for r in rows {
        lines.push(format!("| {} |", markdown_cells(r).join(" | ")));
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Write the Markdown report stamped with the local time.
pub fn write_markdown(
    rows: &[LeaderboardRow],
    opts: &LeaderboardOptions,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    fs::write(path, to_markdown(rows, opts, &now))?;
    info!("Wrote {} rows -> {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::test_support::daily_index;
    use crate::strategies::ParamMap;
    use std::collections::BTreeMap;

    /// Serves fixed panels, filtered like the CSV source.
    struct MemorySource {
        prices: Panel,
        volume: Panel,
        metrics: BTreeMap<String, Panel>,
    }

    fn pick(panel: &Panel, tickers: &[String]) -> Panel {
        let cols: Vec<String> = tickers
            .iter()
            .filter(|t| panel.column_position(t).is_some())
            .cloned()
            .collect();
        panel.reindex(panel.index(), &cols, f64::NAN)
    }

    impl DataSource for MemorySource {
        fn load_prices(
            &self,
            tickers: &[String],
            start: Option<NaiveDate>,
            end: Option<NaiveDate>,
        ) -> Result<Panel> {
            Ok(pick(&self.prices, tickers).filter_dates(start, end))
        }

        fn load_metric(
            &self,
            tickers: &[String],
            field: &str,
            _start: Option<NaiveDate>,
            end: Option<NaiveDate>,
        ) -> Result<Panel> {
            let panel = self.metrics.get(field).ok_or_else(|| BacktestError::UnknownFeature {
                name: field.to_string(),
                available: self.metrics.keys().cloned().collect(),
            })?;
            Ok(pick(panel, tickers).filter_dates(None, end))
        }

        fn load_liquidity(
            &self,
            start: Option<NaiveDate>,
            end: Option<NaiveDate>,
        ) -> Result<(Panel, Panel)> {
            Ok((
                self.prices.filter_dates(start, end),
                self.volume.filter_dates(start, end),
            ))
        }
    }

    fn source(n: usize) -> MemorySource {
        let idx = daily_index(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), n);
        // drift plus a bounded wiggle so returns have real dispersion
        let series = |start: f64, step: f64, phase: f64| -> Vec<f64> {
            (0..n)
                .map(|i| {
                    let x = i as f64;
                    start * (1.0 + step).powf(x) * (1.0 + 0.01 * (x + phase).sin())
                })
                .collect()
        };
        let prices = Panel::from_columns(
            idx.clone(),
            vec![
                ("SPY".into(), series(100.0, 0.0005, 0.0)),
                ("UP".into(), series(50.0, 0.001, 1.0)),
                ("DOWN".into(), series(80.0, -0.0005, 2.0)),
            ],
        )
        .unwrap();
        let volume = prices.full_like(1e6);
        let pe = Panel::from_columns(
            idx[..1].to_vec(),
            vec![("UP".into(), vec![10.0]), ("DOWN".into(), vec![30.0])],
        )
        .unwrap();
        MemorySource {
            prices,
            volume,
            metrics: BTreeMap::from([("pe".to_string(), pe)]),
        }
    }

    fn spec(id: &str, kind: &str, params: ParamMap, universe: Universe) -> StrategySpec {
        StrategySpec::new(id, id, kind, params, universe).unwrap()
    }

    fn tickers(ts: &[&str]) -> Universe {
        Universe::Tickers(ts.iter().map(|t| t.to_string()).collect())
    }

    fn opts() -> LeaderboardOptions {
        LeaderboardOptions {
            min_days: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_ranks_by_sharpe() {
        let src = source(300);
        let specs = vec![
            spec("down", "buy_and_hold", ParamMap::new(), tickers(&["DOWN"])),
            spec("up", "buy_and_hold", ParamMap::new(), tickers(&["UP"])),
        ];
        let rows = run_leaderboard(&src, &specs, &opts()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "up");
        assert!(rows[0].sharpe >= rows[1].sharpe);
        assert_eq!(rows[0].bench_id, "bh-spy");
        assert_eq!(rows[0].days, 300);
        assert_eq!(rows[0].start_date, "2020-01-01");
        assert!((rows[0].sharpe_vs_bh - (rows[0].sharpe - rows[0].bench_sharpe)).abs() < 1e-12);
        assert!(rows[0].cagr_vs_bh > 0.0);
        assert!(rows[1].cagr < 0.0);
        // held from day 2 of 300
        assert!((rows[0].avg_exposure - 299.0 / 300.0).abs() < 1e-12);
    }

    #[test]
    fn test_benchmark_against_itself() {
        let src = source(300);
        let specs = vec![spec("spy", "buy_and_hold", ParamMap::new(), tickers(&["SPY"]))];
        let rows = run_leaderboard(&src, &specs, &opts()).unwrap();
        assert!(rows[0].sharpe_vs_bh.abs() < 1e-12);
        assert!(rows[0].maxdd_vs_bh.abs() < 1e-12);
    }

    #[test]
    fn test_trailing_window() {
        let src = source(400);
        let o = LeaderboardOptions {
            years: 1,
            ..opts()
        };
        let specs = vec![spec("up", "buy_and_hold", ParamMap::new(), tickers(&["UP"]))];
        let rows = run_leaderboard(&src, &specs, &o).unwrap();
        assert_eq!(rows[0].days, 252);
    }

    #[test]
    fn test_skips_short_and_unknown() {
        let src = source(300);
        let specs = vec![
            spec("ghost", "buy_and_hold", ParamMap::new(), tickers(&["NOPE"])),
            spec("empty", "buy_and_hold", ParamMap::new(), tickers(&[])),
            spec("up", "buy_and_hold", ParamMap::new(), tickers(&["UP"])),
        ];
        let rows = run_leaderboard(&src, &specs, &opts()).unwrap();
        assert_eq!(rows.len(), 1);

        let strict = LeaderboardOptions {
            min_days: 1000,
            ..opts()
        };
        assert!(run_leaderboard(&src, &specs, &strict).is_err());
    }

    #[test]
    fn test_features_and_liquid_universe() {
        let src = source(300);
        let specs = vec![
            spec(
                "value",
                "equity_value",
                ParamMap::new().with("top_k", 1),
                Universe::Liquid(Default::default()),
            ),
            spec(
                "resid",
                "equity_residual_momentum",
                ParamMap::new()
                    .with("lookback_days", 20)
                    .with("beta_days", 20)
                    .with("top_k", 1),
                tickers(&["UP", "DOWN"]),
            ),
        ];
        let rows = run_leaderboard(&src, &specs, &opts()).unwrap();
        let value = rows.iter().find(|r| r.id == "value").unwrap();
        assert_eq!(value.universe, "liquid(n=3)");
        assert!(value.avg_exposure > 0.0);
        assert!(rows.iter().any(|r| r.id == "resid"));
    }

    #[test]
    fn test_backtest_strategy() {
        let src = source(300);
        let s = spec("up", "buy_and_hold", ParamMap::new(), tickers(&["UP"]));
        let run = backtest_strategy(&src, &s, &opts()).unwrap();
        assert_eq!(run.result.len(), 300);
        assert_eq!(run.metrics.days, 300);
        assert!(run.metrics.cagr > 0.0);

        let resid = spec(
            "resid",
            "equity_residual_momentum",
            ParamMap::new().with("lookback_days", 20).with("beta_days", 20),
            tickers(&["UP", "DOWN"]),
        );
        assert!(backtest_strategy(&src, &resid, &opts()).is_ok());

        let empty = spec("e", "buy_and_hold", ParamMap::new(), tickers(&[]));
        assert!(matches!(
            backtest_strategy(&src, &empty, &opts()),
            Err(BacktestError::InvalidInput(_))
        ));
        let ghost = spec("g", "buy_and_hold", ParamMap::new(), tickers(&["NOPE"]));
        assert!(matches!(
            backtest_strategy(&src, &ghost, &opts()),
            Err(BacktestError::DataError(_))
        ));
    }

    #[test]
    fn test_missing_benchmark() {
        let src = source(300);
        let o = LeaderboardOptions {
            benchmark: "QQQ".to_string(),
            ..opts()
        };
        let specs = vec![spec("up", "buy_and_hold", ParamMap::new(), tickers(&["UP"]))];
        assert!(matches!(
            run_leaderboard(&src, &specs, &o),
            Err(BacktestError::DataError(_))
        ));
    }

    #[test]
    fn test_exports() {
        let src = source(300);
        let specs = vec![spec("up", "buy_and_hold", ParamMap::new(), tickers(&["UP"]))];
        let o = LeaderboardOptions {
            backtest: BacktestConfig::new(1.0, 2.0),
            ..opts()
        };
        let rows = run_leaderboard(&src, &specs, &o).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out/leaderboard.csv");
        write_csv(&rows, &csv_path).unwrap();
        let text = fs::read_to_string(&csv_path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("paper_section,id,name,kind,universe"));
        assert!(header.ends_with("maxdd_vs_bh"));
        assert_eq!(text.lines().count(), 2);

        let md = to_markdown(&rows, &o, "2024-01-01 00:00:00");
        assert!(md.starts_with("# Results"));
        assert!(md.contains("Generated: `2024-01-01 00:00:00`"));
        assert!(md.contains("trailing `5` years"));
        assert!(md.contains("fee=1 bps, slippage=2 bps"));
        assert!(md.contains("## Leaderboard (Sharpe-ranked)"));
        let table: Vec<&str> = md.lines().filter(|l| l.starts_with('|')).collect();
        assert_eq!(table.len(), 3);
        assert!(table[2].contains("| up | up | buy_and_hold | UP |"));

        let md_path = dir.path().join("results.md");
        write_markdown(&rows, &o, &md_path).unwrap();
        assert!(fs::read_to_string(md_path).unwrap().contains("# Results"));
    }
}
