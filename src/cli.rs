//! Command-line interface for the strategy lab.

use paperlab::analytics::ResultFormatter;
use paperlab::config::LabConfig;
use paperlab::error::Result;
use paperlab::leaderboard::{
    backtest_strategy, print_leaderboard, run_leaderboard, write_csv, write_markdown,
    LeaderboardOptions,
};
use paperlab::spec_file::{find_spec, load_strategy_specs};
use paperlab::strategies::{Policy, SignalPolicy};

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// paperlab - backtest strategies from the literature and rank them.
#[derive(Parser)]
#[command(name = "paperlab")]
#[command(version)]
#[command(about = "Backtest declaratively specified trading strategies and rank them")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory with prices.csv and metrics.csv (overrides config and PAPERLAB_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every strategy kind with its default parameters
    Kinds,

    /// List the strategies of a spec file
    ListStrategies {
        /// YAML spec file
        spec: PathBuf,

        /// Show at most this many strategies
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Backtest a single strategy of a spec file
    Backtest {
        /// YAML spec file
        spec: PathBuf,

        /// Strategy id
        strategy_id: String,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Backtest every strategy of a spec file and rank by Sharpe
    Leaderboard {
        /// YAML spec file
        spec: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Buy-and-hold benchmark ticker
        #[arg(long)]
        benchmark: Option<String>,

        /// Write all columns as CSV
        #[arg(long)]
        out_csv: Option<PathBuf>,

        /// Write a Markdown report
        #[arg(long)]
        out_md: Option<PathBuf>,
    },

    /// Generate an example configuration file
    Init {
        /// Output path for config file
        #[arg(default_value = "paperlab.toml")]
        path: PathBuf,
    },
}

/// Evaluation window and costs. Unset flags keep the configured values.
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Trailing years evaluated when --start is not given
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub years: Option<u32>,

    /// Start date, YYYY-MM-DD (overrides --years)
    #[arg(long)]
    pub start: Option<String>,

    /// End date, YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,

    /// Commission in basis points of turnover
    #[arg(long)]
    pub fee_bps: Option<f64>,

    /// Slippage in basis points of turnover
    #[arg(long)]
    pub slippage_bps: Option<f64>,
}

impl WindowArgs {
    fn apply(&self, config: &mut LabConfig) {
        if let Some(years) = self.years {
            config.backtest.years = years;
        }
        if let Some(start) = &self.start {
            config.backtest.start_date = Some(start.clone());
        }
        if let Some(end) = &self.end {
            config.backtest.end_date = Some(end.clone());
        }
        if let Some(fee) = self.fee_bps {
            config.backtest.fee_bps = fee;
        }
        if let Some(slippage) = self.slippage_bps {
            config.backtest.slippage_bps = slippage;
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Initialize logging based on verbosity.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();

        // A subscriber may already be installed when embedded.
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn load_config(&self) -> Result<LabConfig> {
        match &self.config {
            Some(path) => LabConfig::load(path),
            None => Ok(LabConfig::default()),
        }
    }

    fn data_dir(&self, config: &LabConfig) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| config.data_dir())
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match &cli.command {
        Commands::Kinds => list_kinds(cli.output),
        Commands::ListStrategies { spec, limit } => list_strategies(spec, *limit, cli.output),
        Commands::Backtest {
            spec,
            strategy_id,
            window,
        } => run_backtest(&cli, spec, strategy_id, window),
        Commands::Leaderboard {
            spec,
            window,
            benchmark,
            out_csv,
            out_md,
        } => run_leaderboard_cmd(
            &cli,
            spec,
            window,
            benchmark.as_deref(),
            out_csv.as_deref(),
            out_md.as_deref(),
        ),
        Commands::Init { path } => init_config(path),
    }
}

fn list_kinds(output: OutputFormat) -> Result<()> {
    let catalog = Policy::catalog();
    match output {
        OutputFormat::Text => ResultFormatter::print_kinds(&catalog),
        OutputFormat::Json => {
            let kinds: Vec<_> = catalog
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "kind": p.kind(),
                        "rebalance": p.rebalance(),
                        "defaults": p.parameters().into_iter().collect::<BTreeMap<_, _>>(),
                    })
                })
                .collect();
            println!("{}", ResultFormatter::to_json(&kinds));
        }
    }
    Ok(())
}

fn list_strategies(spec: &Path, limit: Option<usize>, output: OutputFormat) -> Result<()> {
    let specs = load_strategy_specs(spec)?;
    let shown = &specs[..limit.unwrap_or(specs.len()).min(specs.len())];
    match output {
        OutputFormat::Text => {
            let title = format!("Strategies: {} ({} total)", spec.display(), specs.len());
            ResultFormatter::print_strategies(&title, shown);
        }
        OutputFormat::Json => {
            let rows: Vec<_> = shown
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "id": s.id,
                        "name": s.name,
                        "kind": s.kind(),
                        "paper_section": s.paper_section,
                        "universe": s.universe.label(None),
                        "params": s.params,
                    })
                })
                .collect();
            println!("{}", ResultFormatter::to_json(&rows));
        }
    }
    Ok(())
}

/// Config file with command-line overrides, and the run options it implies.
fn prepare(
    cli: &Cli,
    window: &WindowArgs,
    benchmark: Option<&str>,
) -> Result<(LabConfig, LeaderboardOptions)> {
    let mut config = cli.load_config()?;
    window.apply(&mut config);
    if let Some(b) = benchmark {
        config.leaderboard.benchmark = b.to_string();
    }
    let opts = LeaderboardOptions::from_config(&config)?;
    Ok((config, opts))
}

fn run_backtest(cli: &Cli, spec: &Path, strategy_id: &str, window: &WindowArgs) -> Result<()> {
    let (config, opts) = prepare(cli, window, None)?;
    let specs = load_strategy_specs(spec)?;
    let strategy = find_spec(&specs, strategy_id)?;
    let source = config.data_source(cli.data_dir(&config));

    info!("Backtesting {} ({})", strategy.id, strategy.kind());
    let run = backtest_strategy(&source, strategy, &opts)?;

    match cli.output {
        OutputFormat::Text => {
            let period = match (run.result.index.first(), run.result.index.last()) {
                (Some(s), Some(e)) => Some((s.to_string(), e.to_string())),
                _ => None,
            };
            let title = format!("{} ({})", run.name, run.id);
            ResultFormatter::print_report(&title, period, &run.metrics);
        }
        OutputFormat::Json => println!("{}", ResultFormatter::to_json(&run)),
    }
    Ok(())
}

fn run_leaderboard_cmd(
    cli: &Cli,
    spec: &Path,
    window: &WindowArgs,
    benchmark: Option<&str>,
    out_csv: Option<&Path>,
    out_md: Option<&Path>,
) -> Result<()> {
    let (config, mut opts) = prepare(cli, window, benchmark)?;
    opts.show_progress = cli.output == OutputFormat::Text;

    let specs = load_strategy_specs(spec)?;
    let source = config.data_source(cli.data_dir(&config));
    let rows = run_leaderboard(&source, &specs, &opts)?;

    match cli.output {
        OutputFormat::Text => {
            let name = spec
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            print_leaderboard(&format!("Leaderboard: {}", name), &rows);
        }
        OutputFormat::Json => println!("{}", ResultFormatter::to_json(&rows)),
    }

    if let Some(path) = out_csv {
        write_csv(&rows, path)?;
        eprintln!("Wrote {} rows -> {}", rows.len(), path.display());
    }
    if let Some(path) = out_md {
        write_markdown(&rows, &opts, path)?;
        eprintln!("Wrote {} rows -> {}", rows.len(), path.display());
    }
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    fs::write(path, LabConfig::example())?;
    println!("Created example configuration file: {}", path.display());
    println!("\nEdit this file to point at your data, then run:");
    println!(
        "  {}",
        format!("paperlab -c {} leaderboard strategies.yaml", path.display()).bold()
    );
    Ok(())
}
