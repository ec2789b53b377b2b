//! YAML strategy spec files.
//!
//! ```yaml
//! strategies:
//!   - id: sma-20-100
//!     name: SMA crossover
//!     paper: { section: "3.12", title: "Moving averages" }
//!     kind: sma_crossover
//!     universe: [SPY]
//!     params: { fast: 20, slow: 100 }
//!   - id: value-top50
//!     name: Value
//!     universe: { type: liquid, config: { max_tickers: 300 } }
//!     params: { kind: equity_value, value_field: pb }
//! ```
//!
//! `kind` may sit at the top level or inside `params`. Every policy is resolved
//! and validated while loading, so a bad file fails before any data is read.

use crate::error::{BacktestError, Result};
use crate::strategies::ParamMap;
use crate::strategy::{StrategySpec, Universe};
use crate::universe::LiquidUniverseConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    #[serde(default)]
    strategies: Vec<RawStrategy>,
}

#[derive(Debug, Deserialize)]
struct RawStrategy {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    paper: Option<RawPaper>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    universe: Option<RawUniverse>,
    #[serde(default)]
    params: Option<ParamMap>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPaper {
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawUniverse {
    List(Vec<String>),
    Object {
        #[serde(default, rename = "type")]
        kind: Option<String>,
        #[serde(default)]
        tickers: Vec<String>,
        #[serde(default)]
        config: Option<LiquidUniverseConfig>,
    },
}

/// Universe types that build a liquid equity universe.
const LIQUID_TYPES: &[&str] = &["liquid", "us_equities_liquid", "sharadar_us_equities_liquid"];

fn normalize_tickers(tickers: Vec<String>) -> Vec<String> {
    tickers
        .into_iter()
        .map(|t| t.trim().to_ascii_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn resolve_universe(id: &str, raw: Option<RawUniverse>) -> Result<Universe> {
    match raw {
        None => Ok(Universe::Tickers(Vec::new())),
        Some(RawUniverse::List(tickers)) => Ok(Universe::Tickers(normalize_tickers(tickers))),
        Some(RawUniverse::Object {
            kind,
            tickers,
            config,
        }) => {
            let tickers = normalize_tickers(tickers);
            match kind.as_deref().map(str::trim) {
                _ if !tickers.is_empty() => Ok(Universe::Tickers(tickers)),
                None | Some("") | Some("tickers") => Ok(Universe::Tickers(tickers)),
                Some(t) if LIQUID_TYPES.contains(&t) => {
                    Ok(Universe::Liquid(config.unwrap_or_default()))
                }
                Some(other) => Err(BacktestError::ConfigError(format!(
                    "Strategy {:?} has unknown universe type {:?}. Known: {:?}",
                    id, other, LIQUID_TYPES
                ))),
            }
        }
    }
}

fn resolve(raw: RawStrategy) -> Result<StrategySpec> {
    let mut params = raw.params.unwrap_or_default();
    let nested_kind = params.remove("kind");
    let kind = raw
        .kind
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .or_else(|| nested_kind.and_then(|v| v.as_str().map(|s| s.trim().to_string())))
        .filter(|k| !k.is_empty())
        .ok_or_else(|| BacktestError::ConfigError(format!("Strategy {:?} missing kind", raw.id)))?;

    let universe = resolve_universe(&raw.id, raw.universe)?;
    let paper = raw.paper.unwrap_or_default();

    let mut spec = StrategySpec::new(raw.id, raw.name, &kind, params, universe).map_err(|e| {
        debug!("Failed to resolve kind={}: {}", kind, e);
        e
    })?;
    spec.description = raw.description;
    spec.paper_section = paper.section;
    spec.paper_title = paper.title;
    Ok(spec)
}

/// Parse specs from YAML text.
pub fn parse_strategy_specs(yaml: &str) -> Result<Vec<StrategySpec>> {
    let raw: Option<RawFile> = serde_yaml::from_str(yaml)?;
    let raw = raw.unwrap_or_default();

    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(raw.strategies.len());
    for item in raw.strategies {
        if !seen.insert(item.id.clone()) {
            return Err(BacktestError::ConfigError(format!(
                "Duplicate strategy id {:?}",
                item.id
            )));
        }
        specs.push(resolve(item)?);
    }
    Ok(specs)
}

/// Load specs from a YAML file.
pub fn load_strategy_specs(path: impl AsRef<Path>) -> Result<Vec<StrategySpec>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let specs = parse_strategy_specs(&content)?;
    info!("Loaded {} strategies from {}", specs.len(), path.display());
    Ok(specs)
}

/// Find a spec by id.
pub fn find_spec<'a>(specs: &'a [StrategySpec], id: &str) -> Result<&'a StrategySpec> {
    specs.iter().find(|s| s.id == id).ok_or_else(|| {
        BacktestError::InvalidInput(format!(
            "Unknown strategy_id={:?}. Known: {:?}",
            id,
            specs.iter().map(|s| s.id.as_str()).collect::<Vec<_>>()
        ))
    })
}
