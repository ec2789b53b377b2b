//! Strategy specifications and the inputs policies run on.

use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use crate::strategies::{ParamMap, Policy, SignalPolicy};
use crate::universe::LiquidUniverseConfig;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Prices plus named auxiliary panels (fundamentals, benchmark prices).
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub prices: Panel,
    pub features: BTreeMap<String, Panel>,
}

impl MarketData {
    pub fn new(prices: Panel) -> Self {
        Self {
            prices,
            features: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, name: impl Into<String>, panel: Panel) -> Self {
        self.features.insert(name.into(), panel);
        self
    }

    /// Look up a feature panel by name.
    pub fn feature(&self, name: &str) -> Result<&Panel> {
        self.features
            .get(name)
            .ok_or_else(|| BacktestError::UnknownFeature {
                name: name.to_string(),
                available: self.features.keys().cloned().collect(),
            })
    }
}

/// Instruments a strategy trades.
#[derive(Debug, Clone, PartialEq)]
pub enum Universe {
    /// Fixed list of tickers.
    Tickers(Vec<String>),
    /// Most liquid equities on file.
    Liquid(LiquidUniverseConfig),
}

impl Universe {
    pub fn is_empty(&self) -> bool {
        matches!(self, Universe::Tickers(t) if t.is_empty())
    }

    /// Short label for tables: the ticker list, or the universe type with its
    /// resolved size when known.
    pub fn label(&self, resolved: Option<usize>) -> String {
        match (self, resolved) {
            (Universe::Tickers(t), _) => t.join(","),
            (Universe::Liquid(_), Some(n)) => format!("liquid(n={})", n),
            (Universe::Liquid(_), None) => "liquid".to_string(),
        }
    }
}

/// A declaratively defined strategy, immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySpec {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub paper_section: Option<String>,
    pub paper_title: Option<String>,
    pub policy: Policy,
    pub universe: Universe,
    /// Parameters as written, kept for display and round-tripping.
    pub params: ParamMap,
}

impl StrategySpec {
    /// Build a spec with the policy resolved from `kind` and `params`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: &str,
        params: ParamMap,
        universe: Universe,
    ) -> Result<Self> {
        let policy = Policy::from_kind(kind, &params)?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            description: None,
            paper_section: None,
            paper_title: None,
            policy,
            universe,
            params,
        })
    }

    pub fn kind(&self) -> &'static str {
        self.policy.kind()
    }
}

/// Compute target weights for `spec` on `data`.
///
/// The result has the index and columns of `data.prices`. Every row is either
/// all zero or sums to one. Features the policy needs are checked before any
/// computation.
pub fn run_strategy_weights(data: &MarketData, spec: &StrategySpec) -> Result<Panel> {
    for name in spec.policy.required_features() {
        data.feature(&name)?;
    }

    debug!(
        "Running strategy id={} kind={} on {} x {} prices",
        spec.id,
        spec.kind(),
        data.prices.n_rows(),
        data.prices.n_cols()
    );
    let weights = spec.policy.weights(data)?;
    debug_assert_eq!(weights.index(), data.prices.index());
    debug_assert_eq!(weights.columns(), data.prices.columns());

    info!(
        "Strategy {} produced weights over {} dates",
        spec.id,
        weights.n_rows()
    );
    Ok(weights)
}
