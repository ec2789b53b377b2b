//! Error types for the strategy lab.

use thiserror::Error;

/// Remediation hints attached to errors that are shown to CLI users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorHelp {
    /// Typical reasons the error shows up.
    pub common_causes: Vec<&'static str>,
    /// Things to try first.
    pub quick_fixes: Vec<&'static str>,
}

impl std::fmt::Display for ErrorHelp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.common_causes.is_empty() {
            writeln!(f, "Common causes:")?;
            for cause in &self.common_causes {
                writeln!(f, "  - {}", cause)?;
            }
        }
        if !self.quick_fixes.is_empty() {
            writeln!(f, "Quick fixes:")?;
            for fix in &self.quick_fixes {
                writeln!(f, "  - {}", fix)?;
            }
        }
        Ok(())
    }
}

/// Main error type for the strategy lab.
#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParseError(#[from] chrono::ParseError),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A policy or engine parameter violates its constraint.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown strategy kind={kind:?}. Known: {known:?}")]
    UnknownStrategyKind { kind: String, known: Vec<String> },

    #[error("Missing feature {name:?}. Available: {available:?}")]
    UnknownFeature { name: String, available: Vec<String> },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl BacktestError {
    /// Hints for the errors users are most likely to hit from the command line.
    pub fn help(&self) -> Option<ErrorHelp> {
        match self {
            BacktestError::InvalidParameter(_) => Some(ErrorHelp {
                common_causes: vec![
                    "A window length is zero or negative",
                    "Moving-average windows are not strictly increasing (fast < mid < slow)",
                    "top_k is zero",
                ],
                quick_fixes: vec![
                    "Check the params block of the strategy in the spec file",
                    "Run `paperlab kinds` to see every kind with its defaults",
                ],
            }),
            BacktestError::UnknownStrategyKind { .. } => Some(ErrorHelp {
                common_causes: vec!["Typo in the `kind` field", "Kind written with dashes"],
                quick_fixes: vec!["Use one of the listed kinds verbatim (snake_case)"],
            }),
            BacktestError::UnknownFeature { .. } => Some(ErrorHelp {
                common_causes: vec![
                    "The metrics file has no column for the requested value_field",
                    "The benchmark ticker is missing from the prices file",
                ],
                quick_fixes: vec![
                    "Add the column to metrics.csv or change value_field",
                    "Set [leaderboard].benchmark to a ticker present in prices.csv",
                ],
            }),
            BacktestError::DataError(_) => Some(ErrorHelp {
                common_causes: vec!["Date window excludes every row", "Tickers not in the file"],
                quick_fixes: vec!["Widen --start/--end", "Check ticker spelling in the universe"],
            }),
            _ => None,
        }
    }
}

/// Result type alias for lab operations.
pub type Result<T> = std::result::Result<T, BacktestError>;
