//! Market data loading.
//!
//! Panels are read from long-format CSV files, one observation per line:
//!
//! ```text
//! ticker,date,close,volume
//! SPY,2024-01-02,472.65,123400
//! QQQ,2024-01-02,402.11,98000
//! ```
//!
//! Any numeric column can be pivoted into a date × ticker [`Panel`]. Prices
//! and per-ticker metrics (valuation multiples and the like) live in separate
//! files under one data directory.

use crate::error::{BacktestError, Result};
use crate::panel::Panel;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where panels come from. The leaderboard and CLI only talk to this trait.
pub trait DataSource: Send + Sync {
    /// Close prices for `tickers`, columns in request order.
    fn load_prices(
        &self,
        tickers: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Panel>;

    /// One metrics field (e.g. `pe`) for `tickers`.
    fn load_metric(
        &self,
        tickers: &[String],
        field: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Panel>;

    /// Close and volume for every ticker on file, for liquidity ranking.
    fn load_liquidity(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(Panel, Panel)>;
}

/// Reads `prices.csv` and `metrics.csv` from a directory.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    dir: PathBuf,
    prices_file: String,
    metrics_file: String,
    date_format: Option<String>,
    price_field: String,
}

impl CsvDataSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prices_file: "prices.csv".to_string(),
            metrics_file: "metrics.csv".to_string(),
            date_format: None,
            price_field: "close".to_string(),
        }
    }

    pub fn with_prices_file(mut self, name: impl Into<String>) -> Self {
        self.prices_file = name.into();
        self
    }

    pub fn with_metrics_file(mut self, name: impl Into<String>) -> Self {
        self.metrics_file = name.into();
        self
    }

    pub fn with_date_format(mut self, format: Option<String>) -> Self {
        self.date_format = format;
        self
    }

    pub fn prices_path(&self) -> PathBuf {
        self.dir.join(&self.prices_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(&self.metrics_file)
    }

    fn query<'a>(&'a self, field: &'a str, tickers: Option<&'a [String]>) -> LongQuery<'a> {
        LongQuery {
            field,
            tickers,
            start: None,
            end: None,
            date_format: self.date_format.as_deref(),
        }
    }
}

impl DataSource for CsvDataSource {
    fn load_prices(
        &self,
        tickers: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Panel> {
        let mut q = self.query(&self.price_field, Some(tickers));
        q.start = start;
        q.end = end;
        load_long_csv(self.prices_path(), &q)
    }

    fn load_metric(
        &self,
        tickers: &[String],
        field: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Panel> {
        let mut q = self.query(field, Some(tickers));
        // Fundamentals published before the window still apply inside it.
        q.start = None;
        q.end = end;
        let panel = load_long_csv(self.metrics_path(), &q)?;
        match start {
            Some(s) => Ok(keep_last_before(&panel, s)),
            None => Ok(panel),
        }
    }

    fn load_liquidity(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(Panel, Panel)> {
        let mut close = self.query(&self.price_field, None);
        close.start = start;
        close.end = end;
        let mut volume = self.query("volume", None);
        volume.start = start;
        volume.end = end;
        Ok((
            load_long_csv(self.prices_path(), &close)?,
            load_long_csv(self.prices_path(), &volume)?,
        ))
    }
}

/// Drop rows before `start` except the last one, which still holds the
/// point-in-time value as of `start`.
fn keep_last_before(panel: &Panel, start: NaiveDate) -> Panel {
    let first_inside = panel.index().partition_point(|d| *d < start);
    let from = first_inside.saturating_sub(1);
    panel.tail(panel.n_rows() - from)
}

/// Which column to pivot and which rows to keep.
#[derive(Debug, Clone)]
pub struct LongQuery<'a> {
    pub field: &'a str,
    /// `None` keeps every ticker, sorted.
    pub tickers: Option<&'a [String]>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub date_format: Option<&'a str>,
}

impl<'a> LongQuery<'a> {
    pub fn new(field: &'a str) -> Self {
        Self {
            field,
            tickers: None,
            start: None,
            end: None,
            date_format: None,
        }
    }
}

/// Parse a date with an optional explicit format, then common fallbacks.
pub fn parse_date(s: &str, format: Option<&str>) -> Result<NaiveDate> {
    let s = s.trim();
    if let Some(fmt) = format {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%m/%d/%Y", "%d-%b-%Y"];
    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }

    // Timestamps such as "2024-01-02 00:00:00" keep only the date part.
    if let Some((date, _)) = s.split_once([' ', 'T']) {
        if let Ok(d) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            return Ok(d);
        }
    }

    Err(BacktestError::DataError(format!("Could not parse date: '{}'", s)))
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Load a long-format CSV file and pivot `query.field` into a panel.
pub fn load_long_csv(path: impl AsRef<Path>, query: &LongQuery<'_>) -> Result<Panel> {
    let path = path.as_ref();
    info!("Loading {} from: {}", query.field, path.display());
    let file = std::fs::File::open(path).map_err(|e| {
        BacktestError::DataError(format!("Cannot open {}: {}", path.display(), e))
    })?;
    read_long_csv(file, query)
}

/// Same as [`load_long_csv`] over any reader.
pub fn read_long_csv<R: Read>(reader: R, query: &LongQuery<'_>) -> Result<Panel> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let ticker_col = find_column(&headers, &["ticker", "symbol"]).ok_or_else(|| {
        BacktestError::DataError("CSV has no ticker/symbol column".to_string())
    })?;
    let date_col = find_column(&headers, &["date", "timestamp", "datetime"])
        .ok_or_else(|| BacktestError::DataError("CSV has no date column".to_string()))?;
    let value_col = find_column(&headers, &[query.field]).ok_or_else(|| {
        BacktestError::UnknownFeature {
            name: query.field.to_string(),
            available: headers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != ticker_col && *i != date_col)
                .map(|(_, h)| h.to_string())
                .collect(),
        }
    })?;

    let wanted: Option<HashSet<String>> = query
        .tickers
        .map(|ts| ts.iter().map(|t| t.trim().to_ascii_uppercase()).collect());

    let mut cells: BTreeMap<NaiveDate, HashMap<String, f64>> = BTreeMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    for (row_num, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping row {}: {}", row_num + 1, e);
                skipped += 1;
                continue;
            }
        };

        let ticker = match record.get(ticker_col) {
            Some(t) if !t.is_empty() => t.to_ascii_uppercase(),
            _ => {
                skipped += 1;
                continue;
            }
        };
        if let Some(w) = &wanted {
            if !w.contains(&ticker) {
                continue;
            }
        }

        let date = match record.get(date_col).map(|s| parse_date(s, query.date_format)) {
            Some(Ok(d)) => d,
            Some(Err(e)) => {
                debug!("Skipping row {} due to date parse error: {}", row_num + 1, e);
                skipped += 1;
                continue;
            }
            None => {
                skipped += 1;
                continue;
            }
        };
        if query.start.is_some_and(|s| date < s) || query.end.is_some_and(|e| date > e) {
            continue;
        }

        // Blank or unparseable values are missing observations.
        let value = record
            .get(value_col)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(f64::NAN);

        if cells.entry(date).or_default().insert(ticker.clone(), value).is_some() {
            duplicates += 1;
        }
        seen.insert(ticker);
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows", skipped);
    }
    if duplicates > 0 {
        warn!("Replaced {} duplicate (ticker, date) rows, keeping the last", duplicates);
    }

    let columns: Vec<String> = match query.tickers {
        Some(ts) => {
            let mut cols = Vec::new();
            for t in ts {
                let t = t.trim().to_ascii_uppercase();
                if seen.contains(&t) && !cols.contains(&t) {
                    cols.push(t);
                }
            }
            cols
        }
        None => {
            let mut cols: Vec<String> = seen.into_iter().collect();
            cols.sort();
            cols
        }
    };

    let index: Vec<NaiveDate> = cells.keys().copied().collect();
    let values = cells
        .values()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).copied().unwrap_or(f64::NAN))
                .collect()
        })
        .collect();

    let panel = Panel::new(index, columns, values)?;
    info!(
        "Loaded {} x {} panel for {} ({} to {})",
        panel.n_rows(),
        panel.n_cols(),
        query.field,
        panel.index().first().map(|d| d.to_string()).unwrap_or_default(),
        panel.index().last().map(|d| d.to_string()).unwrap_or_default()
    );
    Ok(panel)
}
