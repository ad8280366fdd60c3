//! CSV bar file adapter.
//!
//! One file per ticker and resolution, named `{TICKER}_{resolution}.csv`, with
//! a `time,open,high,low,close,volume` header.

use crate::domain::bar::TradeBar;
use crate::domain::error::TraderError;
use crate::domain::symbol::{Resolution, Symbol};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

const TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str, resolution: Resolution) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", ticker.to_uppercase(), resolution))
    }

    /// Read every bar in the file, sorted by time. Rows that parse but fail
    /// the OHLC sanity check are skipped with a warning.
    fn read_bars(&self, symbol: &Symbol, resolution: Resolution) -> Result<Vec<TradeBar>, TraderError> {
        let path = self.csv_path(symbol.ticker(), resolution);
        if !path.exists() {
            return Err(TraderError::NoData {
                ticker: symbol.ticker().to_string(),
                resolution: resolution.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| TraderError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let line = row + 2;

            let bar = TradeBar {
                symbol: symbol.clone(),
                time: parse_time(field(&record, 0, "time", line)?).ok_or_else(|| {
                    TraderError::Data {
                        reason: format!("{}: line {}: invalid time", path.display(), line),
                    }
                })?,
                open: parse_number(&record, 1, "open", line)?,
                high: parse_number(&record, 2, "high", line)?,
                low: parse_number(&record, 3, "low", line)?,
                close: parse_number(&record, 4, "close", line)?,
                volume: parse_number(&record, 5, "volume", line)?,
            };

            if !bar.is_well_formed() {
                warn!(file = %path.display(), line, "skipping malformed bar");
                continue;
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.time);
        debug!(file = %path.display(), bars = bars.len(), "read bar file");
        Ok(bars)
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM` or a bare date (midnight).
pub fn parse_time(s: &str) -> Option<NaiveDateTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, TraderError> {
    record.get(index).ok_or_else(|| TraderError::Data {
        reason: format!("line {}: missing {} column", line, name),
    })
}

fn parse_number<T>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<T, TraderError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    field(record, index, name, line)?
        .parse()
        .map_err(|e| TraderError::Data {
            reason: format!("line {}: invalid {} value: {}", line, name, e),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &Symbol,
        resolution: Resolution,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TradeBar>, TraderError> {
        let mut bars = self.read_bars(symbol, resolution)?;
        bars.retain(|b| {
            let day = b.time.date();
            day >= start_date && day <= end_date
        });
        Ok(bars)
    }

    fn list_tickers(&self, resolution: Resolution) -> Result<Vec<String>, TraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", resolution);
        let mut tickers = Vec::new();

        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(ticker) = name.strip_suffix(&suffix) {
                if !ticker.is_empty() {
                    tickers.push(ticker.to_string());
                }
            }
        }

        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
        resolution: Resolution,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError> {
        // the security type does not affect the file name
        let symbol = Symbol::equity(ticker);
        let bars = match self.read_bars(&symbol, resolution) {
            Ok(bars) => bars,
            Err(TraderError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time, bars.len())),
            _ => None,
        })
    }
}
