#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use indextrader::domain::bar::TradeBar;
use indextrader::domain::error::TraderError;
use indextrader::domain::symbol::{Resolution, Symbol};
use indextrader::ports::data_port::DataPort;
use std::collections::HashMap;

/// Minute bars per regular US equity session (09:31 to 16:00).
pub const MINUTES_PER_SESSION: usize = 390;

/// In-memory bar source keyed by ticker. Resolution is ignored.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<TradeBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<TradeBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &Symbol,
        resolution: Resolution,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TradeBar>, TraderError> {
        if let Some(reason) = self.errors.get(symbol.ticker()) {
            return Err(TraderError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol.ticker()).ok_or_else(|| TraderError::NoData {
            ticker: symbol.ticker().to_string(),
            resolution: resolution.to_string(),
        })?;
        Ok(bars
            .iter()
            .filter(|b| b.time.date() >= start_date && b.time.date() <= end_date)
            .map(|b| TradeBar {
                symbol: symbol.clone(),
                ..b.clone()
            })
            .collect())
    }

    fn list_tickers(&self, _resolution: Resolution) -> Result<Vec<String>, TraderError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
        _resolution: Resolution,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError> {
        match self.data.get(ticker) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.time).min().unwrap();
                let max = bars.iter().map(|b| b.time).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Weekdays in `[start, end]`.
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

/// Minute bar times for each session, starting at 09:31.
pub fn session_minutes(days: &[NaiveDate]) -> Vec<NaiveDateTime> {
    days.iter()
        .flat_map(|d| {
            let open = d.and_hms_opt(9, 31, 0).unwrap();
            (0..MINUTES_PER_SESSION).map(move |m| open + Duration::minutes(m as i64))
        })
        .collect()
}

pub fn make_bar(symbol: &Symbol, time: NaiveDateTime, close: f64) -> TradeBar {
    TradeBar {
        symbol: symbol.clone(),
        time,
        open: close,
        high: close * 1.0005,
        low: close * 0.9995,
        close,
        volume: 1_000,
    }
}

/// One bar per time, with the close given by `price(i)`.
pub fn generate_bars(
    symbol: &Symbol,
    times: &[NaiveDateTime],
    price: impl Fn(usize) -> f64,
) -> Vec<TradeBar> {
    times
        .iter()
        .enumerate()
        .map(|(i, &t)| make_bar(symbol, t, price(i)))
        .collect()
}

/// Oscillating index level, slow enough for EMA crossovers on minute bars.
pub fn wave(i: usize) -> f64 {
    3700.0 + 40.0 * (i as f64 / 150.0).sin() + 0.01 * i as f64
}

/// SPX and SPY minute bars for the standard two-week window, SPY tracking SPX / 10.
pub fn spx_spy_port() -> MockDataPort {
    let times = session_minutes(&trading_days(date(2021, 1, 4), date(2021, 1, 15)));
    let spx = generate_bars(&Symbol::index("SPX"), &times, wave);
    let spy = generate_bars(&Symbol::equity("SPY"), &times, |i| wave(i) / 10.0);
    MockDataPort::new()
        .with_bars("SPX", spx)
        .with_bars("SPY", spy)
}

/// Write bars as a `{TICKER}_minute.csv` file in `dir`.
pub fn write_minute_csv(dir: &std::path::Path, ticker: &str, bars: &[TradeBar]) {
    let mut content = String::from("time,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.time.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    std::fs::write(dir.join(format!("{}_minute.csv", ticker)), content).unwrap();
}
