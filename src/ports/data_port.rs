//! Bar data access port.

use crate::domain::bar::TradeBar;
use crate::domain::error::TraderError;
use crate::domain::symbol::{Resolution, Symbol};
use chrono::{NaiveDate, NaiveDateTime};

pub trait DataPort {
    /// Bars for `symbol` whose time falls on a day in `[start_date, end_date]`,
    /// sorted by time. `TraderError::NoData` if the source has nothing for it.
    fn fetch_bars(
        &self,
        symbol: &Symbol,
        resolution: Resolution,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TradeBar>, TraderError>;

    fn list_tickers(&self, resolution: Resolution) -> Result<Vec<String>, TraderError>;

    /// First bar time, last bar time and bar count, if any data exists.
    fn get_data_range(
        &self,
        ticker: &str,
        resolution: Resolution,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError>;
}
