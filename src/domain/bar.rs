//! Trade bar representation.

use crate::domain::symbol::Symbol;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeBar {
    pub symbol: Symbol,
    /// Bar open time.
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl TradeBar {
    /// Price used for indicator updates and market fills.
    pub fn price(&self) -> f64 {
        self.close
    }

    /// high >= max(open, close), low <= min(open, close), all prices finite and positive.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}
