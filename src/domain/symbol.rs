//! Instrument identity and bar resolution.

use crate::domain::error::TraderError;
use chrono::Duration;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MARKET: &str = "usa";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecurityType {
    Equity,
    Index,
}

impl SecurityType {
    /// Indices are computed values; they can be observed but never ordered.
    pub fn is_tradable(self) -> bool {
        matches!(self, SecurityType::Equity)
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityType::Equity => write!(f, "equity"),
            SecurityType::Index => write!(f, "index"),
        }
    }
}

/// Opaque, immutable reference to a subscribed instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    ticker: String,
    market: String,
    security_type: SecurityType,
}

impl Symbol {
    pub fn new(ticker: &str, market: &str, security_type: SecurityType) -> Self {
        Symbol {
            ticker: ticker.trim().to_uppercase(),
            market: market.trim().to_lowercase(),
            security_type,
        }
    }

    pub fn index(ticker: &str) -> Self {
        Symbol::new(ticker, DEFAULT_MARKET, SecurityType::Index)
    }

    pub fn equity(ticker: &str) -> Self {
        Symbol::new(ticker, DEFAULT_MARKET, SecurityType::Equity)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn security_type(&self) -> SecurityType {
        self.security_type
    }

    pub fn is_tradable(&self) -> bool {
        self.security_type.is_tradable()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ticker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    /// Bar span; ticks have none.
    pub fn period(self) -> Option<Duration> {
        match self {
            Resolution::Tick => None,
            Resolution::Second => Some(Duration::seconds(1)),
            Resolution::Minute => Some(Duration::minutes(1)),
            Resolution::Hour => Some(Duration::hours(1)),
            Resolution::Daily => Some(Duration::days(1)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resolution::Tick => "tick",
            Resolution::Second => "second",
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Daily => "daily",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Resolution {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tick" => Ok(Resolution::Tick),
            "second" => Ok(Resolution::Second),
            "minute" => Ok(Resolution::Minute),
            "hour" => Ok(Resolution::Hour),
            "daily" | "day" => Ok(Resolution::Daily),
            other => Err(TraderError::ConfigInvalid {
                section: "algorithm".into(),
                key: "resolution".into(),
                reason: format!("unknown resolution '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn index_is_not_tradable() {
        let spx = Symbol::index("SPX");
        assert_eq!(spx.security_type(), SecurityType::Index);
        assert!(!spx.is_tradable());
    }

    #[test]
    fn equity_is_tradable() {
        let spy = Symbol::equity("SPY");
        assert!(spy.is_tradable());
        assert_eq!(spy.market(), "usa");
    }

    #[test]
    fn ticker_normalized() {
        let spy = Symbol::new(" spy ", "USA", SecurityType::Equity);
        assert_eq!(spy.ticker(), "SPY");
        assert_eq!(spy.market(), "usa");
        assert_eq!(spy.to_string(), "SPY");
    }

    #[test]
    fn same_ticker_different_type_are_distinct_keys() {
        let mut map = HashMap::new();
        map.insert(Symbol::index("SPX"), 1);
        map.insert(Symbol::equity("SPX"), 2);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Symbol::index("SPX")), Some(&1));
    }

    #[test]
    fn resolution_round_trips_through_display() {
        for res in [
            Resolution::Tick,
            Resolution::Second,
            Resolution::Minute,
            Resolution::Hour,
            Resolution::Daily,
        ] {
            assert_eq!(res.to_string().parse::<Resolution>().unwrap(), res);
        }
    }

    #[test]
    fn resolution_parse_accepts_day_alias() {
        assert_eq!("Day".parse::<Resolution>().unwrap(), Resolution::Daily);
    }

    #[test]
    fn resolution_parse_rejects_unknown() {
        let err = "weekly".parse::<Resolution>().unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "resolution"));
    }

    #[test]
    fn resolution_period() {
        assert_eq!(Resolution::Minute.period(), Some(Duration::minutes(1)));
        assert_eq!(Resolution::Tick.period(), None);
    }
}
