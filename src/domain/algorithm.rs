//! The algorithm interface and the contexts the driver hands to it.
//!
//! An algorithm is a plain value implementing [`Algorithm`]. The driver calls
//! `initialize` once with a [`Setup`], `on_data` once per slice with a
//! [`StepContext`], and `on_end_of_algorithm` once after the last slice.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::domain::error::TraderError;
use crate::domain::indicator::{
    ExponentialMovingAverage, Indicator, IndicatorId, IndicatorRegistry, SimpleMovingAverage,
};
use crate::domain::order::{OrderRequest, PortfolioTarget};
use crate::domain::portfolio::Portfolio;
use crate::domain::slice::Slice;
use crate::domain::symbol::{Resolution, SecurityType, Symbol, DEFAULT_MARKET};

pub const DEFAULT_CASH: f64 = 100_000.0;

pub trait Algorithm {
    fn name(&self) -> &str;

    fn initialize(&mut self, setup: &mut Setup) -> Result<(), TraderError>;

    fn on_data(&mut self, ctx: &mut StepContext<'_>, slice: &Slice);

    fn on_end_of_algorithm(&mut self, _portfolio: &Portfolio) -> Result<(), TraderError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub symbol: Symbol,
    pub resolution: Resolution,
}

/// Collects everything an algorithm declares during `initialize`.
#[derive(Debug)]
pub struct Setup {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    cash: f64,
    subscriptions: Vec<Subscription>,
    indicators: IndicatorRegistry,
}

impl Default for Setup {
    fn default() -> Self {
        Setup {
            start_date: None,
            end_date: None,
            cash: DEFAULT_CASH,
            subscriptions: Vec::new(),
            indicators: IndicatorRegistry::new(),
        }
    }
}

impl Setup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_start_date(&mut self, date: NaiveDate) {
        self.start_date = Some(date);
    }

    pub fn set_end_date(&mut self, date: NaiveDate) {
        self.end_date = Some(date);
    }

    pub fn set_cash(&mut self, cash: f64) {
        self.cash = cash;
    }

    pub fn add_index(&mut self, ticker: &str, resolution: Resolution) -> Result<Symbol, TraderError> {
        self.add_security(Symbol::new(ticker, DEFAULT_MARKET, SecurityType::Index), resolution)
    }

    pub fn add_equity(&mut self, ticker: &str, resolution: Resolution) -> Result<Symbol, TraderError> {
        self.add_security(Symbol::new(ticker, DEFAULT_MARKET, SecurityType::Equity), resolution)
    }

    /// Subscribe to bars for `symbol`. Subscribing twice returns the existing symbol.
    pub fn add_security(
        &mut self,
        symbol: Symbol,
        resolution: Resolution,
    ) -> Result<Symbol, TraderError> {
        if resolution.period().is_none() {
            return Err(TraderError::InvalidSetup {
                reason: format!("{} resolution has no bars; subscribe to {} at minute or coarser", resolution, symbol),
            });
        }
        if symbol.ticker().is_empty() {
            return Err(TraderError::InvalidSetup {
                reason: "ticker must not be empty".into(),
            });
        }
        if let Some(existing) = self.subscriptions.iter().find(|s| s.symbol == symbol) {
            return Ok(existing.symbol.clone());
        }
        debug!(symbol = %symbol, security_type = %symbol.security_type(), %resolution, "subscribed");
        self.subscriptions.push(Subscription {
            symbol: symbol.clone(),
            resolution,
        });
        Ok(symbol)
    }

    /// EMA bound to `symbol`, updated from its bar closes.
    pub fn ema(&mut self, symbol: &Symbol, period: usize) -> Result<IndicatorId, TraderError> {
        let ema = ExponentialMovingAverage::new(period)?;
        self.register(symbol, Box::new(ema))
    }

    /// SMA bound to `symbol`, updated from its bar closes.
    pub fn sma(&mut self, symbol: &Symbol, period: usize) -> Result<IndicatorId, TraderError> {
        let sma = SimpleMovingAverage::new(period)?;
        self.register(symbol, Box::new(sma))
    }

    fn register(
        &mut self,
        symbol: &Symbol,
        indicator: Box<dyn Indicator>,
    ) -> Result<IndicatorId, TraderError> {
        if !self.subscriptions.iter().any(|s| &s.symbol == symbol) {
            return Err(TraderError::InvalidIndicator {
                reason: format!(
                    "{} requested for {} which has no subscription",
                    indicator.indicator_type(),
                    symbol
                ),
            });
        }
        debug!(symbol = %symbol, indicator = %indicator.indicator_type(), "indicator registered");
        Ok(self.indicators.register(symbol.clone(), indicator))
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn indicators(&self) -> &IndicatorRegistry {
        &self.indicators
    }

    /// Check the declared setup and split it into run settings and indicators.
    pub fn finalize(self) -> Result<(RunSettings, IndicatorRegistry), TraderError> {
        let start_date = self.start_date.ok_or_else(|| TraderError::InvalidSetup {
            reason: "start date was not set".into(),
        })?;
        let end_date = self.end_date.ok_or_else(|| TraderError::InvalidSetup {
            reason: "end date was not set".into(),
        })?;
        if start_date > end_date {
            return Err(TraderError::InvalidSetup {
                reason: format!("start date {} is after end date {}", start_date, end_date),
            });
        }
        if !(self.cash.is_finite() && self.cash > 0.0) {
            return Err(TraderError::InvalidSetup {
                reason: format!("starting cash must be positive, got {}", self.cash),
            });
        }
        if self.subscriptions.is_empty() {
            return Err(TraderError::InvalidSetup {
                reason: "no securities subscribed".into(),
            });
        }
        Ok((
            RunSettings {
                start_date,
                end_date,
                cash: self.cash,
                subscriptions: self.subscriptions,
            },
            self.indicators,
        ))
    }
}

/// Validated output of `initialize`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cash: f64,
    pub subscriptions: Vec<Subscription>,
}

/// Read-only view of the run for one `on_data` call, plus the requests the
/// algorithm issues during it. Requests execute after the callback returns.
#[derive(Debug)]
pub struct StepContext<'a> {
    time: NaiveDateTime,
    portfolio: &'a Portfolio,
    indicators: &'a IndicatorRegistry,
    requests: Vec<OrderRequest>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        time: NaiveDateTime,
        portfolio: &'a Portfolio,
        indicators: &'a IndicatorRegistry,
    ) -> Self {
        StepContext {
            time,
            portfolio,
            indicators,
            requests: Vec::new(),
        }
    }

    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.portfolio
    }

    pub fn indicator(&self, id: IndicatorId) -> Option<&dyn Indicator> {
        self.indicators.get(id)
    }

    pub fn set_holdings(&mut self, symbol: &Symbol, weight: f64) {
        self.set_holdings_targets(vec![PortfolioTarget::new(symbol.clone(), weight)], false);
    }

    pub fn set_holdings_targets(&mut self, targets: Vec<PortfolioTarget>, liquidate_existing: bool) {
        self.requests.push(OrderRequest::SetHoldings {
            targets,
            liquidate_existing,
        });
    }

    pub fn liquidate(&mut self, symbol: &Symbol) {
        self.requests.push(OrderRequest::Liquidate {
            symbol: Some(symbol.clone()),
        });
    }

    pub fn liquidate_all(&mut self) {
        self.requests.push(OrderRequest::Liquidate { symbol: None });
    }

    pub fn requests(&self) -> &[OrderRequest] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<OrderRequest> {
        self.requests
    }
}
