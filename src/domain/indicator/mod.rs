//! Streaming technical indicators.
//!
//! Indicators here are stateful: they consume one value at a time and keep a
//! running result. The backtest driver owns an [`IndicatorRegistry`] that binds
//! each indicator to a symbol and feeds it the close of every bar for that
//! symbol before the algorithm sees the slice.
//!
//! - `IndicatorPoint`: the latest output of an indicator
//! - `IndicatorType`: indicator identity + parameters
//! - `Indicator`: the streaming update interface
//! - `IndicatorRegistry`: symbol-bound indicators addressed by `IndicatorId`

pub mod ema;
pub mod sma;

use crate::domain::error::TraderError;
use crate::domain::slice::Slice;
use crate::domain::symbol::Symbol;
use chrono::NaiveDateTime;
use std::fmt;

pub use ema::ExponentialMovingAverage;
pub use sma::SimpleMovingAverage;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub time: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
}

impl IndicatorType {
    pub fn period(&self) -> usize {
        match self {
            IndicatorType::Sma(period) | IndicatorType::Ema(period) => *period,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
        }
    }
}

pub trait Indicator: fmt::Debug {
    fn indicator_type(&self) -> IndicatorType;

    /// Consume one value. Returns whether the indicator is ready afterwards.
    fn update(&mut self, time: NaiveDateTime, value: f64) -> bool;

    fn is_ready(&self) -> bool {
        self.samples() >= self.warm_up_period()
    }

    fn samples(&self) -> usize;

    fn warm_up_period(&self) -> usize;

    /// Latest output, `None` until the first sample.
    fn current(&self) -> Option<IndicatorPoint>;

    fn value(&self) -> f64 {
        self.current().map(|p| p.value).unwrap_or(0.0)
    }

    fn reset(&mut self);
}

pub(crate) fn check_period(kind: &str, period: usize) -> Result<(), TraderError> {
    if period == 0 {
        return Err(TraderError::InvalidIndicator {
            reason: format!("{} period must be at least 1", kind),
        });
    }
    Ok(())
}

/// Handle returned when an indicator is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorId(usize);

#[derive(Debug)]
struct BoundIndicator {
    symbol: Symbol,
    indicator: Box<dyn Indicator>,
}

#[derive(Debug, Default)]
pub struct IndicatorRegistry {
    entries: Vec<BoundIndicator>,
}

impl IndicatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, symbol: Symbol, indicator: Box<dyn Indicator>) -> IndicatorId {
        self.entries.push(BoundIndicator { symbol, indicator });
        IndicatorId(self.entries.len() - 1)
    }

    pub fn get(&self, id: IndicatorId) -> Option<&dyn Indicator> {
        self.entries.get(id.0).map(|e| e.indicator.as_ref())
    }

    pub fn symbol(&self, id: IndicatorId) -> Option<&Symbol> {
        self.entries.get(id.0).map(|e| &e.symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feed each indicator the close of its symbol's bar, if the slice has one.
    /// Returns the number of indicators updated.
    pub fn update(&mut self, slice: &Slice) -> usize {
        let mut updated = 0;
        for entry in &mut self.entries {
            if let Some(bar) = slice.get(&entry.symbol) {
                entry.indicator.update(bar.time, bar.price());
                updated += 1;
            }
        }
        updated
    }
}
