//! Per-timestamp market snapshots and the unified timeline.

use crate::domain::bar::TradeBar;
use crate::domain::symbol::{Resolution, Symbol};
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap};

/// One subscription's loaded bar history, indexed by bar time.
#[derive(Debug, Clone)]
pub struct SeriesData {
    pub symbol: Symbol,
    pub resolution: Resolution,
    pub bars: Vec<TradeBar>,
    pub time_index: HashMap<NaiveDateTime, usize>,
}

impl SeriesData {
    pub fn new(symbol: Symbol, resolution: Resolution, bars: Vec<TradeBar>) -> Self {
        let time_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.time, i))
            .collect();
        Self {
            symbol,
            resolution,
            bars,
            time_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, time: NaiveDateTime) -> Option<&TradeBar> {
        self.time_index.get(&time).map(|&i| &self.bars[i])
    }
}

/// Immutable snapshot of every subscribed bar for one time step.
#[derive(Debug, Clone)]
pub struct Slice {
    time: NaiveDateTime,
    bars: HashMap<Symbol, TradeBar>,
}

impl Slice {
    pub fn new(time: NaiveDateTime) -> Self {
        Slice {
            time,
            bars: HashMap::new(),
        }
    }

    pub fn with_bar(mut self, bar: TradeBar) -> Self {
        self.bars.insert(bar.symbol.clone(), bar);
        self
    }

    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.bars.contains_key(symbol)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&TradeBar> {
        self.bars.get(symbol)
    }

    pub fn bars(&self) -> impl Iterator<Item = &TradeBar> {
        self.bars.values()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

pub fn build_unified_timeline(series: &[SeriesData]) -> Vec<NaiveDateTime> {
    let unique_times: BTreeSet<NaiveDateTime> = series
        .iter()
        .flat_map(|s| s.bars.iter().map(|bar| bar.time))
        .collect();
    unique_times.into_iter().collect()
}

/// One slice per unique bar time, in chronological order.
pub fn build_slices(series: &[SeriesData]) -> Vec<Slice> {
    build_unified_timeline(series)
        .into_iter()
        .map(|time| {
            series
                .iter()
                .filter_map(|s| s.get_bar(time))
                .fold(Slice::new(time), |slice, bar| slice.with_bar(bar.clone()))
        })
        .collect()
}
