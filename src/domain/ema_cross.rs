//! EMA-crossover index algorithm.
//!
//! Uses two EMAs of a non-tradable index as the signal and trades a correlated
//! equity: fully invested while the fast EMA is above the slow one, flat
//! otherwise. At the end of the run it asserts the index was never traded.

use chrono::NaiveDate;

use crate::domain::algorithm::{Algorithm, Setup, StepContext};
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorId;
use crate::domain::portfolio::Portfolio;
use crate::domain::slice::Slice;
use crate::domain::symbol::{Resolution, Symbol};

#[derive(Debug, Clone, PartialEq)]
pub struct EmaCrossParams {
    pub index_ticker: String,
    pub equity_ticker: String,
    pub resolution: Resolution,
    pub fast_period: usize,
    pub slow_period: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cash: f64,
    pub allocation: f64,
}

impl Default for EmaCrossParams {
    fn default() -> Self {
        EmaCrossParams {
            index_ticker: "SPX".into(),
            equity_ticker: "SPY".into(),
            resolution: Resolution::Minute,
            fast_period: 200,
            slow_period: 80,
            start_date: NaiveDate::from_ymd_opt(2021, 1, 4).expect("valid calendar date"),
            end_date: NaiveDate::from_ymd_opt(2021, 1, 15).expect("valid calendar date"),
            cash: 1_000_000.0,
            allocation: 1.0,
        }
    }
}

/// Symbols and indicator handles obtained during `initialize`.
#[derive(Debug, Clone)]
struct Wiring {
    index: Symbol,
    equity: Symbol,
    ema_fast: IndicatorId,
    ema_slow: IndicatorId,
}

#[derive(Debug, Clone)]
pub struct EmaCrossIndexAlgorithm {
    params: EmaCrossParams,
    wiring: Option<Wiring>,
}

impl EmaCrossIndexAlgorithm {
    pub fn new(params: EmaCrossParams) -> Self {
        EmaCrossIndexAlgorithm {
            params,
            wiring: None,
        }
    }

    pub fn params(&self) -> &EmaCrossParams {
        &self.params
    }

    pub fn index_symbol(&self) -> Option<&Symbol> {
        self.wiring.as_ref().map(|w| &w.index)
    }

    pub fn equity_symbol(&self) -> Option<&Symbol> {
        self.wiring.as_ref().map(|w| &w.equity)
    }
}

impl Default for EmaCrossIndexAlgorithm {
    fn default() -> Self {
        Self::new(EmaCrossParams::default())
    }
}

impl Algorithm for EmaCrossIndexAlgorithm {
    fn name(&self) -> &str {
        "EmaCrossIndexAlgorithm"
    }

    fn initialize(&mut self, setup: &mut Setup) -> Result<(), TraderError> {
        setup.set_start_date(self.params.start_date);
        setup.set_end_date(self.params.end_date);
        setup.set_cash(self.params.cash);

        // signal source only; the index itself cannot be traded
        let index = setup.add_index(&self.params.index_ticker, self.params.resolution)?;
        let ema_slow = setup.ema(&index, self.params.slow_period)?;
        let ema_fast = setup.ema(&index, self.params.fast_period)?;

        let equity = setup.add_equity(&self.params.equity_ticker, self.params.resolution)?;

        self.wiring = Some(Wiring {
            index,
            equity,
            ema_fast,
            ema_slow,
        });
        Ok(())
    }

    fn on_data(&mut self, ctx: &mut StepContext<'_>, slice: &Slice) {
        let Some(wiring) = self.wiring.as_ref() else {
            return;
        };
        if !slice.contains(&wiring.index) || !slice.contains(&wiring.equity) {
            return;
        }

        let (Some(fast), Some(slow)) = (ctx.indicator(wiring.ema_fast), ctx.indicator(wiring.ema_slow))
        else {
            return;
        };
        if !slow.is_ready() {
            return;
        }

        if fast.value() > slow.value() {
            ctx.set_holdings(&wiring.equity, self.params.allocation);
        } else {
            ctx.liquidate(&wiring.equity);
        }
    }

    fn on_end_of_algorithm(&mut self, portfolio: &Portfolio) -> Result<(), TraderError> {
        let Some(wiring) = self.wiring.as_ref() else {
            return Ok(());
        };
        if portfolio.total_sale_volume(&wiring.index) > 0.0 {
            return Err(TraderError::AlgorithmAssertion {
                reason: "index is not tradable".into(),
            });
        }
        Ok(())
    }
}
