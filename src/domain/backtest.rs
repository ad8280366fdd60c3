//! Backtest driver and event loop.
//!
//! A [`Session`] owns one initialized algorithm together with its portfolio,
//! indicators and order manager, and advances it one slice at a time.
//! [`run_backtest`] loads the subscribed data through a [`DataPort`] and drives
//! a session from the first slice to the end-of-run check.

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::domain::algorithm::{Algorithm, RunSettings, Setup, StepContext};
use crate::domain::error::TraderError;
use crate::domain::execution::{ExecutionConfig, OrderManager};
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::order::{Order, OrderEvent, OrderRequest};
use crate::domain::portfolio::Portfolio;
use crate::domain::slice::{build_slices, SeriesData, Slice};
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: self.commission_per_trade,
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub algorithm_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub portfolio: Portfolio,
    pub orders: Vec<Order>,
    pub order_events: Vec<OrderEvent>,
    pub slices_processed: usize,
    pub data_points: usize,
}

pub struct Session<A: Algorithm> {
    algorithm: A,
    settings: RunSettings,
    indicators: IndicatorRegistry,
    portfolio: Portfolio,
    orders: OrderManager,
    slices_processed: usize,
    data_points: usize,
}

impl<A: Algorithm> Session<A> {
    /// Run the algorithm's `initialize` and validate what it declared.
    pub fn initialize(mut algorithm: A, config: &BacktestConfig) -> Result<Self, TraderError> {
        let mut setup = Setup::new();
        algorithm.initialize(&mut setup)?;
        let (settings, indicators) = setup.finalize()?;

        info!(
            algorithm = algorithm.name(),
            start = %settings.start_date,
            end = %settings.end_date,
            cash = settings.cash,
            subscriptions = settings.subscriptions.len(),
            indicators = indicators.len(),
            "algorithm initialized"
        );

        Ok(Session {
            algorithm,
            portfolio: Portfolio::new(settings.cash),
            settings,
            indicators,
            orders: OrderManager::new(config.execution()),
            slices_processed: 0,
            data_points: 0,
        })
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn orders(&self) -> &[Order] {
        self.orders.orders()
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// Advance one time step: mark prices, update indicators, run `on_data`,
    /// then execute whatever it requested. Returns the requests issued.
    pub fn step(&mut self, slice: &Slice) -> Vec<OrderRequest> {
        self.portfolio.update_prices(slice);
        self.indicators.update(slice);

        let mut ctx = StepContext::new(slice.time(), &self.portfolio, &self.indicators);
        self.algorithm.on_data(&mut ctx, slice);
        let requests = ctx.into_requests();

        for request in &requests {
            self.orders.execute(request, &mut self.portfolio, slice);
        }

        self.portfolio.record_equity(slice.time());
        self.slices_processed += 1;
        self.data_points += slice.len();
        requests
    }

    /// Run the end-of-run hook and hand back the results.
    pub fn finish(mut self) -> Result<BacktestResult, TraderError> {
        if let Err(e) = self.algorithm.on_end_of_algorithm(&self.portfolio) {
            error!(algorithm = self.algorithm.name(), error = %e, "end of algorithm check failed");
            return Err(e);
        }

        let (orders, order_events) = self.orders.into_parts();
        info!(
            algorithm = self.algorithm.name(),
            slices = self.slices_processed,
            orders = orders.len(),
            fills = order_events.len(),
            equity = self.portfolio.total_portfolio_value(),
            "backtest complete"
        );

        Ok(BacktestResult {
            algorithm_name: self.algorithm.name().to_string(),
            start_date: self.settings.start_date,
            end_date: self.settings.end_date,
            portfolio: self.portfolio,
            orders,
            order_events,
            slices_processed: self.slices_processed,
            data_points: self.data_points,
        })
    }
}

/// Load every subscription in the run's date range. Subscriptions without
/// data are skipped; an error is returned only if none has any.
pub fn load_series(
    settings: &RunSettings,
    data_port: &dyn DataPort,
) -> Result<Vec<SeriesData>, TraderError> {
    let mut series = Vec::with_capacity(settings.subscriptions.len());

    for sub in &settings.subscriptions {
        let bars = match data_port.fetch_bars(
            &sub.symbol,
            sub.resolution,
            settings.start_date,
            settings.end_date,
        ) {
            Ok(bars) => bars,
            Err(TraderError::NoData { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };

        if bars.is_empty() {
            warn!(symbol = %sub.symbol, resolution = %sub.resolution, "no data for subscription, skipping");
            continue;
        }
        debug!(symbol = %sub.symbol, bars = bars.len(), "loaded bars");
        series.push(SeriesData::new(sub.symbol.clone(), sub.resolution, bars));
    }

    if series.is_empty() {
        let (ticker, resolution) = settings
            .subscriptions
            .first()
            .map(|s| (s.symbol.ticker().to_string(), s.resolution.to_string()))
            .unwrap_or_default();
        return Err(TraderError::NoData { ticker, resolution });
    }
    Ok(series)
}

pub fn run_backtest<A: Algorithm>(
    algorithm: A,
    data_port: &dyn DataPort,
    config: &BacktestConfig,
) -> Result<BacktestResult, TraderError> {
    let mut session = Session::initialize(algorithm, config)?;
    let series = load_series(session.settings(), data_port)?;
    let slices = build_slices(&series);

    info!(slices = slices.len(), "running backtest");
    for slice in &slices {
        session.step(slice);
    }

    session.finish()
}
