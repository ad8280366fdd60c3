//! Order execution and fill simulation.
//!
//! Turns algorithm requests into market orders, sizes target allocations
//! against the portfolio, applies slippage and commission, and settles fills.

use std::cmp::Ordering;

use tracing::{debug, warn};

use super::order::{Order, OrderDirection, OrderEvent, OrderRequest, OrderStatus, PortfolioTarget};
use super::portfolio::Portfolio;
use super::slice::Slice;
use super::symbol::Symbol;

/// Configuration for backtest execution parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Buys fill above the market, sells below it.
pub fn apply_slippage(market_price: f64, direction: OrderDirection, slippage_pct: f64) -> f64 {
    match direction {
        OrderDirection::Buy => market_price * (1.0 + slippage_pct / 100.0),
        OrderDirection::Sell => market_price * (1.0 - slippage_pct / 100.0),
    }
}

/// Whole shares worth `weight` of `portfolio_value` at `price`, truncated toward zero.
pub fn target_quantity(portfolio_value: f64, weight: f64, price: f64) -> i64 {
    if price <= 0.0 || !portfolio_value.is_finite() || !weight.is_finite() {
        return 0;
    }
    (portfolio_value * weight / price).trunc() as i64
}

/// Largest buy quantity whose cost plus commission fits in `cash`.
pub fn affordable_quantity(cash: f64, execution_price: f64, config: &ExecutionConfig) -> i64 {
    let budget = cash - config.commission_per_trade;
    if budget <= 0.0 || execution_price <= 0.0 {
        return 0;
    }
    let unit_cost = execution_price * (1.0 + config.commission_pct / 100.0);
    (budget / unit_cost).floor() as i64
}

const CASH_TOLERANCE: f64 = 1e-6;

/// Owns order numbering and the order/fill log for one run.
#[derive(Debug)]
pub struct OrderManager {
    config: ExecutionConfig,
    next_id: u64,
    orders: Vec<Order>,
    events: Vec<OrderEvent>,
}

impl OrderManager {
    pub fn new(config: ExecutionConfig) -> Self {
        OrderManager {
            config,
            next_id: 1,
            orders: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn events(&self) -> &[OrderEvent] {
        &self.events
    }

    pub fn into_parts(self) -> (Vec<Order>, Vec<OrderEvent>) {
        (self.orders, self.events)
    }

    /// Execute one request against the slice's prices. Returns the fills it produced.
    pub fn execute(
        &mut self,
        request: &OrderRequest,
        portfolio: &mut Portfolio,
        slice: &Slice,
    ) -> Vec<OrderEvent> {
        debug!(time = %slice.time(), request = %request, "executing request");
        match request {
            OrderRequest::SetHoldings {
                targets,
                liquidate_existing,
            } => self.set_holdings(targets, *liquidate_existing, portfolio, slice),
            OrderRequest::Liquidate { symbol: Some(symbol) } => {
                let quantity = portfolio.quantity(symbol);
                self.market_order(symbol, -quantity, portfolio, slice)
                    .into_iter()
                    .collect()
            }
            OrderRequest::Liquidate { symbol: None } => {
                let mut fills = Vec::new();
                for symbol in portfolio.invested_symbols() {
                    let quantity = portfolio.quantity(&symbol);
                    fills.extend(self.market_order(&symbol, -quantity, portfolio, slice));
                }
                fills
            }
        }
    }

    /// Rebalance to the targets. Orders that reduce exposure go first so the
    /// cash they free is available to the orders that add exposure.
    fn set_holdings(
        &mut self,
        targets: &[PortfolioTarget],
        liquidate_existing: bool,
        portfolio: &mut Portfolio,
        slice: &Slice,
    ) -> Vec<OrderEvent> {
        let mut fills = Vec::new();

        if liquidate_existing {
            for symbol in portfolio.invested_symbols() {
                if targets.iter().any(|t| t.symbol == symbol) {
                    continue;
                }
                let quantity = portfolio.quantity(&symbol);
                fills.extend(self.market_order(&symbol, -quantity, portfolio, slice));
            }
        }

        let portfolio_value = portfolio.total_portfolio_value();
        let mut planned: Vec<(Symbol, i64, f64)> = Vec::with_capacity(targets.len());

        for target in targets {
            if !target.symbol.is_tradable() {
                self.reject(
                    &target.symbol,
                    0,
                    slice,
                    format!("{} is not tradable", target.symbol),
                );
                continue;
            }
            if !target.weight.is_finite() {
                self.reject(&target.symbol, 0, slice, "weight is not finite".into());
                continue;
            }
            let Some(price) = market_price(&target.symbol, portfolio, slice) else {
                self.reject(
                    &target.symbol,
                    0,
                    slice,
                    format!("no price for {}", target.symbol),
                );
                continue;
            };
            let delta = target_quantity(portfolio_value, target.weight, price)
                - portfolio.quantity(&target.symbol);
            if delta != 0 {
                planned.push((target.symbol.clone(), delta, delta as f64 * price));
            }
        }

        planned.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal));

        for (symbol, delta, _) in planned {
            let quantity = if delta > 0 {
                let price = market_price(&symbol, portfolio, slice).unwrap_or(0.0);
                let execution_price =
                    apply_slippage(price, OrderDirection::Buy, self.config.slippage_pct);
                delta.min(affordable_quantity(portfolio.cash, execution_price, &self.config))
            } else {
                delta
            };
            if quantity == 0 {
                debug!(symbol = %symbol, "target not affordable, skipping");
                continue;
            }
            fills.extend(self.market_order(&symbol, quantity, portfolio, slice));
        }

        fills
    }

    /// Place and immediately fill a market order for signed `quantity`.
    fn market_order(
        &mut self,
        symbol: &Symbol,
        quantity: i64,
        portfolio: &mut Portfolio,
        slice: &Slice,
    ) -> Option<OrderEvent> {
        if quantity == 0 {
            return None;
        }
        if !symbol.is_tradable() {
            self.reject(symbol, quantity, slice, format!("{} is not tradable", symbol));
            return None;
        }
        let Some(price) = market_price(symbol, portfolio, slice) else {
            self.reject(symbol, quantity, slice, format!("no price for {}", symbol));
            return None;
        };

        let direction = OrderDirection::of(quantity);
        let fill_price = apply_slippage(price, direction, self.config.slippage_pct);
        let fee = calculate_commission(quantity.unsigned_abs() as f64 * fill_price, &self.config);

        if direction == OrderDirection::Buy {
            let total_cost = quantity as f64 * fill_price + fee;
            if total_cost > portfolio.cash + CASH_TOLERANCE {
                self.reject(
                    symbol,
                    quantity,
                    slice,
                    format!(
                        "insufficient buying power: need {:.2}, have {:.2}",
                        total_cost, portfolio.cash
                    ),
                );
                return None;
            }
        }

        let id = self.allocate_id();
        let event = OrderEvent {
            order_id: id,
            symbol: symbol.clone(),
            time: slice.time(),
            direction,
            fill_quantity: quantity,
            fill_price,
            fee,
        };
        portfolio.apply_fill(&event);

        debug!(
            order_id = id,
            symbol = %symbol,
            quantity,
            price = fill_price,
            fee,
            "order filled"
        );

        self.orders.push(Order {
            id,
            symbol: symbol.clone(),
            quantity,
            time: slice.time(),
            status: OrderStatus::Filled,
        });
        self.events.push(event.clone());
        Some(event)
    }

    fn reject(&mut self, symbol: &Symbol, quantity: i64, slice: &Slice, reason: String) {
        let id = self.allocate_id();
        warn!(order_id = id, symbol = %symbol, quantity, %reason, "order rejected");
        self.orders.push(Order {
            id,
            symbol: symbol.clone(),
            quantity,
            time: slice.time(),
            status: OrderStatus::Invalid { reason },
        });
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn market_price(symbol: &Symbol, portfolio: &Portfolio, slice: &Slice) -> Option<f64> {
    slice
        .get(symbol)
        .map(|bar| bar.price())
        .or_else(|| portfolio.last_price(symbol))
}
