//! Portfolio state and equity tracking.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use super::holding::{ClosedTrade, Holding};
use super::order::OrderEvent;
use super::slice::Slice;
use super::symbol::Symbol;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub time: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub holdings: HashMap<Symbol, Holding>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            holdings: HashMap::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn holding(&self, symbol: &Symbol) -> Option<&Holding> {
        self.holdings.get(symbol)
    }

    pub fn quantity(&self, symbol: &Symbol) -> i64 {
        self.holding(symbol).map(|h| h.quantity).unwrap_or(0)
    }

    /// Cumulative traded value in `symbol`; zero if it was never traded.
    pub fn total_sale_volume(&self, symbol: &Symbol) -> f64 {
        self.holding(symbol)
            .map(|h| h.total_sale_volume)
            .unwrap_or(0.0)
    }

    pub fn invested(&self) -> bool {
        self.holdings.values().any(|h| h.is_invested())
    }

    /// Symbols with a nonzero position, sorted for deterministic iteration.
    pub fn invested_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self
            .holdings
            .values()
            .filter(|h| h.is_invested())
            .map(|h| h.symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    pub fn total_holdings_value(&self) -> f64 {
        self.holdings.values().map(|h| h.holdings_value()).sum()
    }

    pub fn total_portfolio_value(&self) -> f64 {
        self.cash + self.total_holdings_value()
    }

    pub fn total_fees(&self) -> f64 {
        self.holdings.values().map(|h| h.total_fees).sum()
    }

    /// Mark every held symbol that has a bar in the slice to its close.
    pub fn update_prices(&mut self, slice: &Slice) {
        for holding in self.holdings.values_mut() {
            if let Some(bar) = slice.get(&holding.symbol) {
                holding.last_price = bar.price();
            }
        }
    }

    pub fn last_price(&self, symbol: &Symbol) -> Option<f64> {
        self.holding(symbol)
            .map(|h| h.last_price)
            .filter(|&p| p > 0.0)
    }

    /// Settle a fill against cash and the symbol's holding.
    pub fn apply_fill(&mut self, event: &OrderEvent) {
        let value = event.fill_quantity as f64 * event.fill_price;
        self.cash -= value + event.fee;

        let holding = self
            .holdings
            .entry(event.symbol.clone())
            .or_insert_with(|| Holding::new(event.symbol.clone()));
        if let Some(trade) = holding.apply_fill(
            event.fill_quantity,
            event.fill_price,
            event.fee,
            event.time,
        ) {
            self.closed_trades.push(trade);
        }
    }

    pub fn record_equity(&mut self, time: NaiveDateTime) {
        let equity = self.total_portfolio_value();
        self.equity_curve.push(EquityPoint { time, equity });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::TradeBar;
    use crate::domain::order::OrderDirection;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn at(m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, 4)
            .unwrap()
            .and_hms_opt(10, m, 0)
            .unwrap()
    }

    fn fill(symbol: &Symbol, quantity: i64, price: f64, fee: f64) -> OrderEvent {
        OrderEvent {
            order_id: 1,
            symbol: symbol.clone(),
            time: at(0),
            direction: if quantity > 0 {
                OrderDirection::Buy
            } else {
                OrderDirection::Sell
            },
            fill_quantity: quantity,
            fill_price: price,
            fee,
        }
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(1_000_000.0);
        assert_relative_eq!(portfolio.cash, 1_000_000.0);
        assert_relative_eq!(portfolio.initial_capital, 1_000_000.0);
        assert!(portfolio.holdings.is_empty());
        assert!(!portfolio.invested());
        assert_relative_eq!(portfolio.total_portfolio_value(), 1_000_000.0);
    }

    #[test]
    fn buy_fill_moves_cash_into_holdings() {
        let spy = Symbol::equity("SPY");
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(&spy, 100, 370.0, 1.0));

        assert_relative_eq!(portfolio.cash, 100_000.0 - 37_000.0 - 1.0);
        assert_eq!(portfolio.quantity(&spy), 100);
        assert!(portfolio.invested());
        assert_relative_eq!(portfolio.total_portfolio_value(), 99_999.0);
        assert_relative_eq!(portfolio.total_sale_volume(&spy), 37_000.0);
        assert_relative_eq!(portfolio.total_fees(), 1.0);
    }

    #[test]
    fn round_trip_records_closed_trade() {
        let spy = Symbol::equity("SPY");
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(&spy, 100, 370.0, 0.0));
        portfolio.apply_fill(&fill(&spy, -100, 380.0, 0.0));

        assert_eq!(portfolio.closed_trades.len(), 1);
        assert_relative_eq!(portfolio.closed_trades[0].pnl, 1000.0);
        assert_relative_eq!(portfolio.cash, 101_000.0);
        assert!(!portfolio.invested());
        assert_relative_eq!(portfolio.total_sale_volume(&spy), 75_000.0);
    }

    #[test]
    fn sale_volume_zero_for_untraded_symbol() {
        let portfolio = Portfolio::new(100_000.0);
        assert_relative_eq!(portfolio.total_sale_volume(&Symbol::index("SPX")), 0.0);
        assert_eq!(portfolio.quantity(&Symbol::index("SPX")), 0);
    }

    #[test]
    fn update_prices_marks_to_market() {
        let spy = Symbol::equity("SPY");
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill(&spy, 100, 100.0, 0.0));

        let slice = Slice::new(at(1)).with_bar(TradeBar {
            symbol: spy.clone(),
            time: at(1),
            open: 110.0,
            high: 110.0,
            low: 110.0,
            close: 110.0,
            volume: 1,
        });
        portfolio.update_prices(&slice);

        assert_relative_eq!(portfolio.total_portfolio_value(), 101_000.0);
        assert_eq!(portfolio.last_price(&spy), Some(110.0));
    }

    #[test]
    fn invested_symbols_sorted() {
        let mut portfolio = Portfolio::new(1_000_000.0);
        let spy = Symbol::equity("SPY");
        let ibm = Symbol::equity("IBM");
        portfolio.apply_fill(&fill(&spy, 1, 10.0, 0.0));
        portfolio.apply_fill(&fill(&ibm, 1, 10.0, 0.0));
        assert_eq!(portfolio.invested_symbols(), vec![ibm, spy]);
    }

    #[test]
    fn record_equity() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.record_equity(at(3));
        assert_eq!(portfolio.equity_curve.len(), 1);
        assert_eq!(portfolio.equity_curve[0].time, at(3));
        assert_relative_eq!(portfolio.equity_curve[0].equity, 100_000.0);
    }
}
