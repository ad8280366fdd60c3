//! Order requests issued by algorithms and the orders/fills they produce.

use crate::domain::symbol::Symbol;
use chrono::NaiveDateTime;
use std::fmt;

/// Desired position expressed as a fraction of total portfolio value.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioTarget {
    pub symbol: Symbol,
    pub weight: f64,
}

impl PortfolioTarget {
    pub fn new(symbol: Symbol, weight: f64) -> Self {
        PortfolioTarget { symbol, weight }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderRequest {
    SetHoldings {
        targets: Vec<PortfolioTarget>,
        liquidate_existing: bool,
    },
    /// `None` liquidates every holding.
    Liquidate { symbol: Option<Symbol> },
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderRequest::SetHoldings { targets, .. } => {
                write!(f, "SetHoldings(")?;
                for (i, t) in targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", t.symbol, t.weight)?;
                }
                write!(f, ")")
            }
            OrderRequest::Liquidate { symbol: Some(s) } => write!(f, "Liquidate({})", s),
            OrderRequest::Liquidate { symbol: None } => write!(f, "Liquidate(*)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Buy,
    Sell,
}

impl OrderDirection {
    pub fn of(quantity: i64) -> Self {
        if quantity >= 0 {
            OrderDirection::Buy
        } else {
            OrderDirection::Sell
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Buy => write!(f, "buy"),
            OrderDirection::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Filled,
    Invalid { reason: String },
}

/// A market order as submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: u64,
    pub symbol: Symbol,
    pub quantity: i64,
    pub time: NaiveDateTime,
    pub status: OrderStatus,
}

impl Order {
    pub fn direction(&self) -> OrderDirection {
        OrderDirection::of(self.quantity)
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub order_id: u64,
    pub symbol: Symbol,
    pub time: NaiveDateTime,
    pub direction: OrderDirection,
    pub fill_quantity: i64,
    pub fill_price: f64,
    pub fee: f64,
}
