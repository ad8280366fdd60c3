//! Per-symbol holding state and realized trades.

use crate::domain::symbol::Symbol;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: Symbol,
    pub quantity: i64,
    pub average_price: f64,
    pub last_price: f64,
    /// Cumulative |quantity * price| over every fill, buys and sells alike.
    pub total_sale_volume: f64,
    pub total_fees: f64,
    pub opened_at: Option<NaiveDateTime>,
    open_fees: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: Symbol,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub pnl: f64,
}

impl Holding {
    pub fn new(symbol: Symbol) -> Self {
        Holding {
            symbol,
            quantity: 0,
            average_price: 0.0,
            last_price: 0.0,
            total_sale_volume: 0.0,
            total_fees: 0.0,
            opened_at: None,
            open_fees: 0.0,
        }
    }

    pub fn is_invested(&self) -> bool {
        self.quantity != 0
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    /// Signed value at the last known price.
    pub fn holdings_value(&self) -> f64 {
        self.quantity as f64 * self.last_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.quantity as f64 * (self.last_price - self.average_price)
    }

    /// Apply a fill of signed `quantity` at `price`.
    ///
    /// The part of the fill that reduces the position is realized as a
    /// `ClosedTrade`; its pnl is net of the closing fee and the pro-rata share
    /// of the fees paid while opening. A fill that crosses zero closes the old
    /// side and opens the remainder at `price`.
    pub fn apply_fill(
        &mut self,
        quantity: i64,
        price: f64,
        fee: f64,
        time: NaiveDateTime,
    ) -> Option<ClosedTrade> {
        if quantity == 0 {
            return None;
        }

        self.total_sale_volume += quantity.unsigned_abs() as f64 * price;
        self.total_fees += fee;
        self.last_price = price;

        let same_side = self.quantity == 0 || (self.quantity > 0) == (quantity > 0);
        if same_side {
            let new_quantity = self.quantity + quantity;
            self.average_price = (self.quantity as f64 * self.average_price
                + quantity as f64 * price)
                / new_quantity as f64;
            if self.quantity == 0 {
                self.opened_at = Some(time);
            }
            self.quantity = new_quantity;
            self.open_fees += fee;
            return None;
        }

        let closing = quantity.abs().min(self.quantity.abs());
        let signed_closing = closing * self.quantity.signum();
        let fee_share = self.open_fees * closing as f64 / self.quantity.abs() as f64;
        let closing_fee = fee * closing as f64 / quantity.abs() as f64;
        self.open_fees -= fee_share;

        let trade = ClosedTrade {
            symbol: self.symbol.clone(),
            quantity: signed_closing,
            entry_price: self.average_price,
            exit_price: price,
            entry_time: self.opened_at.unwrap_or(time),
            exit_time: time,
            pnl: signed_closing as f64 * (price - self.average_price) - fee_share - closing_fee,
        };

        self.quantity += quantity;
        if self.quantity == 0 {
            self.average_price = 0.0;
            self.opened_at = None;
            self.open_fees = 0.0;
        } else if (self.quantity > 0) == (quantity > 0) {
            // flipped through zero
            self.average_price = price;
            self.opened_at = Some(time);
            self.open_fees = fee - closing_fee;
        }

        Some(trade)
    }
}
