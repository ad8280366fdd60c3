//! Performance metrics computed from a finished portfolio.
//!
//! Return-based statistics use the equity curve resampled to one point per
//! calendar day (the last observation of each day), so the result does not
//! depend on the bar resolution the backtest ran at.

use super::portfolio::{EquityPoint, Portfolio};
use chrono::NaiveDate;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of days spent below a prior peak.
    pub max_drawdown_duration: i64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
    /// Mean holding time of closed trades, in minutes.
    pub avg_trade_minutes: f64,
}

/// Last equity value of each calendar day, in time order.
pub fn daily_equity(equity_curve: &[EquityPoint]) -> Vec<(NaiveDate, f64)> {
    let mut daily: Vec<(NaiveDate, f64)> = Vec::new();
    for point in equity_curve {
        let day = point.time.date();
        match daily.last_mut() {
            Some((last_day, equity)) if *last_day == day => *equity = point.equity,
            _ => daily.push((day, point.equity)),
        }
    }
    daily
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, risk_free_rate: f64) -> Self {
        let daily = daily_equity(&portfolio.equity_curve);
        let initial_capital = portfolio.initial_capital;

        let final_equity = daily.last().map(|&(_, e)| e).unwrap_or(initial_capital);
        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let years = daily.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return.is_finite() && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&daily);
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&daily, daily_rf);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_minutes = 0i64;

        for trade in &portfolio.closed_trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_minutes += (trade.exit_time - trade.entry_time).num_minutes();
        }

        let total_trades = portfolio.closed_trades.len();
        let ratio = |num: f64, den: usize| if den > 0 { num / den as f64 } else { 0.0 };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate: ratio(trades_won as f64, total_trades),
            profit_factor,
            avg_win: ratio(total_wins, trades_won),
            avg_loss: ratio(total_losses, trades_lost),
            largest_win,
            largest_loss,
            total_fees: portfolio.total_fees(),
            avg_trade_minutes: ratio(total_minutes as f64, total_trades),
        }
    }
}

fn compute_drawdown(daily: &[(NaiveDate, f64)]) -> (f64, i64) {
    let Some(&(_, first)) = daily.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0i64;
    let mut current_duration = 0i64;

    for &(_, equity) in daily {
        if equity >= peak {
            peak = equity;
            current_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(daily: &[(NaiveDate, f64)], daily_rf: f64) -> (f64, f64) {
    if daily.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = daily
        .windows(2)
        .map(|w| {
            let (prev, curr) = (w[0].1, w[1].1);
            if prev > 0.0 { (curr - prev) / prev } else { 0.0 }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let excess_return = mean - daily_rf;
    let annualize = TRADING_DAYS_PER_YEAR.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * annualize
    } else {
        0.0
    };

    let downside = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum::<f64>();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        excess_return / downside_stddev * annualize
    } else {
        0.0
    };

    (sharpe, sortino)
}
