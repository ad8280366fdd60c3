//! Core domain types and logic.

pub mod symbol;
pub mod bar;
pub mod slice;
pub mod holding;
pub mod portfolio;
pub mod order;
pub mod execution;
pub mod indicator;
pub mod algorithm;
pub mod ema_cross;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
