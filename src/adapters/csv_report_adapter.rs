//! Order log writer: one CSV row per fill.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TraderError;
use crate::ports::report_port::ReportPort;
use std::path::Path;
use tracing::info;

pub const ORDER_LOG_HEADER: [&str; 7] = [
    "order_id",
    "time",
    "symbol",
    "direction",
    "quantity",
    "fill_price",
    "fee",
];

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

fn io_error(e: csv::Error) -> TraderError {
    TraderError::Io(std::io::Error::other(e))
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), TraderError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(io_error)?;
        wtr.write_record(ORDER_LOG_HEADER).map_err(io_error)?;

        for event in &result.order_events {
            wtr.write_record([
                event.order_id.to_string(),
                event.time.format("%Y-%m-%d %H:%M:%S").to_string(),
                event.symbol.ticker().to_string(),
                event.direction.to_string(),
                event.fill_quantity.abs().to_string(),
                format!("{:.4}", event.fill_price),
                format!("{:.4}", event.fee),
            ])
            .map_err(io_error)?;
        }

        wtr.flush()?;
        info!(path = %output_path.display(), fills = result.order_events.len(), "wrote order log");
        Ok(())
    }
}
