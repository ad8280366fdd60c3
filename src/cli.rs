//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult, Session};
use crate::domain::config_validation::{parse_date, validate_algorithm_config, validate_backtest_config};
use crate::domain::ema_cross::{EmaCrossIndexAlgorithm, EmaCrossParams};
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::metrics::Metrics;
use crate::domain::symbol::Resolution;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_DATA_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "indextrader", about = "Index-signal EMA crossover backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [backtest] data_dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Order log output path, overrides [backtest] output
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range for a ticker
    Info {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(long, default_value_t = Resolution::Minute)]
        resolution: Resolution,
    },
    /// List tickers with data at a resolution
    ListTickers {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long, default_value_t = Resolution::Minute)]
        resolution: Resolution,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, data_dir.as_deref(), output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            data_dir,
            ticker,
            resolution,
        } => run_info(&data_dir, &ticker, resolution),
        Command::ListTickers {
            data_dir,
            resolution,
        } => run_list_tickers(&data_dir, resolution),
    }
}

fn fail(err: &TraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Load, validate and convert a config file into run parameters.
fn load_run_config(path: &Path) -> Result<(FileConfigAdapter, BacktestConfig, EmaCrossParams), ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;

    validate_backtest_config(&adapter).map_err(|e| fail(&e))?;
    validate_algorithm_config(&adapter).map_err(|e| fail(&e))?;

    let bt_config = build_backtest_config(&adapter).map_err(|e| fail(&e))?;
    let params = build_algorithm_params(&adapter).map_err(|e| fail(&e))?;
    Ok((adapter, bt_config, params))
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TraderError> {
    let defaults = BacktestConfig::default();
    Ok(BacktestConfig {
        commission_per_trade: adapter.get_double(
            "backtest",
            "commission_per_trade",
            defaults.commission_per_trade,
        ),
        commission_pct: adapter.get_double("backtest", "commission_pct", defaults.commission_pct),
        slippage_pct: adapter.get_double("backtest", "slippage_pct", defaults.slippage_pct),
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),
    })
}

pub fn build_algorithm_params(adapter: &dyn ConfigPort) -> Result<EmaCrossParams, TraderError> {
    let defaults = EmaCrossParams::default();

    let resolution = match adapter.get_string("algorithm", "resolution") {
        Some(s) => s.parse()?,
        None => defaults.resolution,
    };
    let period = |key: &str, default: usize| -> Result<usize, TraderError> {
        let value = adapter.get_int("algorithm", key, default as i64);
        usize::try_from(value).map_err(|_| TraderError::ConfigInvalid {
            section: "algorithm".into(),
            key: key.into(),
            reason: "period must be at least 1".into(),
        })
    };

    Ok(EmaCrossParams {
        index_ticker: adapter
            .get_string("algorithm", "index")
            .unwrap_or(defaults.index_ticker),
        equity_ticker: adapter
            .get_string("algorithm", "equity")
            .unwrap_or(defaults.equity_ticker),
        resolution,
        fast_period: period("fast_period", defaults.fast_period)?,
        slow_period: period("slow_period", defaults.slow_period)?,
        start_date: parse_date(adapter, "start_date")?.unwrap_or(defaults.start_date),
        end_date: parse_date(adapter, "end_date")?.unwrap_or(defaults.end_date),
        cash: adapter.get_double("algorithm", "cash", defaults.cash),
        allocation: adapter.get_double("algorithm", "allocation", defaults.allocation),
    })
}

fn run_backtest(config_path: &Path, data_dir: Option<&Path>, output: Option<&Path>) -> ExitCode {
    let (adapter, bt_config, params) = match load_run_config(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let data_dir = data_dir.map(Path::to_path_buf).unwrap_or_else(|| {
        adapter
            .get_string("backtest", "data_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    });
    let output = output
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("backtest", "output").map(PathBuf::from));

    eprintln!("Reading bars from {}", data_dir.display());
    let data_port = CsvAdapter::new(data_dir);
    run_backtest_pipeline(&data_port, params, &bt_config, output.as_deref())
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    params: EmaCrossParams,
    bt_config: &BacktestConfig,
    output_path: Option<&Path>,
) -> ExitCode {
    eprintln!(
        "Running backtest: {} signal, {} traded, {} to {}",
        params.index_ticker, params.equity_ticker, params.start_date, params.end_date
    );

    let algorithm = EmaCrossIndexAlgorithm::new(params);
    let result = match backtest_engine::run_backtest(algorithm, data_port, bt_config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let metrics = Metrics::compute(&result.portfolio, bt_config.risk_free_rate);
    print_summary(&result, &metrics);

    if let Some(path) = output_path {
        if let Err(e) = CsvReportAdapter::new().write(&result, path) {
            return fail(&e);
        }
        eprintln!("\nOrder log written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult, metrics: &Metrics) {
    let filled = result.orders.iter().filter(|o| o.is_filled()).count();

    eprintln!("\n=== {} ===", result.algorithm_name);
    eprintln!("Period:           {} to {}", result.start_date, result.end_date);
    eprintln!("Slices:           {}", result.slices_processed);
    eprintln!("Orders:           {} ({} filled)", result.orders.len(), filled);
    eprintln!("Final Equity:     {:.2}", result.portfolio.total_portfolio_value());
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!(
        "Max Drawdown:     -{:.1}% ({} days)",
        metrics.max_drawdown * 100.0,
        metrics.max_drawdown_duration
    );
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Total Fees:       {:.2}", metrics.total_fees);
    eprintln!("Avg Trade:        {:.0} min", metrics.avg_trade_minutes);

    let invested = result.portfolio.invested_symbols();
    if !invested.is_empty() {
        eprintln!("\n=== Open Holdings ===");
        for symbol in &invested {
            if let Some(h) = result.portfolio.holding(symbol) {
                eprintln!(
                    "  {}:  {} @ {:.2}, unrealized {:+.2}",
                    symbol,
                    h.quantity,
                    h.average_price,
                    h.unrealized_pnl()
                );
            }
        }
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    let (_, bt_config, params) = match load_run_config(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    eprintln!("Config validated successfully");

    let indicators = [
        IndicatorType::Ema(params.fast_period),
        IndicatorType::Ema(params.slow_period),
    ];
    let index_ticker = params.index_ticker.clone();
    let allocation = params.allocation;

    let session = match Session::initialize(EmaCrossIndexAlgorithm::new(params), &bt_config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let settings = session.settings();

    eprintln!("\nRun:");
    eprintln!("  period: {} to {}", settings.start_date, settings.end_date);
    eprintln!("  cash:   {:.2}", settings.cash);

    eprintln!("\nSubscriptions:");
    for sub in &settings.subscriptions {
        let tradable = if sub.symbol.is_tradable() { "" } else { " (not tradable)" };
        eprintln!(
            "  {} {} {}{}",
            sub.symbol,
            sub.symbol.security_type(),
            sub.resolution,
            tradable
        );
    }

    eprintln!("\nIndicators on {}:", index_ticker);
    for ind in &indicators {
        eprintln!("  {}", ind);
    }
    eprintln!("\nAllocation when fast > slow: {:.0}%", allocation * 100.0);

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    for check in [validate_backtest_config, validate_algorithm_config] {
        if let Err(e) = check(&adapter) {
            return fail(&e);
        }
    }

    eprintln!("Config is valid");
    ExitCode::SUCCESS
}

fn run_info(data_dir: &Path, ticker: &str, resolution: Resolution) -> ExitCode {
    let adapter = CsvAdapter::new(data_dir.to_path_buf());
    match adapter.get_data_range(ticker, resolution) {
        Ok(Some((first, last, count))) => {
            println!("{} ({}): {} bars, {} to {}", ticker, resolution, count, first, last);
            ExitCode::SUCCESS
        }
        Ok(None) => fail(&TraderError::NoData {
            ticker: ticker.to_string(),
            resolution: resolution.to_string(),
        }),
        Err(e) => fail(&e),
    }
}

fn run_list_tickers(data_dir: &Path, resolution: Resolution) -> ExitCode {
    let adapter = CsvAdapter::new(data_dir.to_path_buf());
    let tickers = match adapter.list_tickers(resolution) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };

    if tickers.is_empty() {
        eprintln!("No tickers found at {} resolution", resolution);
    } else {
        for ticker in &tickers {
            println!("{}", ticker);
        }
        eprintln!("{} tickers found", tickers.len());
    }
    ExitCode::SUCCESS
}
