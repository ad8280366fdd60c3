//! Integration tests for the backtest pipeline.
//!
//! Tests cover:
//! - The EMA crossover index algorithm over 2021-01-04 .. 2021-01-15 on minute bars
//! - Index orders being rejected while the equity trades
//! - Missing and failing data sources
//! - The per-step decision rule as a property over arbitrary price paths

mod common;

use common::*;
use indextrader::domain::algorithm::{Algorithm, Setup, StepContext};
use indextrader::domain::backtest::{run_backtest, BacktestConfig, Session};
use indextrader::domain::ema_cross::{EmaCrossIndexAlgorithm, EmaCrossParams};
use indextrader::domain::error::TraderError;
use indextrader::domain::metrics::Metrics;
use indextrader::domain::order::{OrderDirection, OrderRequest, OrderStatus};
use indextrader::domain::portfolio::Portfolio;
use indextrader::domain::slice::Slice;
use indextrader::domain::symbol::{Resolution, Symbol};

mod ema_cross_run {
    use super::*;

    #[test]
    fn two_week_run_never_trades_the_index() {
        let port = spx_spy_port();
        let result = run_backtest(
            EmaCrossIndexAlgorithm::default(),
            &port,
            &BacktestConfig::default(),
        )
        .unwrap();

        let spx = Symbol::index("SPX");
        let spy = Symbol::equity("SPY");

        assert_eq!(result.algorithm_name, "EmaCrossIndexAlgorithm");
        assert_eq!(result.start_date, date(2021, 1, 4));
        assert_eq!(result.end_date, date(2021, 1, 15));
        assert_eq!(result.slices_processed, 10 * MINUTES_PER_SESSION);
        assert_eq!(result.data_points, 2 * 10 * MINUTES_PER_SESSION);
        assert_eq!(result.portfolio.initial_capital, 1_000_000.0);
        assert_eq!(result.portfolio.equity_curve.len(), result.slices_processed);

        assert_eq!(result.portfolio.total_sale_volume(&spx), 0.0);
        assert!(result.portfolio.total_sale_volume(&spy) > 0.0);
        assert!(!result.order_events.is_empty());
        assert!(result.order_events.iter().all(|e| e.symbol == spy));
        assert!(result.orders.iter().all(|o| o.is_filled()));
    }

    #[test]
    fn buys_are_sized_to_cash_and_sells_flatten() {
        let port = spx_spy_port();
        let result = run_backtest(
            EmaCrossIndexAlgorithm::default(),
            &port,
            &BacktestConfig::default(),
        )
        .unwrap();

        let first_buy = result
            .order_events
            .iter()
            .find(|e| e.direction == OrderDirection::Buy)
            .unwrap();
        let notional = first_buy.fill_quantity as f64 * first_buy.fill_price;
        assert!(notional <= 1_000_000.0);
        assert!(notional > 1_000_000.0 - first_buy.fill_price);

        let mut position = 0i64;
        for event in &result.order_events {
            position += event.fill_quantity;
            assert!(position >= 0, "never short");
            if event.direction == OrderDirection::Sell {
                assert_eq!(position, 0, "liquidate closes the whole holding");
            }
        }
        assert!(result.portfolio.cash >= -1e-6);
        assert!(!result.portfolio.closed_trades.is_empty());
    }

    #[test]
    fn order_ids_are_sequential() {
        let port = spx_spy_port();
        let result = run_backtest(
            EmaCrossIndexAlgorithm::default(),
            &port,
            &BacktestConfig::default(),
        )
        .unwrap();

        for (i, order) in result.orders.iter().enumerate() {
            assert_eq!(order.id, i as u64 + 1);
        }
    }

    #[test]
    fn costs_show_up_in_fees_and_metrics() {
        let port = spx_spy_port();
        let config = BacktestConfig {
            commission_per_trade: 1.0,
            commission_pct: 0.01,
            slippage_pct: 0.05,
            risk_free_rate: 0.0,
        };
        let result = run_backtest(EmaCrossIndexAlgorithm::default(), &port, &config).unwrap();

        let fees: f64 = result.order_events.iter().map(|e| e.fee).sum();
        assert!(fees > 0.0);
        let metrics = Metrics::compute(&result.portfolio, config.risk_free_rate);
        assert!((metrics.total_fees - fees).abs() < 1e-6);
        assert_eq!(metrics.total_trades, result.portfolio.closed_trades.len());
        assert!(metrics.max_drawdown >= 0.0 && metrics.max_drawdown < 1.0);
    }

    #[test]
    fn bars_outside_the_window_are_ignored() {
        let times = session_minutes(&trading_days(date(2020, 12, 28), date(2021, 1, 19)));
        let port = MockDataPort::new()
            .with_bars("SPX", generate_bars(&Symbol::index("SPX"), &times, wave))
            .with_bars(
                "SPY",
                generate_bars(&Symbol::equity("SPY"), &times, |i| wave(i) / 10.0),
            );

        let result = run_backtest(
            EmaCrossIndexAlgorithm::default(),
            &port,
            &BacktestConfig::default(),
        )
        .unwrap();
        assert_eq!(result.slices_processed, 10 * MINUTES_PER_SESSION);
        let first = result.portfolio.equity_curve.first().unwrap().time;
        let last = result.portfolio.equity_curve.last().unwrap().time;
        assert_eq!(first.date(), date(2021, 1, 4));
        assert_eq!(last.date(), date(2021, 1, 15));
    }
}

mod missing_data {
    use super::*;

    #[test]
    fn without_equity_bars_nothing_trades() {
        let times = session_minutes(&trading_days(date(2021, 1, 4), date(2021, 1, 15)));
        let port = MockDataPort::new().with_bars(
            "SPX",
            generate_bars(&Symbol::index("SPX"), &times, wave),
        );

        let result = run_backtest(
            EmaCrossIndexAlgorithm::default(),
            &port,
            &BacktestConfig::default(),
        )
        .unwrap();
        assert_eq!(result.slices_processed, times.len());
        assert!(result.orders.is_empty());
        assert_eq!(result.portfolio.total_portfolio_value(), 1_000_000.0);
    }

    #[test]
    fn no_data_at_all_is_an_error() {
        let err = run_backtest(
            EmaCrossIndexAlgorithm::default(),
            &MockDataPort::new(),
            &BacktestConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TraderError::NoData { .. }));
    }

    #[test]
    fn data_source_failure_propagates() {
        let port = spx_spy_port().with_error("SPY", "connection reset");
        let err = run_backtest(
            EmaCrossIndexAlgorithm::default(),
            &port,
            &BacktestConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TraderError::Data { reason } if reason == "connection reset"));
    }
}

mod non_tradable_index {
    use super::*;

    /// Tries to buy the index on every slice.
    struct IndexBuyer {
        index: Option<Symbol>,
    }

    impl Algorithm for IndexBuyer {
        fn name(&self) -> &str {
            "IndexBuyer"
        }

        fn initialize(&mut self, setup: &mut Setup) -> Result<(), TraderError> {
            setup.set_start_date(date(2021, 1, 4));
            setup.set_end_date(date(2021, 1, 4));
            setup.set_cash(1_000_000.0);
            self.index = Some(setup.add_index("SPX", Resolution::Minute)?);
            Ok(())
        }

        fn on_data(&mut self, ctx: &mut StepContext<'_>, _slice: &Slice) {
            if let Some(index) = &self.index {
                ctx.set_holdings(index, 1.0);
            }
        }

        fn on_end_of_algorithm(&mut self, portfolio: &Portfolio) -> Result<(), TraderError> {
            match &self.index {
                Some(index) if portfolio.total_sale_volume(index) > 0.0 => {
                    Err(TraderError::AlgorithmAssertion {
                        reason: "index is not tradable".into(),
                    })
                }
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn index_orders_are_invalid_and_never_fill() {
        let port = spx_spy_port();
        let result = run_backtest(IndexBuyer { index: None }, &port, &BacktestConfig::default())
            .unwrap();

        assert_eq!(result.slices_processed, MINUTES_PER_SESSION);
        assert_eq!(result.orders.len(), MINUTES_PER_SESSION);
        assert!(result
            .orders
            .iter()
            .all(|o| matches!(o.status, OrderStatus::Invalid { .. })));
        assert!(result.order_events.is_empty());
        assert_eq!(result.portfolio.total_sale_volume(&Symbol::index("SPX")), 0.0);
        assert_eq!(result.portfolio.cash, 1_000_000.0);
    }
}

mod per_step_rule {
    use super::*;
    use proptest::prelude::*;

    /// SMA over the first `period` values, then the recursive EMA.
    fn reference_ema(values: &[f64], period: usize) -> f64 {
        let k = 2.0 / (period as f64 + 1.0);
        let seed_len = values.len().min(period);
        let mut ema = values[..seed_len].iter().sum::<f64>() / seed_len as f64;
        for v in &values[seed_len..] {
            ema = v * k + ema * (1.0 - k);
        }
        ema
    }

    proptest! {
        #[test]
        fn at_most_one_request_matching_the_ema_comparison(
            closes in prop::collection::vec(50.0f64..5000.0, 1..80),
            fast in 1usize..12,
            slow in 1usize..12,
        ) {
            let params = EmaCrossParams { fast_period: fast, slow_period: slow, ..EmaCrossParams::default() };
            let mut session = Session::initialize(
                EmaCrossIndexAlgorithm::new(params),
                &BacktestConfig::default(),
            ).unwrap();

            let spx = Symbol::index("SPX");
            let spy = Symbol::equity("SPY");
            let times = session_minutes(&[date(2021, 1, 4)]);

            for (i, &close) in closes.iter().enumerate() {
                let slice = Slice::new(times[i])
                    .with_bar(make_bar(&spx, times[i], close))
                    .with_bar(make_bar(&spy, times[i], close / 10.0));
                let requests = session.step(&slice);

                if i + 1 < slow {
                    prop_assert!(requests.is_empty());
                    continue;
                }
                prop_assert_eq!(requests.len(), 1);

                let seen = &closes[..=i];
                let (f, s) = (reference_ema(seen, fast), reference_ema(seen, slow));
                if (f - s).abs() > 1e-6 * s {
                    let buy = matches!(requests[0], OrderRequest::SetHoldings { .. });
                    prop_assert_eq!(buy, f > s);
                }
                match &requests[0] {
                    OrderRequest::SetHoldings { targets, .. } => {
                        prop_assert_eq!(targets.len(), 1);
                        prop_assert_eq!(&targets[0].symbol, &spy);
                        prop_assert_eq!(targets[0].weight, 1.0);
                    }
                    OrderRequest::Liquidate { symbol } => {
                        prop_assert_eq!(symbol.as_ref(), Some(&spy));
                    }
                }
            }

            prop_assert_eq!(session.portfolio().total_sale_volume(&spx), 0.0);
        }

        #[test]
        fn missing_equity_bar_never_requests(
            closes in prop::collection::vec(50.0f64..5000.0, 1..40),
        ) {
            let params = EmaCrossParams { fast_period: 3, slow_period: 2, ..EmaCrossParams::default() };
            let mut session = Session::initialize(
                EmaCrossIndexAlgorithm::new(params),
                &BacktestConfig::default(),
            ).unwrap();
            let spx = Symbol::index("SPX");
            let times = session_minutes(&[date(2021, 1, 4)]);

            for (i, &close) in closes.iter().enumerate() {
                let slice = Slice::new(times[i]).with_bar(make_bar(&spx, times[i], close));
                prop_assert!(session.step(&slice).is_empty());
            }
        }
    }
}
