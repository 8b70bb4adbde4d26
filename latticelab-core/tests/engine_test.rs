//! Engine integration tests: order lifecycle through the event loop,
//! portfolio accounting, reader synchronisation, and event ordering.

use chrono::{DateTime, Duration, TimeZone, Utc};
use latticelab_core::events::{OrderAckEvent, OrderFillEvent};
use latticelab_core::{
    AssetId, Backtest, BacktestError, BacktestSettings, BarReader, CellValue, FieldId,
    FieldsCompletedEvent, MemoryReader, Order, OrderEvent, OrderId, ReaderBar, Strategy,
};
use latticelab_core::execution::OrderError;
use std::collections::HashMap;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 5, 3, 9, 30, 0).unwrap()
}

fn t(minutes: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(minutes)
}

fn bar(minute: i64, o: f64, h: f64, l: f64, c: f64) -> ReaderBar {
    let fields: HashMap<FieldId, CellValue> =
        [("open", o), ("high", h), ("low", l), ("close", c), ("volume", 1_000.0)]
            .into_iter()
            .map(|(name, value)| (FieldId::new(name), CellValue::Float64(value)))
            .collect();
    ReaderBar { datetime: t(minute), fields }
}

fn reader(bars: Vec<ReaderBar>) -> Box<dyn BarReader> {
    Box::new(MemoryReader::new(bars))
}

/// Minute bars and a window wide enough to process all of them.
fn settings(num_bars: i64) -> BacktestSettings {
    BacktestSettings::new(base_time(), t(num_bars + 1))
        .with_trading_interval(Duration::minutes(1))
        .with_seed(3)
}

/// Places one order at the first data event, then records everything that
/// comes back. Checks the accounting identity on every fill.
#[derive(Default)]
struct OrderOnce {
    to_place: Option<Order>,
    placed: Option<OrderId>,
    open_after_place: usize,
    acks: Vec<OrderAckEvent>,
    fills: Vec<OrderFillEvent>,
    observed: Vec<(u64, DateTime<Utc>)>,
}

impl OrderOnce {
    fn new(order: Order) -> Self {
        Self { to_place: Some(order), ..Self::default() }
    }
}

impl Strategy for OrderOnce {
    fn on_data(
        &mut self,
        backtest: &mut Backtest,
        event: &FieldsCompletedEvent,
    ) -> Result<(), BacktestError> {
        self.observed.push((backtest.bar_index(), event.time));
        if let Some(order) = self.to_place.take() {
            self.placed = Some(backtest.place_order(order)?);
            self.open_after_place = backtest.open_order_ids().count();
        }
        Ok(())
    }

    fn on_order(
        &mut self,
        backtest: &mut Backtest,
        event: &OrderEvent,
    ) -> Result<(), BacktestError> {
        self.observed.push((backtest.bar_index(), event.time()));
        match event {
            OrderEvent::Ack(ack) => self.acks.push(ack.clone()),
            OrderEvent::Fill(fill) => {
                let portfolio = backtest.portfolio();
                let closes = backtest
                    .lattice()
                    .data_field(0, &backtest.settings().columns.close)?;
                let held: f64 = portfolio
                    .equity
                    .iter()
                    .filter_map(|(asset, units)| {
                        closes.get(asset).and_then(CellValue::as_f64).map(|px| units * px)
                    })
                    .sum();
                let expected = portfolio.buying_power + held;
                assert!(
                    (portfolio.total_value - expected).abs() < 1e-9,
                    "total_value {} != buying_power {} + held {}",
                    portfolio.total_value,
                    portfolio.buying_power,
                    held
                );
                self.fills.push(fill.clone());
            }
        }
        Ok(())
    }
}

#[test]
fn limit_buy_fills_inside_the_bar() {
    // Bar OHLC (10, 12, 9, 11): a 9.5 buy ceiling is reachable and caps the
    // price below the open.
    let bars = vec![
        bar(0, 10.0, 12.0, 9.0, 11.0),
        bar(1, 11.0, 11.5, 10.5, 11.2),
        bar(2, 11.2, 11.6, 11.0, 11.4),
        bar(3, 11.4, 11.8, 11.1, 11.5),
    ];
    let mut backtest = Backtest::new(settings(4));
    backtest.add_reader("SPY", reader(bars)).unwrap();

    let mut strategy = OrderOnce::new(Order::limit("SPY", 1.0, 9.5));
    let report = backtest.run(&mut strategy).unwrap();

    assert_eq!(report.bars_processed, 4);
    assert!(strategy.placed.is_some());
    assert_eq!(strategy.open_after_place, 0, "a reachable limit fills on placement");
    assert_eq!(strategy.fills.len(), 1);
    let fill = &strategy.fills[0];
    assert_eq!(fill.price, 9.5);
    assert_eq!(fill.delta_cash, -9.5);
    assert_eq!(fill.delta_equity, 1.0);
    assert_eq!(strategy.acks.len(), 1);

    assert_eq!(report.portfolio.position(&AssetId::new("SPY")), 1.0);
    assert!((report.portfolio.buying_power - (100_000.0 - 9.5)).abs() < 1e-9);

    // The run report carries the same fill the callback saw.
    assert_eq!(report.fills, strategy.fills);

    // One mark per bar; the last marks the unit held at the final close.
    assert_eq!(report.equity_curve.len(), 4);
    let final_mark = *report.equity_curve.last().unwrap();
    assert!((final_mark - (100_000.0 - 9.5 + 11.5)).abs() < 1e-9);
}

#[test]
fn market_order_with_insufficient_buying_power_fails() {
    // Mid price is 10, principal only 5.
    let bars = vec![bar(0, 10.0, 11.0, 9.0, 10.0), bar(1, 10.0, 11.0, 9.0, 10.0)];
    let mut backtest = Backtest::new(settings(2).with_principal(5.0));
    backtest.add_reader("SPY", reader(bars)).unwrap();

    let mut strategy = OrderOnce::new(Order::market("SPY", 1.0));
    let err = backtest.run(&mut strategy).unwrap_err();
    assert!(matches!(
        err,
        BacktestError::Order(OrderError::InsufficientBuyingPower { .. })
    ));
}

#[test]
fn zero_size_orders_are_rejected_at_placement() {
    struct ZeroSize;
    impl Strategy for ZeroSize {
        fn on_data(
            &mut self,
            backtest: &mut Backtest,
            _event: &FieldsCompletedEvent,
        ) -> Result<(), BacktestError> {
            if backtest.bar_index() == 1 {
                let err = backtest.place_order(Order::market("SPY", 0.0)).unwrap_err();
                assert!(matches!(err, BacktestError::Order(OrderError::ZeroSizeOrder)));
            }
            Ok(())
        }
    }

    let bars = vec![bar(0, 10.0, 11.0, 9.0, 10.0), bar(1, 10.0, 11.0, 9.0, 10.0)];
    let mut backtest = Backtest::new(settings(2));
    backtest.add_reader("SPY", reader(bars)).unwrap();
    backtest.run(&mut ZeroSize).unwrap();
}

#[test]
fn desynchronised_readers_abort_the_run() {
    let spy = vec![bar(0, 10.0, 11.0, 9.0, 10.0), bar(1, 10.0, 11.0, 9.0, 10.0)];
    // Same first bar, then a 30-second drift.
    let mut qqq = vec![bar(0, 20.0, 21.0, 19.0, 20.0)];
    qqq.push(ReaderBar {
        datetime: t(1) + Duration::seconds(30),
        ..bar(1, 20.0, 21.0, 19.0, 20.0)
    });

    let mut backtest = Backtest::new(settings(3));
    backtest.add_reader("SPY", reader(spy)).unwrap();
    backtest.add_reader("QQQ", reader(qqq)).unwrap();

    let err = backtest.run(&mut latticelab_core::NullStrategy).unwrap_err();
    assert!(matches!(err, BacktestError::DesynchronisedReaders { .. }));
}

#[test]
fn unfilled_limit_carries_over_and_fills_on_a_later_bar() {
    // Sell floor 12.0: bar 1 tops out at 11, bar 2 reaches 12.
    let bars = vec![
        bar(0, 10.0, 11.0, 9.5, 10.5),
        bar(1, 11.5, 12.0, 11.0, 11.8),
        bar(2, 11.8, 12.2, 11.5, 12.0),
        bar(3, 12.0, 12.4, 11.8, 12.1),
    ];
    let mut backtest = Backtest::new(settings(4));
    backtest.add_reader("SPY", reader(bars)).unwrap();

    let mut strategy = OrderOnce::new(Order::limit("SPY", -1.0, 12.0));
    let report = backtest.run(&mut strategy).unwrap();

    assert_eq!(strategy.open_after_place, 1, "unreachable limit stays open");
    assert_eq!(strategy.fills.len(), 1);

    let fill = &strategy.fills[0];
    // max(open=11.5, extremum=12.0)
    assert_eq!(fill.price, 12.0);
    let latency = Duration::milliseconds(100);
    assert!(fill.time >= t(1) + latency, "fill at {} before bar 2 opens", fill.time);
    assert!(fill.time <= t(2) + latency, "fill at {} after bar 2 closes", fill.time);

    assert_eq!(report.portfolio.position(&AssetId::new("SPY")), -1.0);
    assert!((report.portfolio.buying_power - (100_000.0 + 12.0)).abs() < 1e-9);
}

#[test]
fn event_times_never_decrease_within_a_bar() {
    let bars = vec![
        bar(0, 10.0, 12.0, 9.0, 11.0),
        bar(1, 11.0, 11.5, 10.5, 11.2),
        bar(2, 11.2, 11.6, 11.0, 11.4),
    ];
    let mut backtest = Backtest::new(settings(3));
    backtest.add_reader("SPY", reader(bars)).unwrap();

    let mut strategy = OrderOnce::new(Order::limit("SPY", 1.0, 9.5));
    backtest.run(&mut strategy).unwrap();

    assert!(strategy.observed.len() >= 4);
    for pair in strategy.observed.windows(2) {
        let ((bar_a, time_a), (bar_b, time_b)) = (pair[0], pair[1]);
        if bar_a == bar_b {
            assert!(time_a <= time_b, "event at {time_b} overtook {time_a} in bar {bar_a}");
        }
    }
}

#[test]
fn a_run_without_readers_is_an_error() {
    let backtest = Backtest::new(settings(1));
    let err = backtest.run(&mut latticelab_core::NullStrategy).unwrap_err();
    assert!(matches!(err, BacktestError::EmptyDataReaders));
}

#[test]
fn duplicate_readers_are_rejected() {
    let mut backtest = Backtest::new(settings(1));
    backtest
        .add_reader("SPY", reader(vec![bar(0, 1.0, 1.0, 1.0, 1.0)]))
        .unwrap();
    let err = backtest
        .add_reader("SPY", reader(vec![bar(0, 1.0, 1.0, 1.0, 1.0)]))
        .unwrap_err();
    assert!(matches!(err, BacktestError::DuplicateReader { .. }));
}

#[test]
fn a_bar_straddling_the_end_time_is_still_processed() {
    let bars = vec![bar(0, 10.0, 11.0, 9.0, 10.0), bar(1, 10.0, 11.0, 9.0, 10.0)];
    // The second bar starts before the end time but its span reaches past it.
    let settings = BacktestSettings::new(base_time(), t(1) + Duration::seconds(30))
        .with_trading_interval(Duration::minutes(1));
    let mut backtest = Backtest::new(settings);
    backtest.add_reader("SPY", reader(bars)).unwrap();

    let report = backtest.run(&mut latticelab_core::NullStrategy).unwrap();
    assert_eq!(report.bars_processed, 2);
    assert_eq!(report.equity_curve.len(), 2);
}

#[test]
fn a_bar_starting_at_the_end_time_is_not_processed() {
    let bars = vec![
        bar(0, 10.0, 11.0, 9.0, 10.0),
        bar(1, 10.0, 11.0, 9.0, 10.0),
        bar(2, 10.0, 11.0, 9.0, 10.0),
    ];
    let settings = BacktestSettings::new(base_time(), t(2))
        .with_trading_interval(Duration::minutes(1));
    let mut backtest = Backtest::new(settings);
    backtest.add_reader("SPY", reader(bars)).unwrap();

    let report = backtest.run(&mut latticelab_core::NullStrategy).unwrap();
    assert_eq!(report.bars_processed, 2);
}

#[test]
fn run_stops_when_readers_exhaust_before_the_end_time() {
    let bars = vec![bar(0, 10.0, 11.0, 9.0, 10.0), bar(1, 10.0, 11.0, 9.0, 10.0)];
    // Window admits ten bars; the reader has two.
    let mut backtest = Backtest::new(settings(10));
    backtest.add_reader("SPY", reader(bars)).unwrap();

    let report = backtest.run(&mut latticelab_core::NullStrategy).unwrap();
    assert_eq!(report.bars_processed, 2);
    // No orders: the curve stays at the principal.
    assert_eq!(report.equity_curve, vec![100_000.0, 100_000.0]);
}

#[test]
fn user_fields_are_readable_from_callbacks() {
    struct ReadsSma {
        seen: Vec<CellValue>,
    }
    impl Strategy for ReadsSma {
        fn on_data(
            &mut self,
            backtest: &mut Backtest,
            _event: &FieldsCompletedEvent,
        ) -> Result<(), BacktestError> {
            let cell = backtest
                .lattice()
                .data_cell(0, &AssetId::new("SPY"), &FieldId::new("sma2-close"))?
                .clone();
            self.seen.push(cell);
            Ok(())
        }
    }

    let bars = vec![bar(0, 1.0, 1.0, 1.0, 10.0), bar(1, 1.0, 1.0, 1.0, 14.0)];
    let mut backtest = Backtest::new(settings(2));
    backtest.add_reader("SPY", reader(bars)).unwrap();
    backtest.add_field(latticelab_core::FieldOperation::sma("sma2-close", "close", 2));

    let mut strategy = ReadsSma { seen: Vec::new() };
    backtest.run(&mut strategy).unwrap();

    assert_eq!(strategy.seen, vec![CellValue::Float64(10.0), CellValue::Float64(12.0)]);
}
