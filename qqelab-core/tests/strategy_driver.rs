//! Strategy driver integration: worked example, live queue path.

use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};
use qqelab_core::{
    AccountSnapshot, Bar, BarOutcome, DriverConfig, Fill, IndicatorValues, OrderAck, OrderError,
    OrderQueue, OrderRequest, OrderRouter, OrderSide, OrderSubmitter, PositionState,
    QueuedRouter, RunMode, SignalEvaluator, StrategyDriver,
};

fn bars(closes: &[f64]) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: base + Duration::minutes(15 * i as i64),
            symbol: "RVNUSDT".into(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        })
        .collect()
}

fn driver_config(mode: RunMode, amount: f64) -> DriverConfig {
    DriverConfig {
        mode,
        symbol: "RVNUSDT".into(),
        percent_sizer: 0.01,
        commission_pct: 0.0,
        amount,
        exchange: "mimic".into(),
        account: "binance_rvn".into(),
        asset: "RVN/USDT".into(),
    }
}

/// Indicator series scripted so that bar 1 enters and bar 2 exits.
fn scripted(evaluator: &SignalEvaluator) -> IndicatorValues {
    let k = evaluator.keys().clone();
    let mut iv = IndicatorValues::new();
    iv.insert(k.volume_short, vec![1.0; 3]);
    iv.insert(k.volume_long, vec![1.0; 3]);
    iv.insert(k.volume_osc, vec![10.0, 5.0, 8.0]);
    iv.insert(k.rsi, vec![60.0; 3]);
    iv.insert(k.atr, vec![2.0; 3]);
    iv.insert(k.dar, vec![1.0; 3]);
    iv.insert(k.qqe, vec![61.0; 3]);
    iv.insert(k.hma, vec![5.0, 5.0, 50.0]);
    iv.insert(k.ema, vec![10.0; 3]);
    iv
}

#[test]
fn worked_example_average_11_profit_16() {
    let t = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
    let mut pos = PositionState::new();
    pos.open_entry(10.0, 2.0, 0, t);
    pos.open_entry(12.0, 2.0, 1, t);
    assert_eq!(pos.average_entry_price(), Some(11.0));
    let summary = pos.close_cycle(15.0, 2, t).unwrap();
    assert_eq!(summary.total_size, 4.0);
    assert_eq!(summary.profit, 16.0);
    assert_eq!(pos.total_profit(), 16.0);
}

struct CountingRouter {
    actions: Vec<(usize, OrderSide)>,
}

impl OrderRouter for CountingRouter {
    fn submit(
        &mut self,
        request: &OrderRequest,
        bar_index: usize,
        bar: &Bar,
    ) -> Result<OrderAck, OrderError> {
        self.actions.push((bar_index, request.side));
        Ok(OrderAck::Filled(Fill {
            bar_index,
            timestamp: bar.timestamp,
            symbol: request.symbol.clone(),
            side: request.side,
            price: bar.close,
            quantity: request.size.unwrap_or(0.0),
            commission: 0.0,
        }))
    }

    fn account(&self, _mark_price: f64) -> AccountSnapshot {
        AccountSnapshot {
            cash: Some(1000.0),
            value: Some(1000.0),
        }
    }
}

#[test]
fn at_most_one_action_per_bar() {
    let bars = bars(&[10.0, 10.0, 20.0]);
    let evaluator = SignalEvaluator::default();
    let iv = scripted(&evaluator);
    let mut driver = StrategyDriver::new(driver_config(RunMode::Backtest, 0.0), evaluator);
    let mut router = CountingRouter { actions: Vec::new() };
    for t in 0..bars.len() {
        driver.on_bar(&bars, t, &iv, &mut router).unwrap();
    }
    assert_eq!(router.actions, vec![(1, OrderSide::Buy), (2, OrderSide::Sell)]);
    assert_eq!(driver.position().trade_cycles(), 1);
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<OrderRequest>>>,
}

impl OrderSubmitter for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn submit(&mut self, order: &OrderRequest) -> Result<(), OrderError> {
        self.seen.lock().unwrap().push(order.clone());
        Ok(())
    }
}

#[test]
fn live_orders_flow_through_queue_in_order() {
    let bars = bars(&[10.0, 10.0, 20.0]);
    let evaluator = SignalEvaluator::default();
    let iv = scripted(&evaluator);
    let mut driver = StrategyDriver::new(driver_config(RunMode::Live, 11.0), evaluator);

    let recorder = Recorder::default();
    let seen = recorder.seen.clone();
    let mut router = QueuedRouter::new(OrderQueue::spawn(recorder, 4).unwrap());

    let mut outcomes = Vec::new();
    for t in 0..bars.len() {
        outcomes.push(driver.on_bar(&bars, t, &iv, &mut router).unwrap());
    }
    assert!(matches!(outcomes[1], BarOutcome::Entered { size, .. } if size == 11.0));
    let BarOutcome::Exited(summary) = &outcomes[2] else {
        panic!("expected exit on bar 2");
    };
    assert_eq!(summary.profit, 110.0);

    let snapshot = driver.finish(&router, Some(20.0));
    assert_eq!(snapshot, AccountSnapshot::default());
    assert_eq!(router.shutdown().into_result(), Ok(2));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].side, OrderSide::Buy);
    assert_eq!(seen[0].size, Some(11.0));
    assert_eq!(seen[1].side, OrderSide::Sell);
    assert!(seen[1].is_close_all());
}
