//! Unit tests for the position monitor

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pipwatch::models::signal::{
    Signal, SignalOrigin, SignalOutcome, SignalStatus, TradeDirection,
};
use pipwatch::services::price_feed::{PriceFeed, PriceFeedError};
use pipwatch::signals::ledger::SignalLedger;
use pipwatch::signals::monitor::{run_cycle, MonitorContext};

struct StaticPriceFeed(HashMap<String, f64>);

impl StaticPriceFeed {
    fn with(symbol: &str, price: f64) -> Arc<Self> {
        let mut prices = HashMap::new();
        prices.insert(symbol.to_string(), price);
        Arc::new(Self(prices))
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn latest_price(&self, symbol: &str) -> Result<f64, PriceFeedError> {
        self.0
            .get(symbol)
            .copied()
            .ok_or_else(|| PriceFeedError::UnknownSymbol(symbol.to_string()))
    }
}

fn buy_draft() -> Signal {
    Signal {
        id: None,
        symbol: "EURUSD".to_string(),
        direction: TradeDirection::Buy,
        entry: 1.1000,
        original_stop: 1.0950,
        current_stop: 1.0950,
        target: 1.1100,
        reasoning: String::new(),
        created_at: Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap(),
        origin: SignalOrigin::Direct,
        trigger_id: None,
        status: SignalStatus::Open,
        breakeven_at: None,
        outcome: None,
        exit_price: None,
        pnl_pips: None,
        closed_at: None,
    }
}

fn context(ledger: Arc<SignalLedger>, prices: Arc<dyn PriceFeed>) -> MonitorContext {
    MonitorContext {
        signals: ledger,
        prices,
        notifier: None,
        metrics: None,
    }
}

#[tokio::test]
async fn price_below_breakeven_point_changes_nothing() {
    let ledger = Arc::new(SignalLedger::new());
    let signal = ledger.record(buy_draft()).await.expect("record");
    let ctx = context(ledger.clone(), StaticPriceFeed::with("EURUSD", 1.1020));

    run_cycle(&ctx, Utc::now()).await;

    let after = ledger.get(signal.id.unwrap()).await.expect("stored");
    assert_eq!(after.status, SignalStatus::Open);
    assert_eq!(after.current_stop, 1.0950);
}

#[tokio::test]
async fn one_risk_distance_in_profit_moves_stop_to_entry() {
    let ledger = Arc::new(SignalLedger::new());
    let signal = ledger.record(buy_draft()).await.expect("record");
    // Risk is 50 pips; one full risk in profit is 1.1050.
    let ctx = context(ledger.clone(), StaticPriceFeed::with("EURUSD", 1.1051));

    run_cycle(&ctx, Utc::now()).await;

    let after = ledger.get(signal.id.unwrap()).await.expect("stored");
    assert_eq!(after.status, SignalStatus::Breakeven);
    assert_eq!(after.current_stop, after.entry);
    assert!(after.breakeven_at.is_some());
}

#[tokio::test]
async fn target_hit_closes_as_win() {
    let ledger = Arc::new(SignalLedger::new());
    let signal = ledger.record(buy_draft()).await.expect("record");
    let ctx = context(ledger.clone(), StaticPriceFeed::with("EURUSD", 1.1101));

    run_cycle(&ctx, Utc::now()).await;

    let after = ledger.get(signal.id.unwrap()).await.expect("stored");
    assert_eq!(after.status, SignalStatus::Closed);
    assert_eq!(after.outcome, Some(SignalOutcome::Win));
    assert_eq!(after.exit_price, Some(1.1100));
    assert_eq!(after.pnl_pips, Some(100.0));
}

#[tokio::test]
async fn stop_hit_closes_as_loss() {
    let ledger = Arc::new(SignalLedger::new());
    let signal = ledger.record(buy_draft()).await.expect("record");
    let ctx = context(ledger.clone(), StaticPriceFeed::with("EURUSD", 1.0949));

    run_cycle(&ctx, Utc::now()).await;

    let after = ledger.get(signal.id.unwrap()).await.expect("stored");
    assert_eq!(after.outcome, Some(SignalOutcome::Loss));
    assert_eq!(after.exit_price, Some(1.0950));
    assert_eq!(after.pnl_pips, Some(-50.0));
}

#[tokio::test]
async fn stop_hit_after_breakeven_closes_flat() {
    let ledger = Arc::new(SignalLedger::new());
    let signal = ledger.record(buy_draft()).await.expect("record");
    let id = signal.id.unwrap();
    ledger.move_to_breakeven(id, Utc::now()).await.expect("breakeven");

    // Price falls back to entry, which is now the stop.
    let ctx = context(ledger.clone(), StaticPriceFeed::with("EURUSD", 1.0999));
    run_cycle(&ctx, Utc::now()).await;

    let after = ledger.get(id).await.expect("stored");
    assert_eq!(after.outcome, Some(SignalOutcome::Breakeven));
    assert_eq!(after.exit_price, Some(1.1000));
    assert_eq!(after.pnl_pips, Some(0.0));
}

#[tokio::test]
async fn sell_signal_mirrors_exit_logic() {
    let ledger = Arc::new(SignalLedger::new());
    let mut draft = buy_draft();
    draft.direction = TradeDirection::Sell;
    draft.original_stop = 1.1050;
    draft.current_stop = 1.1050;
    draft.target = 1.0900;
    let signal = ledger.record(draft).await.expect("record");

    let ctx = context(ledger.clone(), StaticPriceFeed::with("EURUSD", 1.0899));
    run_cycle(&ctx, Utc::now()).await;

    let after = ledger.get(signal.id.unwrap()).await.expect("stored");
    assert_eq!(after.outcome, Some(SignalOutcome::Win));
    assert_eq!(after.pnl_pips, Some(100.0));
}

#[tokio::test]
async fn missing_price_skips_the_signal_for_the_cycle() {
    let ledger = Arc::new(SignalLedger::new());
    let signal = ledger.record(buy_draft()).await.expect("record");
    let ctx = context(ledger.clone(), StaticPriceFeed::with("GBPUSD", 1.2650));

    run_cycle(&ctx, Utc::now()).await;

    let after = ledger.get(signal.id.unwrap()).await.expect("stored");
    assert_eq!(after.status, SignalStatus::Open, "no state mutation without a price");
}
