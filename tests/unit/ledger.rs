//! Unit tests for the signal ledger

use chrono::{Duration, TimeZone, Utc};
use pipwatch::models::signal::{
    Signal, SignalOrigin, SignalOutcome, SignalStatus, TradeDirection,
};
use pipwatch::signals::ledger::{LedgerError, SignalLedger, SignalQuery};

fn draft(symbol: &str) -> Signal {
    Signal {
        id: None,
        symbol: symbol.to_string(),
        direction: TradeDirection::Buy,
        entry: 1.1000,
        original_stop: 1.0950,
        current_stop: 1.0950,
        target: 1.1080,
        reasoning: "test".to_string(),
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

#[tokio::test]
async fn record_assigns_ids_in_sequence() {
    let ledger = SignalLedger::new();
    let first = ledger.record(draft("EURUSD")).await.expect("record");
    let second = ledger.record(draft("GBPUSD")).await.expect("record");
    assert_eq!(first.id, Some(1));
    assert_eq!(second.id, Some(2));
}

#[tokio::test]
async fn second_live_signal_for_symbol_is_rejected() {
    let ledger = SignalLedger::new();
    ledger.record(draft("EURUSD")).await.expect("first");
    let result = ledger.record(draft("EURUSD")).await;
    assert!(matches!(
        result,
        Err(LedgerError::DuplicateOpen { ref symbol }) if symbol == "EURUSD"
    ));
}

#[tokio::test]
async fn breakeven_signal_still_blocks_new_records() {
    let ledger = SignalLedger::new();
    let signal = ledger.record(draft("EURUSD")).await.expect("record");
    ledger
        .move_to_breakeven(signal.id.unwrap(), Utc::now())
        .await
        .expect("breakeven");

    assert!(matches!(
        ledger.record(draft("EURUSD")).await,
        Err(LedgerError::DuplicateOpen { .. })
    ));
}

#[tokio::test]
async fn breakeven_rewrites_only_stop_and_status() {
    let ledger = SignalLedger::new();
    let signal = ledger.record(draft("EURUSD")).await.expect("record");
    let at = signal.created_at + Duration::minutes(30);

    let updated = ledger
        .move_to_breakeven(signal.id.unwrap(), at)
        .await
        .expect("breakeven");

    assert_eq!(updated.status, SignalStatus::Breakeven);
    assert_eq!(updated.current_stop, updated.entry);
    assert_eq!(updated.breakeven_at, Some(at));
    // Identity and levels untouched.
    assert_eq!(updated.entry, signal.entry);
    assert_eq!(updated.original_stop, signal.original_stop);
    assert_eq!(updated.target, signal.target);
    assert_eq!(updated.id, signal.id);
}

#[tokio::test]
async fn breakeven_cannot_be_applied_twice() {
    let ledger = SignalLedger::new();
    let signal = ledger.record(draft("EURUSD")).await.expect("record");
    let id = signal.id.unwrap();
    ledger.move_to_breakeven(id, Utc::now()).await.expect("first move");
    assert!(matches!(
        ledger.move_to_breakeven(id, Utc::now()).await,
        Err(LedgerError::NotOpen(_))
    ));
}

#[tokio::test]
async fn close_computes_pips_and_frees_the_symbol() {
    let ledger = SignalLedger::new();
    let signal = ledger.record(draft("EURUSD")).await.expect("record");
    let id = signal.id.unwrap();
    let at = signal.created_at + Duration::minutes(90);

    let closed = ledger
        .close(id, SignalOutcome::Win, 1.1080, at)
        .await
        .expect("close");
    assert_eq!(closed.status, SignalStatus::Closed);
    assert_eq!(closed.outcome, Some(SignalOutcome::Win));
    assert_eq!(closed.exit_price, Some(1.1080));
    assert_eq!(closed.pnl_pips, Some(80.0));
    assert_eq!(closed.closed_at, Some(at));

    assert!(ledger.live_for_symbol("EURUSD").await.is_none());
    // The symbol is free for a new signal again.
    assert!(ledger.record(draft("EURUSD")).await.is_ok());
}

#[tokio::test]
async fn close_is_refused_for_closed_or_unknown_signals() {
    let ledger = SignalLedger::new();
    let signal = ledger.record(draft("EURUSD")).await.expect("record");
    let id = signal.id.unwrap();
    ledger.close(id, SignalOutcome::Loss, 1.0950, Utc::now()).await.expect("close");

    assert!(matches!(
        ledger.close(id, SignalOutcome::Win, 1.1080, Utc::now()).await,
        Err(LedgerError::NotLive(_))
    ));
    assert!(matches!(
        ledger.close(42, SignalOutcome::Win, 1.1080, Utc::now()).await,
        Err(LedgerError::NotFound(42))
    ));
}

#[tokio::test]
async fn last_closed_at_tracks_most_recent_exit() {
    let ledger = SignalLedger::new();
    assert!(ledger.last_closed_at("EURUSD").await.is_none());

    let signal = ledger.record(draft("EURUSD")).await.expect("record");
    let at = signal.created_at + Duration::minutes(45);
    ledger
        .close(signal.id.unwrap(), SignalOutcome::Win, 1.1080, at)
        .await
        .expect("close");

    assert_eq!(ledger.last_closed_at("EURUSD").await, Some(at));
}

#[tokio::test]
async fn query_filters_by_status_and_limit() {
    let ledger = SignalLedger::new();
    let a = ledger.record(draft("EURUSD")).await.expect("a");
    let _b = ledger.record(draft("GBPUSD")).await.expect("b");
    ledger
        .close(a.id.unwrap(), SignalOutcome::Loss, 1.0950, Utc::now())
        .await
        .expect("close");

    let open = ledger
        .query(&SignalQuery {
            status: Some(SignalStatus::Open),
            days: None,
            limit: None,
        })
        .await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].symbol, "GBPUSD");

    let closed = ledger
        .query(&SignalQuery {
            status: Some(SignalStatus::Closed),
            days: None,
            limit: None,
        })
        .await;
    assert_eq!(closed.len(), 1);

    let limited = ledger
        .query(&SignalQuery {
            status: None,
            days: None,
            limit: Some(1),
        })
        .await;
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn hydrate_restores_live_index() {
    let ledger = SignalLedger::new();
    let live = ledger.record(draft("EURUSD")).await.expect("record");

    let restored = SignalLedger::new();
    restored.hydrate(vec![live.clone()]).await;
    assert_eq!(
        restored.live_for_symbol("EURUSD").await.and_then(|s| s.id),
        live.id
    );
    assert!(matches!(
        restored.record(draft("EURUSD")).await,
        Err(LedgerError::DuplicateOpen { .. })
    ));
}
