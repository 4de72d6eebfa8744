//! Unit tests for trigger price-proximity evaluation

use chrono::{DateTime, Duration, TimeZone, Utc};
use pipwatch::models::decision::{TriggerDirection, TriggerKind};
use pipwatch::models::snapshot::Timeframe;
use pipwatch::models::trigger::{Trigger, TriggerStatus};
use pipwatch::triggers::eval::{poll, TriggerPoll};

fn trigger(kind: TriggerKind, level: f64, direction: TriggerDirection) -> Trigger {
    let created_at = Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap();
    Trigger {
        id: 1,
        symbol: "EURUSD".to_string(),
        kind,
        level,
        direction,
        timeframe: Timeframe::M15,
        description: String::new(),
        context_note: None,
        created_at,
        expires_at: created_at + Duration::minutes(120),
        status: TriggerStatus::Pending,
        fired_at: None,
        fire_reason: None,
        resolved_at: None,
    }
}

fn just_after_creation() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, 10, 2, 0).unwrap()
}

#[test]
fn level_break_bullish_fires_above_level() {
    let t = trigger(TriggerKind::LevelBreak, 1.1050, TriggerDirection::Bullish);
    assert!(matches!(
        poll(&t, 1.10505, just_after_creation()),
        TriggerPoll::Fired(_)
    ));
}

#[test]
fn level_break_bullish_stands_by_below_level() {
    let t = trigger(TriggerKind::LevelBreak, 1.1050, TriggerDirection::Bullish);
    assert_eq!(poll(&t, 1.1049, just_after_creation()), TriggerPoll::Standby);
    // Exactly at the level is not yet a break.
    assert_eq!(poll(&t, 1.1050, just_after_creation()), TriggerPoll::Standby);
}

#[test]
fn level_break_bearish_fires_below_level() {
    let t = trigger(TriggerKind::LevelBreak, 1.1050, TriggerDirection::Bearish);
    assert!(matches!(
        poll(&t, 1.1048, just_after_creation()),
        TriggerPoll::Fired(_)
    ));
    assert_eq!(poll(&t, 1.1052, just_after_creation()), TriggerPoll::Standby);
}

#[test]
fn retest_hold_requires_tolerance_and_holding_side() {
    let t = trigger(TriggerKind::RetestHold, 1.0835, TriggerDirection::Bullish);
    // Within half a pip above the level: holding.
    assert!(matches!(
        poll(&t, 1.08353, just_after_creation()),
        TriggerPoll::Fired(_)
    ));
    // Below the level: not holding for a bullish retest.
    assert_eq!(poll(&t, 1.08347, just_after_creation()), TriggerPoll::Standby);
    // Too far above: not a retest at all.
    assert_eq!(poll(&t, 1.0845, just_after_creation()), TriggerPoll::Standby);
}

#[test]
fn retest_hold_bearish_mirrors() {
    let t = trigger(TriggerKind::RetestHold, 1.0835, TriggerDirection::Bearish);
    assert!(matches!(
        poll(&t, 1.08347, just_after_creation()),
        TriggerPoll::Fired(_)
    ));
    assert_eq!(poll(&t, 1.08353, just_after_creation()), TriggerPoll::Standby);
}

#[test]
fn range_edge_reject_fires_at_boundary_either_side() {
    let t = trigger(TriggerKind::RangeEdgeReject, 1.0850, TriggerDirection::Bearish);
    assert!(matches!(
        poll(&t, 1.08504, just_after_creation()),
        TriggerPoll::Fired(_)
    ));
    assert!(matches!(
        poll(&t, 1.08496, just_after_creation()),
        TriggerPoll::Fired(_)
    ));
    assert_eq!(poll(&t, 1.0852, just_after_creation()), TriggerPoll::Standby);
}

#[test]
fn ema_retouch_uses_half_pip_tolerance() {
    let t = trigger(TriggerKind::EmaRetouch, 1.1000, TriggerDirection::Bullish);
    assert!(matches!(
        poll(&t, 1.10004, just_after_creation()),
        TriggerPoll::Fired(_)
    ));
    assert_eq!(poll(&t, 1.10006, just_after_creation()), TriggerPoll::Standby);
}

#[test]
fn gold_tolerance_is_wider_in_price_units() {
    let mut t = trigger(TriggerKind::EmaRetouch, 1950.0, TriggerDirection::Bullish);
    t.symbol = "XAUUSD".to_string();
    // Half a pip on gold is 0.05.
    assert!(matches!(
        poll(&t, 1950.04, just_after_creation()),
        TriggerPoll::Fired(_)
    ));
    assert_eq!(poll(&t, 1950.06, just_after_creation()), TriggerPoll::Standby);
}

#[test]
fn expires_exactly_at_budget_and_never_before() {
    let t = trigger(TriggerKind::LevelBreak, 1.1050, TriggerDirection::Bullish);
    let created = t.created_at;

    // One second before the 8-bar budget: still pending.
    let almost = created + Duration::minutes(120) - Duration::seconds(1);
    assert_eq!(poll(&t, 1.1049, almost), TriggerPoll::Standby);

    // Exactly at the budget: expired.
    let at_expiry = created + Duration::minutes(120);
    assert_eq!(poll(&t, 1.1049, at_expiry), TriggerPoll::Expired);
}

#[test]
fn expiry_wins_over_simultaneous_match() {
    let t = trigger(TriggerKind::LevelBreak, 1.1050, TriggerDirection::Bullish);
    let at_expiry = t.created_at + Duration::minutes(120);
    assert_eq!(poll(&t, 1.1100, at_expiry), TriggerPoll::Expired);
}
