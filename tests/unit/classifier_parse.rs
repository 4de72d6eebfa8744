//! Unit tests for classifier response parsing

use pipwatch::models::decision::{TriggerDirection, TriggerKind, Verdict};
use pipwatch::services::classifier::{parse_decision, ClassifierError};

#[test]
fn parses_plain_buy_decision() {
    let text = r#"{
        "decision": "BUY",
        "entry": 1.0840, "sl": 1.0820, "tp": 1.0880,
        "reasoning": "pullback complete",
        "confidence": "High",
        "confluence_factors": ["H4 uptrend"],
        "risk_factors": [],
        "next_trigger": null
    }"#;

    let decision = parse_decision("EURUSD", text).expect("parse");
    assert_eq!(decision.verdict, Verdict::Buy);
    assert_eq!(decision.levels(), Some((1.0840, 1.0820, 1.0880)));
    assert_eq!(decision.symbol, "EURUSD");
    assert!(decision.triggers.is_empty());
}

#[test]
fn strips_markdown_code_fences() {
    let text = "```json\n{\"decision\": \"WAIT\", \"reasoning\": \"mid-range\"}\n```";
    let decision = parse_decision("EURUSD", text).expect("parse");
    assert_eq!(decision.verdict, Verdict::Wait);
}

#[test]
fn trade_without_complete_levels_demotes_to_wait() {
    let text = r#"{"decision": "SELL", "entry": 1.0840, "sl": null, "tp": 1.0800, "reasoning": "short"}"#;
    let decision = parse_decision("EURUSD", text).expect("parse");
    assert_eq!(decision.verdict, Verdict::Wait);
    assert!(decision.reasoning.contains("demoted"));
}

#[test]
fn wait_with_trigger_candidate() {
    let text = r#"{
        "decision": "WAIT",
        "reasoning": "waiting for retest",
        "next_trigger": {
            "type": "retest_hold",
            "timeframe": "M15",
            "level": 1.0835,
            "direction": "bullish",
            "expiry_bars": 8,
            "description": "retest 1.0835 and hold"
        },
        "h4_analysis": {"trend": "UPTREND", "trade_bias": "LONG_ONLY"}
    }"#;

    let decision = parse_decision("EURUSD", text).expect("parse");
    assert_eq!(decision.verdict, Verdict::Wait);
    assert_eq!(decision.triggers.len(), 1);
    let candidate = &decision.triggers[0];
    assert_eq!(candidate.kind, TriggerKind::RetestHold);
    assert_eq!(candidate.level, 1.0835);
    assert_eq!(candidate.direction, TriggerDirection::Bullish);
    assert_eq!(candidate.expiry_bars, Some(8));
    assert!(decision.higher_tf_note.as_deref().unwrap().contains("UPTREND"));
}

#[test]
fn trigger_type_none_yields_no_candidate() {
    let text = r#"{
        "decision": "WAIT",
        "reasoning": "setup fundamentally flawed",
        "next_trigger": {"type": "none"}
    }"#;
    let decision = parse_decision("EURUSD", text).expect("parse");
    assert!(decision.triggers.is_empty());
}

#[test]
fn legacy_above_below_directions_are_mapped() {
    let text = r#"{
        "decision": "WAIT",
        "reasoning": "watch the breakout",
        "next_trigger": {"type": "level_break", "level": 1.0860, "direction": "above"}
    }"#;
    let decision = parse_decision("EURUSD", text).expect("parse");
    assert_eq!(decision.triggers[0].direction, TriggerDirection::Bullish);
}

#[test]
fn malformed_trigger_is_dropped_not_fatal() {
    let text = r#"{
        "decision": "WAIT",
        "reasoning": "watching",
        "next_trigger": {"type": "level_break", "direction": "bullish"}
    }"#;
    let decision = parse_decision("EURUSD", text).expect("parse");
    assert!(decision.triggers.is_empty(), "level-less trigger dropped");
}

#[test]
fn invalid_json_is_a_parse_error() {
    let result = parse_decision("EURUSD", "the market looks bullish to me");
    assert!(matches!(result, Err(ClassifierError::Parse(_))));
}
