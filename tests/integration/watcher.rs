//! Integration test: trigger armed over HTTP fires, converts, and shows up
//! in telemetry

#[path = "test_utils.rs"]
mod test_utils;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pipwatch::models::decision::{
    Confidence, Decision, TriggerCandidate, TriggerDirection, TriggerKind, Verdict,
};
use pipwatch::models::snapshot::Timeframe;
use pipwatch::services::calendar::EventWindowCache;
use pipwatch::services::price_feed::{PriceFeed, PriceFeedError};
use pipwatch::triggers::watcher::{run_cycle, WatcherContext};
use serde_json::{json, Value};

use test_utils::TestApiServer;

struct StaticPriceFeed(HashMap<String, f64>);

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn latest_price(&self, symbol: &str) -> Result<f64, PriceFeedError> {
        self.0
            .get(symbol)
            .copied()
            .ok_or_else(|| PriceFeedError::UnknownSymbol(symbol.to_string()))
    }
}

#[tokio::test]
async fn armed_trigger_fires_converts_and_reports() {
    let app = TestApiServer::new().await;

    // Arm a level-break watch through the analysis endpoint.
    let mut wait = Decision::wait("EURUSD", "waiting for the breakout");
    wait.triggers = vec![TriggerCandidate {
        kind: TriggerKind::LevelBreak,
        level: 1.1050,
        direction: TriggerDirection::Bullish,
        timeframe: Timeframe::M15,
        expiry_bars: Some(8),
        description: "break above 1.1050".to_string(),
    }];
    app.classifier.reply_with(wait);

    let response = app
        .server
        .post("/analyze_multi_timeframe")
        .json(&json!({
            "symbol": "EURUSD",
            "h4_screenshot": "/tmp/h4.png",
            "h1_screenshot": "/tmp/h1.png",
            "m15_screenshot": "/tmp/m15.png",
            "indicators": {"current_price": 1.1040},
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let trigger_id = response.json::<Value>()["trigger_id"].as_i64().expect("armed");

    // Price moves within half a pip above the level; the re-analysis
    // commits to the trade.
    app.classifier.reply_with(Decision {
        symbol: "EURUSD".to_string(),
        verdict: Verdict::Buy,
        entry: Some(1.1050),
        stop: Some(1.1000),
        target: Some(1.1130),
        reasoning: "breakout confirmed".to_string(),
        confidence: Confidence::High,
        confluence_factors: vec![],
        risk_factors: vec![],
        triggers: vec![],
        higher_tf_note: None,
    });

    let mut prices = HashMap::new();
    prices.insert("EURUSD".to_string(), 1.10505);
    let ctx = WatcherContext {
        triggers: app.triggers.clone(),
        signals: app.signals.clone(),
        validator: app.validator.clone(),
        classifier: app.classifier.clone(),
        prices: Arc::new(StaticPriceFeed(prices)),
        calendar: Arc::new(EventWindowCache::new(chrono::Duration::minutes(60))),
        notifier: None,
        metrics: Some(app.metrics.clone()),
        window_start_hour: 0,
        window_end_hour: 24,
    };
    run_cycle(&ctx, Utc::now()).await;

    // Telemetry shows one fired, one converted.
    let summary: Value = app.server.get("/triggers_summary").await.json();
    assert_eq!(summary["today"]["fired"], 1);
    assert_eq!(summary["today"]["converted"], 1);
    assert_eq!(summary["pending"], 0);
    assert_eq!(summary["conversion_rate"], 100.0);

    // The converted signal is live and linked back to the trigger.
    let signals: Value = app.server.get("/signals?status=OPEN").await.json();
    assert_eq!(signals["total"], 1);
    assert_eq!(signals["signals"][0]["origin"], "trigger-conversion");
    assert_eq!(signals["signals"][0]["trigger_id"].as_i64(), Some(trigger_id));

    // And further analysis for the symbol now conflicts.
    let blocked = app
        .server
        .post("/analyze_multi_timeframe")
        .json(&json!({
            "symbol": "EURUSD",
            "h4_screenshot": "/tmp/h4.png",
            "h1_screenshot": "/tmp/h1.png",
            "m15_screenshot": "/tmp/m15.png",
            "indicators": {"current_price": 1.1051},
        }))
        .await;
    assert_eq!(blocked.status_code(), 409);
}
