//! Vision classifier client.
//!
//! The chart interpretation itself is an opaque external collaborator: we
//! send three rendered chart images plus the indicator context and get
//! back a decision JSON. This module owns the wire format, the bounded
//! timeout/retry policy and the defensive parsing of the response.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::decision::{Decision, TriggerCandidate, Verdict};
use crate::models::snapshot::MarketSnapshot;
use crate::models::trigger::Trigger;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned status {0}")]
    Status(u16),

    #[error("classifier response unparseable: {0}")]
    Parse(String),

    #[error("screenshot unreadable: {0}")]
    Screenshot(String),
}

impl ClassifierError {
    /// Connection problems and server-side errors are worth one more try;
    /// parse failures and client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ClassifierError::Http(e) => e.is_timeout() || e.is_connect(),
            ClassifierError::Status(code) => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

/// The three rendered chart images for one analysis cycle.
#[derive(Debug, Clone)]
pub struct ChartSet {
    pub h4: PathBuf,
    pub h1: PathBuf,
    pub m15: PathBuf,
}

/// Everything the classifier needs for a full multi-timeframe pass.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub charts: ChartSet,
    pub snapshot: MarketSnapshot,
}

#[async_trait]
pub trait DecisionClassifier: Send + Sync {
    /// Full multi-timeframe analysis from chart imagery plus indicators.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Decision, ClassifierError>;

    /// Lightweight re-analysis when a stored trigger fires: cached
    /// higher-timeframe context plus the current price, no chart images.
    async fn reanalyze_trigger(
        &self,
        trigger: &Trigger,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<Decision, ClassifierError>;
}

const SYSTEM_PROMPT: &str = r#"You are an expert forex trader analyzing multi-timeframe data for high-probability setups with clearly defined risk.

Rules:
1. H4 sets the trade bias, H1 identifies the entry zone, M15 times the entry.
2. Minimum risk/reward 1.5:1; stop beyond invalidation, target at the next structural level.
3. RSI above 75 is overbought, below 25 oversold; do not chase extended moves.
4. When the M15 trigger is missing, return WAIT and describe the exact condition to watch in next_trigger.

Return ONLY valid JSON:
{
  "decision": "BUY|SELL|WAIT",
  "entry": 1.08400, "sl": 1.08200, "tp": 1.08800,
  "reasoning": "...",
  "confidence": "High|Medium|Low",
  "confluence_factors": [], "risk_factors": [],
  "h4_analysis": {"trend": "UPTREND|DOWNTREND|RANGING", "trade_bias": "..."},
  "next_trigger": {
    "type": "level_break|retest_hold|range_edge_reject|ema_retouch|none",
    "timeframe": "M15|H1", "level": 1.08350,
    "direction": "bullish|bearish", "expiry_bars": 8,
    "description": "..."
  }
}
If decision is WAIT set entry/sl/tp to null and provide next_trigger; otherwise set next_trigger to null. The level must be an exact price."#;

/// HTTP-backed classifier speaking the messages API of the vision backend.
pub struct HttpVisionClassifier {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpVisionClassifier {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn post_messages(&self, body: &Value) -> Result<String, ClassifierError> {
        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let parsed: MessagesResponse = response.json().await?;
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| ClassifierError::Parse("no text block in response".into()))
    }

    async fn post_with_retry(&self, body: Value) -> Result<String, ClassifierError> {
        (|| async { self.post_messages(&body).await })
            .retry(ExponentialBuilder::default().with_max_times(2))
            .when(ClassifierError::is_transient)
            .notify(|err, dur| {
                warn!(error = %err, backoff_ms = dur.as_millis(), "retrying classifier call");
            })
            .await
    }

    async fn image_block(path: &Path) -> Result<Value, ClassifierError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClassifierError::Screenshot(format!("{}: {e}", path.display())))?;
        let media_type = match path.extension().and_then(|e| e.to_str()) {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            _ => "image/png",
        };
        Ok(json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": media_type,
                "data": base64::engine::general_purpose::STANDARD.encode(bytes),
            }
        }))
    }
}

#[async_trait]
impl DecisionClassifier for HttpVisionClassifier {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Decision, ClassifierError> {
        let snapshot = &request.snapshot;
        let user_text = format!(
            "Symbol: {}\nCurrent time: {}\nCurrent price: {}\n\nMarket context:\n{}\n\nIndicators:\n{}\n\nThe three images are the H4, H1 and M15 charts in that order. Perform top-down analysis and decide BUY / SELL / WAIT.",
            snapshot.symbol,
            snapshot.captured_at.format("%Y-%m-%d %H:%M UTC"),
            snapshot.price,
            serde_json::to_string_pretty(&snapshot.context).unwrap_or_default(),
            serde_json::to_string_pretty(&json!({
                "h4": snapshot.h4, "h1": snapshot.h1, "m15": snapshot.m15,
            }))
            .unwrap_or_default(),
        );

        let mut content = vec![json!({"type": "text", "text": user_text})];
        for path in [&request.charts.h4, &request.charts.h1, &request.charts.m15] {
            content.push(Self::image_block(path).await?);
        }

        let body = json!({
            "model": self.model,
            "max_tokens": 2000,
            "temperature": 0.3,
            "system": [{
                "type": "text",
                "text": SYSTEM_PROMPT,
                "cache_control": {"type": "ephemeral"},
            }],
            "messages": [{"role": "user", "content": content}],
        });

        let text = self.post_with_retry(body).await?;
        debug!(symbol = %snapshot.symbol, chars = text.len(), "classifier response received");
        parse_decision(&snapshot.symbol, &text)
    }

    async fn reanalyze_trigger(
        &self,
        trigger: &Trigger,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<Decision, ClassifierError> {
        let user_text = format!(
            "TRIGGER EVENT: the condition you previously specified has now happened.\n\
             Symbol: {}\nType: {}\nLevel: {}\nDirection: {:?}\nTimeframe: {}\n\
             Current price: {price}\nCurrent time: {}\n\n\
             Higher-timeframe context from the original analysis:\n{}\n\n\
             Re-evaluate: is this now a valid entry setup, or should we continue to WAIT?",
            trigger.symbol,
            trigger.kind.label(),
            trigger.level,
            trigger.direction,
            trigger.timeframe.label(),
            at.format("%Y-%m-%d %H:%M UTC"),
            trigger.context_note.as_deref().unwrap_or("(none cached)"),
        );

        let body = json!({
            "model": self.model,
            "max_tokens": 2000,
            "temperature": 0.3,
            "system": [{"type": "text", "text": SYSTEM_PROMPT}],
            "messages": [{"role": "user", "content": user_text}],
        });

        let text = self.post_with_retry(body).await?;
        parse_decision(&trigger.symbol, &text)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawH4Analysis {
    #[serde(default)]
    trend: Option<String>,
    #[serde(default)]
    trade_bias: Option<String>,
    #[serde(default)]
    key_levels: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    decision: Verdict,
    #[serde(default)]
    entry: Option<f64>,
    #[serde(default)]
    sl: Option<f64>,
    #[serde(default)]
    tp: Option<f64>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    confidence: Option<crate::models::decision::Confidence>,
    #[serde(default)]
    confluence_factors: Vec<String>,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    next_trigger: Option<Value>,
    #[serde(default)]
    h4_analysis: Option<RawH4Analysis>,
}

/// Strip markdown code fences around a JSON body, if present.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

fn parse_trigger_candidate(raw: Value) -> Option<TriggerCandidate> {
    let mut raw = raw;
    let obj = raw.as_object_mut()?;
    if obj.get("type").and_then(Value::as_str) == Some("none") {
        return None;
    }
    // Older prompt revisions answered above/below for level breaks.
    if let Some(direction) = obj.get_mut("direction") {
        match direction.as_str() {
            Some("above") => *direction = Value::String("bullish".into()),
            Some("below") => *direction = Value::String("bearish".into()),
            _ => {}
        }
    }
    serde_json::from_value(raw).ok()
}

/// Parse the classifier's JSON into a [`Decision`], demoting a BUY/SELL
/// that is missing any trade level to WAIT rather than failing.
pub fn parse_decision(symbol: &str, text: &str) -> Result<Decision, ClassifierError> {
    let cleaned = strip_fences(text);
    let raw: RawAnalysis =
        serde_json::from_str(cleaned).map_err(|e| ClassifierError::Parse(e.to_string()))?;

    let mut verdict = raw.decision;
    let mut reasoning = raw.reasoning;
    if verdict.is_trade() && (raw.entry.is_none() || raw.sl.is_none() || raw.tp.is_none()) {
        reasoning.push_str(" [demoted to WAIT: trade levels incomplete]");
        verdict = Verdict::Wait;
    }

    let higher_tf_note = raw.h4_analysis.map(|h4| {
        format!(
            "H4 trend: {}, bias: {}, key levels: {}",
            h4.trend.unwrap_or_else(|| "UNKNOWN".into()),
            h4.trade_bias.unwrap_or_else(|| "NONE".into()),
            serde_json::to_string(&h4.key_levels).unwrap_or_default(),
        )
    });

    let triggers = raw
        .next_trigger
        .and_then(parse_trigger_candidate)
        .into_iter()
        .collect();

    Ok(Decision {
        symbol: symbol.to_string(),
        verdict,
        entry: raw.entry,
        stop: raw.sl,
        target: raw.tp,
        reasoning,
        confidence: raw
            .confidence
            .unwrap_or(crate::models::decision::Confidence::Medium),
        confluence_factors: raw.confluence_factors,
        risk_factors: raw.risk_factors,
        triggers,
        higher_tf_note,
    })
}
