//! Classifier decision models.

use serde::{Deserialize, Serialize};

use crate::models::snapshot::Timeframe;

/// Directional verdict returned by the vision classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Buy,
    Sell,
    Wait,
}

impl Verdict {
    pub fn is_trade(&self) -> bool {
        matches!(self, Verdict::Buy | Verdict::Sell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Conditional-setup kinds the classifier may propose alongside a WAIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    LevelBreak,
    RetestHold,
    RangeEdgeReject,
    EmaRetouch,
}

impl TriggerKind {
    pub fn label(&self) -> &'static str {
        match self {
            TriggerKind::LevelBreak => "level_break",
            TriggerKind::RetestHold => "retest_hold",
            TriggerKind::RangeEdgeReject => "range_edge_reject",
            TriggerKind::EmaRetouch => "ema_retouch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerDirection {
    Bullish,
    Bearish,
}

fn default_timeframe() -> Timeframe {
    Timeframe::M15
}

/// A price condition to watch while the decision stays WAIT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCandidate {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    pub level: f64,
    pub direction: TriggerDirection,
    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,
    /// Bars of `timeframe` before the watch expires; the configured default
    /// applies when the classifier leaves this out.
    #[serde(default)]
    pub expiry_bars: Option<u32>,
    #[serde(default)]
    pub description: String,
}

/// Transient output of the classifier: verdict, proposed levels, rationale
/// and zero or more trigger candidates when it cannot commit now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    #[serde(rename = "decision")]
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<f64>,
    #[serde(rename = "sl", skip_serializing_if = "Option::is_none")]
    pub stop: Option<f64>,
    #[serde(rename = "tp", skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    pub reasoning: String,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub confluence_factors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub risk_factors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub triggers: Vec<TriggerCandidate>,
    /// Higher-timeframe read, cached on armed triggers so a later firing can
    /// re-analyze without a full chart pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub higher_tf_note: Option<String>,
}

impl Decision {
    /// A WAIT decision with a rationale and nothing else.
    pub fn wait(symbol: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            verdict: Verdict::Wait,
            entry: None,
            stop: None,
            target: None,
            reasoning: reasoning.into(),
            confidence: Confidence::Low,
            confluence_factors: Vec::new(),
            risk_factors: Vec::new(),
            triggers: Vec::new(),
            higher_tf_note: None,
        }
    }

    /// Entry, stop and target together, when all three are present.
    pub fn levels(&self) -> Option<(f64, f64, f64)> {
        match (self.entry, self.stop, self.target) {
            (Some(entry), Some(stop), Some(target)) => Some((entry, stop, target)),
            _ => None,
        }
    }
}
