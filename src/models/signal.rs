//! Persistent trade signal entity and lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::decision::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "BUY",
            TradeDirection::Sell => "SELL",
        }
    }
}

impl TryFrom<Verdict> for TradeDirection {
    type Error = ();

    fn try_from(verdict: Verdict) -> Result<Self, Self::Error> {
        match verdict {
            Verdict::Buy => Ok(TradeDirection::Buy),
            Verdict::Sell => Ok(TradeDirection::Sell),
            Verdict::Wait => Err(()),
        }
    }
}

/// How the signal came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalOrigin {
    Direct,
    TriggerConversion,
}

impl SignalOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalOrigin::Direct => "direct",
            SignalOrigin::TriggerConversion => "trigger-conversion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Open,
    Breakeven,
    Closed,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Open => "OPEN",
            SignalStatus::Breakeven => "BREAKEVEN",
            SignalStatus::Closed => "CLOSED",
        }
    }

    /// OPEN and BREAKEVEN both describe a live position.
    pub fn is_live(&self) -> bool {
        !matches!(self, SignalStatus::Closed)
    }
}

impl std::str::FromStr for SignalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(SignalStatus::Open),
            "BREAKEVEN" => Ok(SignalStatus::Breakeven),
            "CLOSED" => Ok(SignalStatus::Closed),
            other => Err(format!("unknown signal status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalOutcome {
    Win,
    Loss,
    Breakeven,
}

impl SignalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalOutcome::Win => "WIN",
            SignalOutcome::Loss => "LOSS",
            SignalOutcome::Breakeven => "BREAKEVEN",
        }
    }
}

/// An accepted trade signal and its lifecycle.
///
/// Created only by successful validation; mutated later only to move the
/// stop to entry or to mark closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Option<i64>,
    pub symbol: String,
    pub direction: TradeDirection,
    pub entry: f64,
    /// Stop as validated at creation; never rewritten.
    pub original_stop: f64,
    /// Effective stop, rewritten once by the breakeven move.
    pub current_stop: f64,
    pub target: f64,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
    pub origin: SignalOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<i64>,
    pub status: SignalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakeven_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SignalOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_pips: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Signal {
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Distance from entry to the original stop, in price units.
    pub fn risk_distance(&self) -> f64 {
        (self.entry - self.original_stop).abs()
    }

    /// Price at which one full risk distance is banked and the stop may move
    /// to entry.
    pub fn breakeven_trigger_price(&self) -> f64 {
        match self.direction {
            TradeDirection::Buy => self.entry + self.risk_distance(),
            TradeDirection::Sell => self.entry - self.risk_distance(),
        }
    }
}
