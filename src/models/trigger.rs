//! Persistent trigger entity and lifecycle states.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::decision::{TriggerCandidate, TriggerDirection, TriggerKind};
use crate::models::snapshot::Timeframe;

/// Lifecycle states of a conditional watch.
///
/// PENDING is the only non-terminal state besides FIRED, which resolves to
/// CONVERTED or DISCARDED within the same watcher cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerStatus {
    Pending,
    Fired,
    Expired,
    Superseded,
    Converted,
    Discarded,
}

impl TriggerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerStatus::Pending => "PENDING",
            TriggerStatus::Fired => "FIRED",
            TriggerStatus::Expired => "EXPIRED",
            TriggerStatus::Superseded => "SUPERSEDED",
            TriggerStatus::Converted => "CONVERTED",
            TriggerStatus::Discarded => "DISCARDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TriggerStatus::Pending | TriggerStatus::Fired)
    }
}

impl std::str::FromStr for TriggerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TriggerStatus::Pending),
            "FIRED" => Ok(TriggerStatus::Fired),
            "EXPIRED" => Ok(TriggerStatus::Expired),
            "SUPERSEDED" => Ok(TriggerStatus::Superseded),
            "CONVERTED" => Ok(TriggerStatus::Converted),
            "DISCARDED" => Ok(TriggerStatus::Discarded),
            other => Err(format!("unknown trigger status: {other}")),
        }
    }
}

/// A persisted conditional watch for a price condition.
///
/// Mutated only through the trigger store's transition API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: i64,
    pub symbol: String,
    pub kind: TriggerKind,
    pub level: f64,
    pub direction: TriggerDirection,
    pub timeframe: Timeframe,
    pub description: String,
    /// Higher-timeframe context cached from the analysis that armed this
    /// trigger, handed back to the classifier when the trigger fires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: TriggerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fired_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fire_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Trigger {
    /// Expiry instant for a candidate armed at `created_at`: `expiry_bars`
    /// bars of the candidate's timeframe, falling back to `default_bars`.
    pub fn expiry_for(
        candidate: &TriggerCandidate,
        created_at: DateTime<Utc>,
        default_bars: u32,
    ) -> DateTime<Utc> {
        let bars = candidate.expiry_bars.unwrap_or(default_bars).max(1);
        let minutes = candidate.timeframe.minutes() * i64::from(bars);
        created_at + Duration::minutes(minutes)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
