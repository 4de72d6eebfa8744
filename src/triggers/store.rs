//! Trigger arena store and lifecycle transitions.
//!
//! Triggers live in an arena keyed by id with a secondary index on
//! (symbol, PENDING) that is unique by construction: inserting a new
//! pending trigger supersedes the symbol's previous one inside the same
//! write-lock critical section. All transitions go through this store;
//! callers never mutate a `Trigger` directly.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::db::Database;
use crate::models::decision::TriggerCandidate;
use crate::models::trigger::{Trigger, TriggerStatus};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TriggerError {
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("trigger {0} not found")]
    NotFound(i64),

    #[error("trigger {id} cannot move {from:?} -> {to:?}")]
    InvalidTransition {
        id: i64,
        from: TriggerStatus,
        to: TriggerStatus,
    },
}

/// Daily lifecycle counters, kept per calendar date.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TriggerDayStats {
    pub created: u64,
    pub fired: u64,
    pub expired: u64,
    pub converted: u64,
}

/// Aggregate view served by the telemetry endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerSummary {
    pub today: TriggerDayStats,
    pub pending: usize,
    pub status_breakdown: HashMap<String, usize>,
    pub conversion_rate: f64,
}

struct Inner {
    next_id: i64,
    triggers: HashMap<i64, Trigger>,
    /// symbol -> pending trigger id; at most one entry per symbol.
    pending: HashMap<String, i64>,
    daily: HashMap<NaiveDate, TriggerDayStats>,
}

impl Inner {
    fn stats_for(&mut self, date: NaiveDate) -> &mut TriggerDayStats {
        self.daily.entry(date).or_default()
    }
}

pub struct TriggerStore {
    inner: RwLock<Inner>,
    database: Option<Arc<Database>>,
}

impl TriggerStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                triggers: HashMap::new(),
                pending: HashMap::new(),
                daily: HashMap::new(),
            }),
            database: None,
        }
    }

    pub fn with_database(mut self, database: Arc<Database>) -> Self {
        self.database = Some(database);
        self
    }

    /// Seed the arena from persisted state at startup.
    pub async fn hydrate(&self, triggers: Vec<Trigger>) {
        let mut inner = self.inner.write().await;
        for trigger in triggers {
            if trigger.status == TriggerStatus::Pending {
                inner.pending.insert(trigger.symbol.clone(), trigger.id);
            }
            inner.next_id = inner.next_id.max(trigger.id + 1);
            inner.triggers.insert(trigger.id, trigger);
        }
    }

    /// Arm a new trigger from a classifier candidate.
    ///
    /// Supersede-then-insert is one atomic operation: any pending trigger
    /// for the symbol transitions to SUPERSEDED under the same lock that
    /// inserts the replacement. Returns the new trigger plus the superseded
    /// one when there was any.
    pub async fn create(
        &self,
        symbol: &str,
        candidate: &TriggerCandidate,
        context_note: Option<String>,
        default_expiry_bars: u32,
        now: DateTime<Utc>,
    ) -> Result<(Trigger, Option<Trigger>), TriggerError> {
        if !candidate.level.is_finite() || candidate.level <= 0.0 {
            return Err(TriggerError::InvalidTrigger(format!(
                "level {} is not a usable price",
                candidate.level
            )));
        }

        let (created, superseded) = {
            let mut inner = self.inner.write().await;

            let superseded = if let Some(old_id) = inner.pending.remove(symbol) {
                let old = inner
                    .triggers
                    .get_mut(&old_id)
                    .expect("pending index points at stored trigger");
                old.status = TriggerStatus::Superseded;
                old.resolved_at = Some(now);
                Some(old.clone())
            } else {
                None
            };

            let id = inner.next_id;
            inner.next_id += 1;
            let trigger = Trigger {
                id,
                symbol: symbol.to_string(),
                kind: candidate.kind,
                level: candidate.level,
                direction: candidate.direction,
                timeframe: candidate.timeframe,
                description: candidate.description.clone(),
                context_note,
                created_at: now,
                expires_at: Trigger::expiry_for(candidate, now, default_expiry_bars),
                status: TriggerStatus::Pending,
                fired_at: None,
                fire_reason: None,
                resolved_at: None,
            };
            inner.pending.insert(symbol.to_string(), id);
            inner.triggers.insert(id, trigger.clone());
            inner.stats_for(now.date_naive()).created += 1;

            (trigger, superseded)
        };

        if let Some(ref old) = superseded {
            self.mirror(old).await;
        }
        self.mirror(&created).await;

        Ok((created, superseded))
    }

    /// Supersede the symbol's pending trigger without inserting a new one.
    /// Used when a direct trade signal makes the watch moot.
    pub async fn supersede_pending(&self, symbol: &str, now: DateTime<Utc>) -> Option<Trigger> {
        let superseded = {
            let mut inner = self.inner.write().await;
            let id = inner.pending.remove(symbol)?;
            let trigger = inner
                .triggers
                .get_mut(&id)
                .expect("pending index points at stored trigger");
            trigger.status = TriggerStatus::Superseded;
            trigger.resolved_at = Some(now);
            Some(trigger.clone())
        }?;

        self.mirror(&superseded).await;
        Some(superseded)
    }

    /// PENDING -> EXPIRED, when the watcher observes `now >= expires_at`.
    pub async fn expire(&self, id: i64, now: DateTime<Utc>) -> Result<Trigger, TriggerError> {
        self.transition(id, TriggerStatus::Expired, now, None).await
    }

    /// PENDING -> FIRED, when the price condition matched.
    pub async fn fire(
        &self,
        id: i64,
        now: DateTime<Utc>,
        reason: String,
    ) -> Result<Trigger, TriggerError> {
        self.transition(id, TriggerStatus::Fired, now, Some(reason)).await
    }

    /// FIRED -> CONVERTED, after re-validation produced a signal.
    pub async fn complete_conversion(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Trigger, TriggerError> {
        self.transition(id, TriggerStatus::Converted, now, None).await
    }

    /// FIRED -> DISCARDED, when re-validation did not produce a signal.
    pub async fn discard(&self, id: i64, now: DateTime<Utc>) -> Result<Trigger, TriggerError> {
        self.transition(id, TriggerStatus::Discarded, now, None).await
    }

    pub async fn get(&self, id: i64) -> Option<Trigger> {
        self.inner.read().await.triggers.get(&id).cloned()
    }

    /// All PENDING triggers, oldest first.
    pub async fn pending(&self) -> Vec<Trigger> {
        let inner = self.inner.read().await;
        let mut pending: Vec<Trigger> = inner
            .pending
            .values()
            .filter_map(|id| inner.triggers.get(id).cloned())
            .collect();
        pending.sort_by_key(|t| t.created_at);
        pending
    }

    pub async fn pending_for(&self, symbol: &str) -> Option<Trigger> {
        let inner = self.inner.read().await;
        let id = inner.pending.get(symbol)?;
        inner.triggers.get(id).cloned()
    }

    pub async fn summary(&self, today: NaiveDate) -> TriggerSummary {
        let inner = self.inner.read().await;

        let mut status_breakdown: HashMap<String, usize> = HashMap::new();
        for trigger in inner.triggers.values() {
            *status_breakdown
                .entry(trigger.status.as_str().to_string())
                .or_default() += 1;
        }

        let converted = status_breakdown.get("CONVERTED").copied().unwrap_or(0);
        let discarded = status_breakdown.get("DISCARDED").copied().unwrap_or(0);
        let resolved = converted + discarded;
        let conversion_rate = if resolved > 0 {
            (converted as f64 / resolved as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        TriggerSummary {
            today: inner.daily.get(&today).copied().unwrap_or_default(),
            pending: inner.pending.len(),
            status_breakdown,
            conversion_rate,
        }
    }

    async fn transition(
        &self,
        id: i64,
        to: TriggerStatus,
        now: DateTime<Utc>,
        fire_reason: Option<String>,
    ) -> Result<Trigger, TriggerError> {
        let updated = {
            let mut inner = self.inner.write().await;
            let from = inner
                .triggers
                .get(&id)
                .ok_or(TriggerError::NotFound(id))?
                .status;

            let expected_from = match to {
                TriggerStatus::Expired | TriggerStatus::Fired => TriggerStatus::Pending,
                TriggerStatus::Converted | TriggerStatus::Discarded => TriggerStatus::Fired,
                _ => {
                    return Err(TriggerError::InvalidTransition { id, from, to });
                }
            };
            if from != expected_from {
                return Err(TriggerError::InvalidTransition { id, from, to });
            }

            let date = now.date_naive();
            match to {
                TriggerStatus::Expired => inner.stats_for(date).expired += 1,
                TriggerStatus::Fired => inner.stats_for(date).fired += 1,
                TriggerStatus::Converted => inner.stats_for(date).converted += 1,
                _ => {}
            }

            let trigger = inner
                .triggers
                .get_mut(&id)
                .expect("checked above");
            trigger.status = to;
            match to {
                TriggerStatus::Fired => {
                    trigger.fired_at = Some(now);
                    trigger.fire_reason = fire_reason;
                }
                _ => trigger.resolved_at = Some(now),
            }
            let updated = trigger.clone();
            if matches!(to, TriggerStatus::Expired | TriggerStatus::Fired) {
                inner.pending.remove(&updated.symbol);
            }
            updated
        };

        self.mirror(&updated).await;
        Ok(updated)
    }

    async fn mirror(&self, trigger: &Trigger) {
        if let Some(ref db) = self.database {
            if let Err(e) = db.upsert_trigger(trigger).await {
                warn!(trigger_id = trigger.id, error = %e, "trigger mirror write failed");
            }
        }
    }
}

impl Default for TriggerStore {
    fn default() -> Self {
        Self::new()
    }
}
