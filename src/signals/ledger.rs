//! Append-and-update store of accepted trade signals.
//!
//! The ledger exclusively owns `Signal` entities. Callers mutate them only
//! through `record`, `move_to_breakeven` and `close`; the duplicate gate
//! reads the live set from here. An optional database mirrors every
//! mutation for durability, the in-memory arena stays authoritative.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::db::Database;
use crate::models::signal::{Signal, SignalOutcome, SignalStatus};
use crate::models::symbol::trade_pips;
use crate::signals::performance::PerformanceReport;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    /// A second live signal for the symbol was rejected, not merged.
    #[error("live signal already exists for {symbol}")]
    DuplicateOpen { symbol: String },

    #[error("signal {0} not found")]
    NotFound(i64),

    #[error("signal {0} is not live")]
    NotLive(i64),

    #[error("signal {0} is not in OPEN state")]
    NotOpen(i64),
}

/// Filter for history queries.
#[derive(Debug, Clone, Default)]
pub struct SignalQuery {
    pub status: Option<SignalStatus>,
    pub days: Option<i64>,
    pub limit: Option<usize>,
}

struct Inner {
    next_id: i64,
    signals: HashMap<i64, Signal>,
    /// symbol -> live signal id, unique by construction.
    live: HashMap<String, i64>,
}

pub struct SignalLedger {
    inner: RwLock<Inner>,
    database: Option<Arc<Database>>,
}

impl SignalLedger {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                signals: HashMap::new(),
                live: HashMap::new(),
            }),
            database: None,
        }
    }

    pub fn with_database(mut self, database: Arc<Database>) -> Self {
        self.database = Some(database);
        self
    }

    /// Seed the arena from persisted state at startup.
    pub async fn hydrate(&self, signals: Vec<Signal>) {
        let mut inner = self.inner.write().await;
        for signal in signals {
            let Some(id) = signal.id else { continue };
            if signal.is_live() {
                inner.live.insert(signal.symbol.clone(), id);
            }
            inner.next_id = inner.next_id.max(id + 1);
            inner.signals.insert(id, signal);
        }
    }

    /// Persist a validated signal, assigning its id.
    ///
    /// Rejects when the symbol already carries a live signal; the ledger is
    /// the authority on that invariant even when the caller pre-checked.
    pub async fn record(&self, mut signal: Signal) -> Result<Signal, LedgerError> {
        let recorded = {
            let mut inner = self.inner.write().await;
            if inner.live.contains_key(&signal.symbol) {
                return Err(LedgerError::DuplicateOpen {
                    symbol: signal.symbol.clone(),
                });
            }
            let id = inner.next_id;
            inner.next_id += 1;
            signal.id = Some(id);
            inner.live.insert(signal.symbol.clone(), id);
            inner.signals.insert(id, signal.clone());
            signal
        };

        if let Some(ref db) = self.database {
            if let Err(e) = db.insert_signal(&recorded).await {
                warn!(signal_id = recorded.id, error = %e, "signal mirror write failed");
            }
        }

        Ok(recorded)
    }

    /// Move the stop to entry once unrealized profit covers the risk.
    ///
    /// Rewrites only the current stop, status and breakeven timestamp.
    pub async fn move_to_breakeven(&self, id: i64, at: DateTime<Utc>) -> Result<Signal, LedgerError> {
        let updated = {
            let mut inner = self.inner.write().await;
            let signal = inner.signals.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
            if signal.status != SignalStatus::Open {
                return Err(LedgerError::NotOpen(id));
            }
            signal.current_stop = signal.entry;
            signal.status = SignalStatus::Breakeven;
            signal.breakeven_at = Some(at);
            signal.clone()
        };

        self.mirror_update(&updated).await;
        Ok(updated)
    }

    /// Close a live signal with its outcome and exit price.
    pub async fn close(
        &self,
        id: i64,
        outcome: SignalOutcome,
        exit_price: f64,
        at: DateTime<Utc>,
    ) -> Result<Signal, LedgerError> {
        let updated = {
            let mut inner = self.inner.write().await;
            let signal = inner.signals.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
            if !signal.is_live() {
                return Err(LedgerError::NotLive(id));
            }
            signal.status = SignalStatus::Closed;
            signal.outcome = Some(outcome);
            signal.exit_price = Some(exit_price);
            signal.pnl_pips = Some(trade_pips(
                &signal.symbol,
                signal.direction,
                signal.entry,
                exit_price,
            ));
            signal.closed_at = Some(at);
            let updated = signal.clone();
            inner.live.remove(&updated.symbol);
            updated
        };

        self.mirror_update(&updated).await;
        Ok(updated)
    }

    pub async fn get(&self, id: i64) -> Option<Signal> {
        self.inner.read().await.signals.get(&id).cloned()
    }

    /// The live signal for a symbol, if any.
    pub async fn live_for_symbol(&self, symbol: &str) -> Option<Signal> {
        let inner = self.inner.read().await;
        let id = inner.live.get(symbol)?;
        inner.signals.get(id).cloned()
    }

    pub async fn live(&self) -> Vec<Signal> {
        let inner = self.inner.read().await;
        let mut signals: Vec<Signal> = inner
            .live
            .values()
            .filter_map(|id| inner.signals.get(id).cloned())
            .collect();
        signals.sort_by_key(|s| s.id);
        signals
    }

    /// When the symbol's most recent signal closed, for the cooldown check.
    pub async fn last_closed_at(&self, symbol: &str) -> Option<DateTime<Utc>> {
        let inner = self.inner.read().await;
        inner
            .signals
            .values()
            .filter(|s| s.symbol == symbol && s.status == SignalStatus::Closed)
            .filter_map(|s| s.closed_at)
            .max()
    }

    /// History query, newest first.
    pub async fn query(&self, query: &SignalQuery) -> Vec<Signal> {
        let inner = self.inner.read().await;
        let cutoff = query.days.map(|d| Utc::now() - Duration::days(d));

        let mut matches: Vec<Signal> = inner
            .signals
            .values()
            .filter(|s| query.status.map_or(true, |status| s.status == status))
            .filter(|s| cutoff.map_or(true, |c| s.created_at > c))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        matches
    }

    /// Performance aggregation over closed signals in the window.
    pub async fn performance(&self, days: i64) -> PerformanceReport {
        let closed = self
            .query(&SignalQuery {
                status: Some(SignalStatus::Closed),
                days: Some(days),
                limit: None,
            })
            .await;
        PerformanceReport::from_closed(&closed, days)
    }

    async fn mirror_update(&self, signal: &Signal) {
        if let Some(ref db) = self.database {
            if let Err(e) = db.update_signal(signal).await {
                warn!(signal_id = signal.id, error = %e, "signal mirror update failed");
            }
        }
    }
}

impl Default for SignalLedger {
    fn default() -> Self {
        Self::new()
    }
}
