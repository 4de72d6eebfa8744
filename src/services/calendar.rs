//! High-impact economic event windows.
//!
//! An explicitly owned, time-stamped cache rather than ambient process
//! state: the owner installs upcoming windows on a bounded schedule and
//! the watcher asks it whether firing is currently blacked out. An empty
//! or stale cache never blocks trading, it only loses the guard.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// One scheduled event with its blackout interval.
#[derive(Debug, Clone)]
pub struct EventWindow {
    pub label: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

struct CacheState {
    refreshed_at: Option<DateTime<Utc>>,
    windows: Vec<EventWindow>,
}

pub struct EventWindowCache {
    state: RwLock<CacheState>,
    ttl: Duration,
}

impl EventWindowCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState {
                refreshed_at: None,
                windows: Vec::new(),
            }),
            ttl,
        }
    }

    /// Replace the cached windows, stamping the refresh time.
    pub async fn install(&self, windows: Vec<EventWindow>, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.windows = windows;
        state.refreshed_at = Some(now);
    }

    /// Whether the cache is past its refresh budget.
    pub async fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.read().await;
        match state.refreshed_at {
            Some(refreshed) => now - refreshed > self.ttl,
            None => true,
        }
    }

    /// Whether `now` falls inside any cached blackout window.
    pub async fn in_blackout(&self, now: DateTime<Utc>) -> Option<String> {
        let state = self.state.read().await;
        state
            .windows
            .iter()
            .find(|w| now >= w.starts_at && now < w.ends_at)
            .map(|w| w.label.clone())
    }
}
