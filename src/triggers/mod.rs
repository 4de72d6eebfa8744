//! Trigger store, state machine and background watcher.

pub mod eval;
pub mod store;
pub mod watcher;

pub use eval::{poll, TriggerPoll};
pub use store::{TriggerDayStats, TriggerError, TriggerStore, TriggerSummary};
pub use watcher::{poll_pending_triggers, WatcherContext, WatcherTick};
