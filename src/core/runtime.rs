//! Worker assembly for the recurring background jobs.
//!
//! Two cron-driven workers share the stores with the request path: the
//! trigger watcher (default 2 minutes) and the position monitor (default
//! 60 seconds). Each runs on its own handle so shutdown can stop them
//! without touching the HTTP server.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::*;
use apalis_cron::CronStream;
use cron::Schedule;
use tracing::info;

use crate::signals::monitor::{check_live_signals, MonitorContext};
use crate::triggers::watcher::{poll_pending_triggers, WatcherContext};

/// Convert a seconds interval into a six-field cron expression.
fn cron_expr(interval_seconds: u64) -> String {
    if interval_seconds >= 60 {
        format!("0 */{} * * * *", interval_seconds / 60)
    } else {
        format!("*/{interval_seconds} * * * * *")
    }
}

fn schedule_for(interval_seconds: u64) -> Result<Schedule, Box<dyn std::error::Error + Send + Sync>> {
    if interval_seconds == 0 {
        return Err("worker interval must be > 0 seconds".into());
    }
    let expr = cron_expr(interval_seconds);
    Schedule::from_str(&expr).map_err(|e| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid cron expression '{expr}': {e}"),
        )) as Box<dyn std::error::Error + Send + Sync>
    })
}

/// Builds and runs the background workers.
pub struct WorkerRuntime {
    watcher: Arc<WatcherContext>,
    monitor: Arc<MonitorContext>,
    watcher_poll_seconds: u64,
    monitor_poll_seconds: u64,
}

impl WorkerRuntime {
    pub fn new(
        watcher: Arc<WatcherContext>,
        monitor: Arc<MonitorContext>,
        watcher_poll_seconds: u64,
        monitor_poll_seconds: u64,
    ) -> Self {
        Self {
            watcher,
            monitor,
            watcher_poll_seconds,
            monitor_poll_seconds,
        }
    }

    /// Start both workers and return handles for graceful shutdown.
    pub async fn start_workers(
        &self,
    ) -> Result<Vec<tokio::task::JoinHandle<()>>, Box<dyn std::error::Error + Send + Sync>> {
        let mut handles = Vec::new();

        let watcher_schedule = schedule_for(self.watcher_poll_seconds)?;
        let watcher_ctx = self.watcher.clone();
        info!(
            interval = self.watcher_poll_seconds,
            "starting trigger watcher (every {}s)", self.watcher_poll_seconds
        );
        handles.push(tokio::spawn(async move {
            let worker = WorkerBuilder::new("trigger-watcher")
                .data(watcher_ctx)
                .backend(CronStream::new(watcher_schedule))
                .build_fn(poll_pending_triggers);
            worker.run().await;
        }));

        let monitor_schedule = schedule_for(self.monitor_poll_seconds)?;
        let monitor_ctx = self.monitor.clone();
        info!(
            interval = self.monitor_poll_seconds,
            "starting position monitor (every {}s)", self.monitor_poll_seconds
        );
        handles.push(tokio::spawn(async move {
            let worker = WorkerBuilder::new("position-monitor")
                .data(monitor_ctx)
                .backend(CronStream::new(monitor_schedule))
                .build_fn(check_live_signals);
            worker.run().await;
        }));

        info!("background workers started");
        Ok(handles)
    }
}
