//! Pipwatch server
//!
//! Runs the full service in one process: the HTTP analysis surface, the
//! trigger watcher and the position monitor, sharing one trigger store and
//! one signal ledger.

use dotenvy::dotenv;
use pipwatch::config::Config;
use pipwatch::core::http::{serve, AppState, HealthStatus};
use pipwatch::core::runtime::WorkerRuntime;
use pipwatch::db::Database;
use pipwatch::engine::AnalysisEngine;
use pipwatch::logging;
use pipwatch::metrics::Metrics;
use pipwatch::services::calendar::EventWindowCache;
use pipwatch::services::classifier::{DecisionClassifier, HttpVisionClassifier};
use pipwatch::services::notifier::TelegramNotifier;
use pipwatch::services::price_feed::{FilePriceFeed, PriceFeed};
use pipwatch::signals::ledger::SignalLedger;
use pipwatch::signals::monitor::MonitorContext;
use pipwatch::triggers::store::TriggerStore;
use pipwatch::triggers::watcher::WatcherContext;
use pipwatch::validation::ValidationEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();
    logging::init_logging();

    let config = Config::from_env()?;
    let env = pipwatch::config::get_environment();
    info!("Starting Pipwatch Server");
    info!(environment = %env, "Environment");

    let metrics = Arc::new(Metrics::new()?);

    // Persistence mirror is optional; the service runs fully in-memory
    // without it.
    let database = match config.database_url {
        Some(ref url) => match Database::new(url).await {
            Ok(db) => {
                info!("database connected");
                metrics.database_connected.set(1.0);
                Some(Arc::new(db))
            }
            Err(e) => {
                warn!(error = %e, "database unavailable, continuing in-memory only");
                None
            }
        },
        None => None,
    };

    let mut triggers = TriggerStore::new();
    let mut signals = SignalLedger::new();
    if let Some(ref db) = database {
        triggers = triggers.with_database(db.clone());
        signals = signals.with_database(db.clone());
    }
    let triggers = Arc::new(triggers);
    let signals = Arc::new(signals);

    if let Some(ref db) = database {
        match db.load_triggers().await {
            Ok(persisted) => {
                info!(count = persisted.len(), "hydrating {} persisted trigger(s)", persisted.len());
                triggers.hydrate(persisted).await;
            }
            Err(e) => warn!(error = %e, "trigger hydration failed"),
        }
        match db.load_signals().await {
            Ok(persisted) => {
                info!(count = persisted.len(), "hydrating {} persisted signal(s)", persisted.len());
                signals.hydrate(persisted).await;
            }
            Err(e) => warn!(error = %e, "signal hydration failed"),
        }
    }

    let classifier: Arc<dyn DecisionClassifier> = Arc::new(HttpVisionClassifier::new(
        config.classifier.api_url.clone(),
        config.classifier.api_key.clone(),
        config.classifier.model.clone(),
        Duration::from_secs(config.classifier.timeout_seconds),
    )?);
    info!(model = %config.classifier.model, "classifier backend configured");

    let prices: Arc<dyn PriceFeed> = Arc::new(FilePriceFeed::new(
        config.feed.path.clone(),
        Duration::from_secs(config.feed.max_age_seconds),
    ));

    let notifier = config
        .telegram
        .as_ref()
        .map(|t| Arc::new(TelegramNotifier::new(t.token.clone(), t.chat_id.clone())));
    if notifier.is_none() {
        info!("telegram notifications disabled (no credentials)");
    }

    let calendar = Arc::new(EventWindowCache::new(chrono::Duration::minutes(
        config.event_cache_ttl_minutes,
    )));

    let validator = Arc::new(ValidationEngine::new(
        config.validation.clone(),
        signals.clone(),
    ));

    let mut engine = AnalysisEngine::new(
        triggers.clone(),
        signals.clone(),
        validator.clone(),
        config.default_expiry_bars,
    )
    .with_metrics(metrics.clone());
    if let Some(ref n) = notifier {
        engine = engine.with_notifier(n.clone());
    }
    let engine = Arc::new(engine);

    let watcher_ctx = Arc::new(WatcherContext {
        triggers: triggers.clone(),
        signals: signals.clone(),
        validator: validator.clone(),
        classifier: classifier.clone(),
        prices: prices.clone(),
        calendar: calendar.clone(),
        notifier: notifier.clone(),
        metrics: Some(metrics.clone()),
        window_start_hour: config.validation.window_start_hour,
        window_end_hour: config.validation.window_end_hour,
    });
    let monitor_ctx = Arc::new(MonitorContext {
        signals: signals.clone(),
        prices: prices.clone(),
        notifier: notifier.clone(),
        metrics: Some(metrics.clone()),
    });

    let runtime = WorkerRuntime::new(
        watcher_ctx,
        monitor_ctx,
        config.watcher_poll_seconds,
        config.monitor_poll_seconds,
    );
    let worker_handles = runtime
        .start_workers()
        .await
        .map_err(|e| format!("failed to start workers: {e}"))?;

    let state = AppState {
        health: Arc::new(RwLock::new(HealthStatus::default())),
        metrics: metrics.clone(),
        start_time: Arc::new(Instant::now()),
        engine,
        triggers,
        signals,
        classifier,
        cooldown_minutes: config.cooldown_minutes,
    };

    let port = config.port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = serve(state, port).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    if let Some(ref n) = notifier {
        n.send("\u{1F680} Pipwatch server started - trigger engine ready")
            .await;
    }

    info!("server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("shutting down...");
            for handle in worker_handles {
                handle.abort();
            }
            info!("workers stopped");
        }
        _ = server_handle => {
            tracing::error!("HTTP server stopped unexpectedly");
        }
    }

    Ok(())
}
