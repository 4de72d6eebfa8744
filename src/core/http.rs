//! HTTP endpoint server using Axum.

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

use crate::engine::{AnalysisEngine, AnalysisOutcome};
use crate::metrics::Metrics;
use crate::models::signal::{SignalOutcome, SignalStatus};
use crate::models::snapshot::{MarketContext, MarketSnapshot, TimeframeIndicators};
use crate::services::classifier::{AnalysisRequest, ChartSet, DecisionClassifier};
use crate::signals::ledger::{LedgerError, SignalLedger, SignalQuery};
use crate::triggers::store::TriggerStore;

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub engine: Arc<AnalysisEngine>,
    pub triggers: Arc<TriggerStore>,
    pub signals: Arc<SignalLedger>,
    pub classifier: Arc<dyn DecisionClassifier>,
    pub cooldown_minutes: i64,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let live_signals = state.signals.live().await.len();
    let pending_triggers = state.triggers.pending().await.len();
    Ok(Json(json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "pipwatch-trigger-engine",
        "live_signals": live_signals,
        "pending_triggers": pending_triggers,
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

/// Per-timeframe indicator readings plus the calculated-context inputs the
/// collector ships alongside the screenshots.
#[derive(Debug, Deserialize)]
struct IndicatorsPayload {
    current_price: f64,
    #[serde(default)]
    h4: TimeframeIndicators,
    #[serde(default)]
    h1: TimeframeIndicators,
    #[serde(default)]
    m15: TimeframeIndicators,
    #[serde(default)]
    h4_high_20: Option<f64>,
    #[serde(default)]
    h4_low_20: Option<f64>,
    #[serde(default)]
    price_change_20: f64,
    #[serde(default)]
    avg_price_change: f64,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    symbol: String,
    h4_screenshot: String,
    h1_screenshot: String,
    m15_screenshot: String,
    indicators: IndicatorsPayload,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Full analysis cycle: blocking checks, snapshot assembly, classifier,
/// then decision routing through the engine.
async fn analyze_multi_timeframe(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Value>, ApiError> {
    let symbol = request.symbol.clone();
    info!(symbol = %symbol, "multi-timeframe analysis requested for {}", symbol);

    // One live signal per symbol: refuse to even analyze while one runs.
    if let Some(active) = state.signals.live_for_symbol(&symbol).await {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({
                "error": "symbol already has a live signal",
                "decision": "WAIT",
                "active_signal": {
                    "id": active.id,
                    "direction": active.direction.as_str(),
                    "entry": active.entry,
                    "sl": active.current_stop,
                    "tp": active.target,
                },
            })),
        ));
    }

    // Post-trade cooldown.
    let now = Utc::now();
    if state.cooldown_minutes > 0 {
        if let Some(closed_at) = state.signals.last_closed_at(&symbol).await {
            if now - closed_at < Duration::minutes(state.cooldown_minutes) {
                return Err((
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": "symbol in post-trade cooldown",
                        "decision": "WAIT",
                    })),
                ));
            }
        }
    }

    let ind = request.indicators;
    let context = MarketContext::derive(
        &symbol,
        now,
        ind.current_price,
        ind.h4.atr.unwrap_or(0.0),
        ind.m15.atr.unwrap_or(0.0),
        ind.h4_high_20,
        ind.h4_low_20,
        ind.price_change_20,
        ind.avg_price_change,
    );
    let snapshot = MarketSnapshot {
        symbol: symbol.clone(),
        captured_at: now,
        price: ind.current_price,
        h4: ind.h4,
        h1: ind.h1,
        m15: ind.m15,
        context,
    };

    let analysis_request = AnalysisRequest {
        charts: ChartSet {
            h4: request.h4_screenshot.into(),
            h1: request.h1_screenshot.into(),
            m15: request.m15_screenshot.into(),
        },
        snapshot: snapshot.clone(),
    };

    let decision = state
        .classifier
        .analyze(&analysis_request)
        .await
        .map_err(|e| {
            error!(symbol = %symbol, error = %e, "classifier call failed");
            state.metrics.classifier_failures_total.inc();
            api_error(StatusCode::BAD_GATEWAY, format!("classifier failed: {e}"))
        })?;

    let outcome = state.engine.process(&decision, &snapshot).await;

    let mut body = serde_json::to_value(&decision)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    match outcome {
        AnalysisOutcome::Signal(signal) => {
            body["signal_id"] = json!(signal.id);
        }
        AnalysisOutcome::TriggerArmed(trigger) => {
            body["trigger_id"] = json!(trigger.id);
            body["trigger_expires_at"] = json!(trigger.expires_at);
        }
        AnalysisOutcome::Rejected(reason) => {
            body["original_decision"] = body["decision"].clone();
            body["decision"] = json!("WAIT");
            body["rejection_reason"] = json!(reason.to_string());
            body["filter_override"] = json!(true);
        }
        AnalysisOutcome::Wait => {}
    }

    Ok(Json(body))
}

async fn triggers_summary(State(state): State<AppState>) -> Json<Value> {
    let summary = state.triggers.summary(Utc::now().date_naive()).await;
    Json(json!(summary))
}

async fn triggers_pending(State(state): State<AppState>) -> Json<Value> {
    let pending: Vec<Value> = state
        .triggers
        .pending()
        .await
        .into_iter()
        .map(|t| {
            json!({
                "id": t.id,
                "symbol": t.symbol,
                "type": t.kind.label(),
                "level": t.level,
                "direction": t.direction,
                "created_at": t.created_at,
                "expires_at": t.expires_at,
            })
        })
        .collect();
    Json(json!({ "pending_triggers": pending }))
}

#[derive(Debug, Deserialize)]
struct SignalsListQuery {
    status: Option<String>,
    days: Option<i64>,
    limit: Option<usize>,
}

async fn list_signals(
    State(state): State<AppState>,
    Query(params): Query<SignalsListQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(SignalStatus::from_str)
        .transpose()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let query = SignalQuery {
        status,
        days: Some(params.days.unwrap_or(7)),
        limit: Some(params.limit.unwrap_or(50)),
    };
    let signals = state.signals.query(&query).await;

    Ok(Json(json!({
        "signals": signals,
        "total": signals.len(),
        "filters": {
            "status": params.status,
            "days": query.days,
            "limit": query.limit,
        },
    })))
}

async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state
        .signals
        .get(id)
        .await
        .map(|signal| Json(json!(signal)))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "signal not found"))
}

#[derive(Debug, Deserialize)]
struct CloseSignalRequest {
    result: SignalOutcome,
    exit_price: f64,
}

async fn close_signal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CloseSignalRequest>,
) -> Result<Json<Value>, ApiError> {
    let closed = state
        .signals
        .close(id, request.result, request.exit_price, Utc::now())
        .await
        .map_err(|e| match e {
            LedgerError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
            LedgerError::NotLive(_) => api_error(StatusCode::CONFLICT, e.to_string()),
            _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        })?;

    state.metrics.signals_closed_total.inc();
    Ok(Json(json!({
        "message": "signal closed",
        "signal_id": id,
        "result": request.result,
        "pnl_pips": closed.pnl_pips,
    })))
}

#[derive(Debug, Deserialize)]
struct PerformanceQuery {
    days: Option<i64>,
}

async fn get_performance(
    State(state): State<AppState>,
    Query(params): Query<PerformanceQuery>,
) -> Json<Value> {
    let report = state.signals.performance(params.days.unwrap_or(30)).await;
    Json(json!(report))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/analyze_multi_timeframe", post(analyze_multi_timeframe))
        .route("/triggers_summary", get(triggers_summary))
        .route("/triggers_pending", get(triggers_pending))
        .route("/signals", get(list_signals))
        .route("/signals/{id}", get(get_signal))
        .route("/signals/{id}/close", post(close_signal))
        .route("/performance", get(get_performance))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    axum::serve(listener, app).await?;

    Ok(())
}
