//! Prometheus metrics for HTTP traffic and lifecycle events.

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,

    pub triggers_created_total: IntCounter,
    pub triggers_fired_total: IntCounter,
    pub triggers_expired_total: IntCounter,
    pub triggers_superseded_total: IntCounter,
    pub triggers_converted_total: IntCounter,
    pub triggers_discarded_total: IntCounter,

    pub signals_recorded_total: IntCounter,
    pub signals_breakeven_total: IntCounter,
    pub signals_closed_total: IntCounter,
    pub validation_rejections_total: IntCounterVec,

    pub watcher_cycles_total: IntCounter,
    pub classifier_failures_total: IntCounter,
    pub database_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::with_opts(Opts::new("http_requests_total", "Total HTTP requests"))?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency",
        ))?;
        let http_requests_in_flight = IntGauge::with_opts(Opts::new(
            "http_requests_in_flight",
            "HTTP requests currently being served",
        ))?;

        let triggers_created_total =
            IntCounter::with_opts(Opts::new("triggers_created_total", "Triggers armed"))?;
        let triggers_fired_total =
            IntCounter::with_opts(Opts::new("triggers_fired_total", "Triggers fired"))?;
        let triggers_expired_total =
            IntCounter::with_opts(Opts::new("triggers_expired_total", "Triggers expired"))?;
        let triggers_superseded_total = IntCounter::with_opts(Opts::new(
            "triggers_superseded_total",
            "Triggers superseded by newer setups or direct signals",
        ))?;
        let triggers_converted_total = IntCounter::with_opts(Opts::new(
            "triggers_converted_total",
            "Fired triggers converted into signals",
        ))?;
        let triggers_discarded_total = IntCounter::with_opts(Opts::new(
            "triggers_discarded_total",
            "Fired triggers discarded after re-validation",
        ))?;

        let signals_recorded_total =
            IntCounter::with_opts(Opts::new("signals_recorded_total", "Signals recorded"))?;
        let signals_breakeven_total = IntCounter::with_opts(Opts::new(
            "signals_breakeven_total",
            "Signals moved to breakeven",
        ))?;
        let signals_closed_total =
            IntCounter::with_opts(Opts::new("signals_closed_total", "Signals closed"))?;
        let validation_rejections_total = IntCounterVec::new(
            Opts::new("validation_rejections_total", "Validation gate rejections"),
            &["reason"],
        )?;

        let watcher_cycles_total =
            IntCounter::with_opts(Opts::new("watcher_cycles_total", "Watcher cycles completed"))?;
        let classifier_failures_total = IntCounter::with_opts(Opts::new(
            "classifier_failures_total",
            "Classifier calls that errored or timed out",
        ))?;
        let database_connected = Gauge::with_opts(Opts::new(
            "database_connected",
            "1 when the persistence mirror is connected",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(triggers_created_total.clone()))?;
        registry.register(Box::new(triggers_fired_total.clone()))?;
        registry.register(Box::new(triggers_expired_total.clone()))?;
        registry.register(Box::new(triggers_superseded_total.clone()))?;
        registry.register(Box::new(triggers_converted_total.clone()))?;
        registry.register(Box::new(triggers_discarded_total.clone()))?;
        registry.register(Box::new(signals_recorded_total.clone()))?;
        registry.register(Box::new(signals_breakeven_total.clone()))?;
        registry.register(Box::new(signals_closed_total.clone()))?;
        registry.register(Box::new(validation_rejections_total.clone()))?;
        registry.register(Box::new(watcher_cycles_total.clone()))?;
        registry.register(Box::new(classifier_failures_total.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            triggers_created_total,
            triggers_fired_total,
            triggers_expired_total,
            triggers_superseded_total,
            triggers_converted_total,
            triggers_discarded_total,
            signals_recorded_total,
            signals_breakeven_total,
            signals_closed_total,
            validation_rejections_total,
            watcher_cycles_total,
            classifier_failures_total,
            database_connected,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics encoding: {e}")))
    }
}
