//! Background watcher that re-prices pending triggers.
//!
//! One recurring job on a fixed cron cadence, independent of the primary
//! analysis cadence. Each cycle is idempotent: with no price movement and
//! no expiry crossing, pending triggers come out exactly as they went in.
//! A missing price skips that symbol for the cycle; nothing in here is
//! allowed to kill the loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use apalis::prelude::*;
use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, error, info, warn};

use crate::metrics::Metrics;
use crate::models::signal::SignalOrigin;
use crate::models::snapshot::{MarketContext, MarketSnapshot, TimeframeIndicators};
use crate::models::trigger::Trigger;
use crate::services::calendar::EventWindowCache;
use crate::services::classifier::DecisionClassifier;
use crate::services::notifier::TelegramNotifier;
use crate::services::price_feed::PriceFeed;
use crate::signals::ledger::SignalLedger;
use crate::triggers::eval::{poll, TriggerPoll};
use crate::triggers::store::TriggerStore;
use crate::validation::{TradeCandidate, ValidationEngine};

/// Cron tick for the trigger watcher worker.
#[derive(Debug, Clone, Default)]
pub struct WatcherTick(pub DateTime<Utc>);

impl From<DateTime<Utc>> for WatcherTick {
    fn from(t: DateTime<Utc>) -> Self {
        Self(t)
    }
}

/// Shared dependencies handed to the watcher job via the worker data layer.
pub struct WatcherContext {
    pub triggers: Arc<TriggerStore>,
    pub signals: Arc<SignalLedger>,
    pub validator: Arc<ValidationEngine>,
    pub classifier: Arc<dyn DecisionClassifier>,
    pub prices: Arc<dyn PriceFeed>,
    pub calendar: Arc<EventWindowCache>,
    pub notifier: Option<Arc<TelegramNotifier>>,
    pub metrics: Option<Arc<Metrics>>,
    pub window_start_hour: u32,
    pub window_end_hour: u32,
}

impl WatcherContext {
    fn in_trading_window(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        hour >= self.window_start_hour && hour < self.window_end_hour
    }
}

/// Cron job entry point.
pub async fn poll_pending_triggers(
    tick: WatcherTick,
    ctx: Data<Arc<WatcherContext>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    run_cycle(&ctx, tick.0).await;
    Ok(())
}

/// One watcher cycle: fetch pending triggers, one price per symbol, apply
/// the transition function, convert anything that fired.
pub async fn run_cycle(ctx: &WatcherContext, now: DateTime<Utc>) {
    let pending = ctx.triggers.pending().await;

    if !pending.is_empty() {
        debug!(
            count = pending.len(),
            "watcher: evaluating {} pending trigger(s)",
            pending.len()
        );

        let mut by_symbol: BTreeMap<String, Vec<Trigger>> = BTreeMap::new();
        for trigger in pending {
            by_symbol.entry(trigger.symbol.clone()).or_default().push(trigger);
        }

        for (symbol, triggers) in by_symbol {
            let price = match ctx.prices.latest_price(&symbol).await {
                Ok(p) => Some(p),
                Err(e) => {
                    debug!(symbol = %symbol, error = %e, "watcher: no price for {}, skipping this cycle", symbol);
                    None
                }
            };

            for trigger in triggers {
                process_trigger(ctx, trigger, price, now).await;
            }
        }
    }

    if let Some(ref metrics) = ctx.metrics {
        metrics.watcher_cycles_total.inc();
    }
}

async fn process_trigger(
    ctx: &WatcherContext,
    trigger: Trigger,
    price: Option<f64>,
    now: DateTime<Utc>,
) {
    // Expiry needs no price and is checked regardless of session.
    if trigger.is_expired_at(now) {
        match ctx.triggers.expire(trigger.id, now).await {
            Ok(expired) => {
                info!(
                    trigger_id = expired.id,
                    symbol = %expired.symbol,
                    "watcher: trigger {} expired for {}",
                    expired.id,
                    expired.symbol
                );
                if let Some(ref metrics) = ctx.metrics {
                    metrics.triggers_expired_total.inc();
                }
            }
            Err(e) => warn!(trigger_id = trigger.id, error = %e, "watcher: expiry transition failed"),
        }
        return;
    }

    // Missing price: skip the symbol this cycle, no state mutation.
    let Some(price) = price else { return };

    if !ctx.in_trading_window(now) {
        return;
    }
    if let Some(label) = ctx.calendar.in_blackout(now).await {
        debug!(symbol = %trigger.symbol, event = %label, "watcher: firing suppressed by event window");
        return;
    }

    match poll(&trigger, price, now) {
        TriggerPoll::Standby => {}
        TriggerPoll::Expired => {
            // Raced past expiry between the check above and here; next cycle
            // takes the expiry branch.
        }
        TriggerPoll::Fired(reason) => {
            let fired = match ctx.triggers.fire(trigger.id, now, reason.clone()).await {
                Ok(fired) => fired,
                Err(e) => {
                    warn!(trigger_id = trigger.id, error = %e, "watcher: fire transition failed");
                    return;
                }
            };
            info!(
                trigger_id = fired.id,
                symbol = %fired.symbol,
                reason = %reason,
                "watcher: trigger {} fired for {} ({})",
                fired.id,
                fired.symbol,
                reason
            );
            if let Some(ref metrics) = ctx.metrics {
                metrics.triggers_fired_total.inc();
            }
            convert_fired(ctx, fired, price, now).await;
        }
    }
}

/// Attempt FIRED -> CONVERTED: re-invoke the classifier with the cached
/// context, re-validate, and record the signal. Any failure along the way
/// ends the lifecycle in DISCARDED; the market moment a trigger captured
/// does not survive until a later cycle.
async fn convert_fired(ctx: &WatcherContext, trigger: Trigger, price: f64, now: DateTime<Utc>) {
    let decision = match ctx.classifier.reanalyze_trigger(&trigger, price, now).await {
        Ok(decision) => decision,
        Err(e) => {
            error!(
                trigger_id = trigger.id,
                symbol = %trigger.symbol,
                error = %e,
                "watcher: re-analysis failed, discarding trigger {}",
                trigger.id
            );
            if let Some(ref metrics) = ctx.metrics {
                metrics.classifier_failures_total.inc();
            }
            discard(ctx, trigger.id, now).await;
            return;
        }
    };

    let candidate = match TradeCandidate::from_decision(
        &decision,
        SignalOrigin::TriggerConversion,
        Some(trigger.id),
    ) {
        Some(candidate) => candidate,
        None => {
            info!(
                trigger_id = trigger.id,
                symbol = %trigger.symbol,
                "watcher: re-analysis returned WAIT, discarding trigger {}",
                trigger.id
            );
            discard(ctx, trigger.id, now).await;
            return;
        }
    };

    let snapshot = conversion_snapshot(&trigger.symbol, price, now);
    match ctx.validator.validate(&candidate, &snapshot).await {
        Ok(draft) => match ctx.signals.record(draft).await {
            Ok(signal) => {
                if let Err(e) = ctx.triggers.complete_conversion(trigger.id, now).await {
                    warn!(trigger_id = trigger.id, error = %e, "watcher: conversion transition failed");
                }
                info!(
                    trigger_id = trigger.id,
                    signal_id = signal.id,
                    symbol = %signal.symbol,
                    direction = signal.direction.as_str(),
                    "watcher: trigger {} converted into {} signal for {}",
                    trigger.id,
                    signal.direction.as_str(),
                    signal.symbol
                );
                if let Some(ref metrics) = ctx.metrics {
                    metrics.triggers_converted_total.inc();
                    metrics.signals_recorded_total.inc();
                }
                if let Some(ref notifier) = ctx.notifier {
                    notifier
                        .send(&format!(
                            "\u{1F3AF} <b>Trigger converted</b>\n<b>Symbol:</b> {}\n<b>Direction:</b> {}\n<b>Entry:</b> {}\n<b>SL:</b> {}\n<b>TP:</b> {}",
                            signal.symbol,
                            signal.direction.as_str(),
                            signal.entry,
                            signal.current_stop,
                            signal.target
                        ))
                        .await;
                }
            }
            Err(e) => {
                warn!(
                    trigger_id = trigger.id,
                    symbol = %trigger.symbol,
                    error = %e,
                    "watcher: ledger refused converted signal"
                );
                discard(ctx, trigger.id, now).await;
            }
        },
        Err(reason) => {
            info!(
                trigger_id = trigger.id,
                symbol = %trigger.symbol,
                reason = reason.tag(),
                "watcher: re-validation rejected fired trigger {} ({})",
                trigger.id,
                reason
            );
            if let Some(ref metrics) = ctx.metrics {
                metrics
                    .validation_rejections_total
                    .with_label_values(&[reason.tag()])
                    .inc();
            }
            discard(ctx, trigger.id, now).await;
        }
    }
}

async fn discard(ctx: &WatcherContext, trigger_id: i64, now: DateTime<Utc>) {
    if let Err(e) = ctx.triggers.discard(trigger_id, now).await {
        warn!(trigger_id, error = %e, "watcher: discard transition failed");
    } else if let Some(ref metrics) = ctx.metrics {
        metrics.triggers_discarded_total.inc();
    }
}

/// Freshly assembled snapshot for re-validation: the current price
/// substituted into an otherwise empty indicator context. Gates that need
/// readings the cycle does not have treat them as data-unavailable.
fn conversion_snapshot(symbol: &str, price: f64, now: DateTime<Utc>) -> MarketSnapshot {
    MarketSnapshot {
        symbol: symbol.to_string(),
        captured_at: now,
        price,
        h4: TimeframeIndicators::default(),
        h1: TimeframeIndicators::default(),
        m15: TimeframeIndicators::default(),
        context: MarketContext::derive(symbol, now, price, 0.0, 0.0, None, None, 0.0, 0.0),
    }
}
