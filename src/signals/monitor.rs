//! Position monitor for live signals.
//!
//! A second recurring job, faster than the trigger watcher: checks every
//! live signal against the current price, moves the stop to entry once a
//! full risk distance is banked, and closes signals whose target or stop
//! traded through. Missing prices skip the signal for the cycle.

use std::sync::Arc;

use apalis::prelude::*;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::metrics::Metrics;
use crate::models::signal::{Signal, SignalOutcome, TradeDirection};
use crate::services::notifier::TelegramNotifier;
use crate::services::price_feed::PriceFeed;
use crate::signals::ledger::SignalLedger;

/// Cron tick for the position monitor worker.
#[derive(Debug, Clone, Default)]
pub struct MonitorTick(pub DateTime<Utc>);

impl From<DateTime<Utc>> for MonitorTick {
    fn from(t: DateTime<Utc>) -> Self {
        Self(t)
    }
}

pub struct MonitorContext {
    pub signals: Arc<SignalLedger>,
    pub prices: Arc<dyn PriceFeed>,
    pub notifier: Option<Arc<TelegramNotifier>>,
    pub metrics: Option<Arc<Metrics>>,
}

/// Cron job entry point.
pub async fn check_live_signals(
    tick: MonitorTick,
    ctx: Data<Arc<MonitorContext>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    run_cycle(&ctx, tick.0).await;
    Ok(())
}

/// One monitor cycle over all live signals.
pub async fn run_cycle(ctx: &MonitorContext, now: DateTime<Utc>) {
    for signal in ctx.signals.live().await {
        let Some(id) = signal.id else { continue };
        let price = match ctx.prices.latest_price(&signal.symbol).await {
            Ok(p) => p,
            Err(e) => {
                debug!(signal_id = id, symbol = %signal.symbol, error = %e, "monitor: no price, skipping");
                continue;
            }
        };

        let signal = maybe_move_to_breakeven(ctx, signal, price, now).await;
        maybe_close(ctx, &signal, price, now).await;
    }
}

async fn maybe_move_to_breakeven(
    ctx: &MonitorContext,
    signal: Signal,
    price: f64,
    now: DateTime<Utc>,
) -> Signal {
    let Some(id) = signal.id else { return signal };
    if signal.breakeven_at.is_some() {
        return signal;
    }

    let reached = match signal.direction {
        TradeDirection::Buy => price >= signal.breakeven_trigger_price(),
        TradeDirection::Sell => price <= signal.breakeven_trigger_price(),
    };
    if !reached {
        return signal;
    }

    match ctx.signals.move_to_breakeven(id, now).await {
        Ok(updated) => {
            info!(
                signal_id = id,
                symbol = %updated.symbol,
                new_stop = updated.current_stop,
                "monitor: signal {} moved to breakeven",
                id
            );
            if let Some(ref metrics) = ctx.metrics {
                metrics.signals_breakeven_total.inc();
            }
            if let Some(ref notifier) = ctx.notifier {
                notifier
                    .send(&format!(
                        "\u{1F512} <b>Stop moved to breakeven</b>\n<b>Signal:</b> {}\n<b>Symbol:</b> {}\n<b>New SL:</b> {}",
                        id, updated.symbol, updated.current_stop
                    ))
                    .await;
            }
            updated
        }
        Err(e) => {
            warn!(signal_id = id, error = %e, "monitor: breakeven move failed");
            signal
        }
    }
}

async fn maybe_close(ctx: &MonitorContext, signal: &Signal, price: f64, now: DateTime<Utc>) {
    let Some(id) = signal.id else { return };

    let (target_hit, stop_hit) = match signal.direction {
        TradeDirection::Buy => (price >= signal.target, price <= signal.current_stop),
        TradeDirection::Sell => (price <= signal.target, price >= signal.current_stop),
    };

    let (outcome, exit_price) = if target_hit {
        (SignalOutcome::Win, signal.target)
    } else if stop_hit {
        let outcome = if signal.current_stop == signal.entry {
            SignalOutcome::Breakeven
        } else {
            SignalOutcome::Loss
        };
        (outcome, signal.current_stop)
    } else {
        return;
    };

    match ctx.signals.close(id, outcome, exit_price, now).await {
        Ok(closed) => {
            info!(
                signal_id = id,
                symbol = %closed.symbol,
                outcome = outcome.as_str(),
                pnl_pips = closed.pnl_pips,
                "monitor: signal {} closed {} ({:+.1} pips)",
                id,
                outcome.as_str(),
                closed.pnl_pips.unwrap_or(0.0)
            );
            if let Some(ref metrics) = ctx.metrics {
                metrics.signals_closed_total.inc();
            }
            if let Some(ref notifier) = ctx.notifier {
                let emoji = match outcome {
                    SignalOutcome::Win => "\u{1F3AF}",
                    SignalOutcome::Breakeven => "\u{1F512}",
                    SignalOutcome::Loss => "\u{274C}",
                };
                notifier
                    .send(&format!(
                        "{emoji} <b>Signal closed</b>\n<b>Signal:</b> {}\n<b>Symbol:</b> {}\n<b>Result:</b> {} ({:+.1} pips)",
                        id,
                        closed.symbol,
                        outcome.as_str(),
                        closed.pnl_pips.unwrap_or(0.0)
                    ))
                    .await;
            }
        }
        Err(e) => warn!(signal_id = id, error = %e, "monitor: close failed"),
    }
}
