//! Analysis orchestration: classifier decision -> validation -> routing.
//!
//! One decision ends up in exactly one of four places: a recorded signal,
//! an armed trigger, a rejection (demoted to WAIT with the reason kept for
//! observability), or plain WAIT.

use std::sync::Arc;

use tracing::{info, warn};

use crate::metrics::Metrics;
use crate::models::decision::Decision;
use crate::models::signal::{Signal, SignalOrigin};
use crate::models::snapshot::MarketSnapshot;
use crate::models::trigger::Trigger;
use crate::services::notifier::TelegramNotifier;
use crate::signals::ledger::{LedgerError, SignalLedger};
use crate::triggers::store::TriggerStore;
use crate::validation::{RejectionReason, TradeCandidate, ValidationEngine};

/// Where a processed decision ended up.
#[derive(Debug)]
pub enum AnalysisOutcome {
    /// Validation passed; the signal is recorded and live.
    Signal(Signal),
    /// WAIT with an actionable candidate; a trigger is now pending.
    TriggerArmed(Trigger),
    /// BUY/SELL turned away by a gate; effectively WAIT.
    Rejected(RejectionReason),
    /// WAIT with nothing actionable to watch.
    Wait,
}

pub struct AnalysisEngine {
    triggers: Arc<TriggerStore>,
    signals: Arc<SignalLedger>,
    validator: Arc<ValidationEngine>,
    notifier: Option<Arc<TelegramNotifier>>,
    metrics: Option<Arc<Metrics>>,
    default_expiry_bars: u32,
}

impl AnalysisEngine {
    pub fn new(
        triggers: Arc<TriggerStore>,
        signals: Arc<SignalLedger>,
        validator: Arc<ValidationEngine>,
        default_expiry_bars: u32,
    ) -> Self {
        Self {
            triggers,
            signals,
            validator,
            notifier: None,
            metrics: None,
            default_expiry_bars,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<TelegramNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Route a classifier decision.
    pub async fn process(&self, decision: &Decision, snapshot: &MarketSnapshot) -> AnalysisOutcome {
        if decision.verdict.is_trade() {
            self.process_trade(decision, snapshot).await
        } else {
            self.process_wait(decision, snapshot).await
        }
    }

    async fn process_trade(
        &self,
        decision: &Decision,
        snapshot: &MarketSnapshot,
    ) -> AnalysisOutcome {
        let Some(candidate) = TradeCandidate::from_decision(decision, SignalOrigin::Direct, None)
        else {
            // Trade verdict without complete levels: parsing normally demotes
            // this upstream, treat it as WAIT here too.
            warn!(symbol = %decision.symbol, "trade decision arrived without complete levels");
            return AnalysisOutcome::Wait;
        };

        match self.validator.validate(&candidate, snapshot).await {
            Ok(draft) => match self.signals.record(draft).await {
                Ok(signal) => {
                    // A concrete signal makes any pending watch for the
                    // symbol moot.
                    if let Some(superseded) =
                        self.triggers.supersede_pending(&signal.symbol, snapshot.captured_at).await
                    {
                        info!(
                            trigger_id = superseded.id,
                            symbol = %signal.symbol,
                            "direct signal superseded pending trigger {}",
                            superseded.id
                        );
                        if let Some(ref metrics) = self.metrics {
                            metrics.triggers_superseded_total.inc();
                        }
                    }

                    info!(
                        signal_id = signal.id,
                        symbol = %signal.symbol,
                        direction = signal.direction.as_str(),
                        entry = signal.entry,
                        "recorded {} signal for {}",
                        signal.direction.as_str(),
                        signal.symbol
                    );
                    if let Some(ref metrics) = self.metrics {
                        metrics.signals_recorded_total.inc();
                    }
                    if let Some(ref notifier) = self.notifier {
                        notifier
                            .send(&format!(
                                "\u{1F4C8} <b>{} signal</b>\n<b>Symbol:</b> {}\n<b>Entry:</b> {}\n<b>SL:</b> {}\n<b>TP:</b> {}\n\n{}",
                                signal.direction.as_str(),
                                signal.symbol,
                                signal.entry,
                                signal.current_stop,
                                signal.target,
                                signal.reasoning
                            ))
                            .await;
                    }
                    AnalysisOutcome::Signal(signal)
                }
                Err(LedgerError::DuplicateOpen { symbol }) => {
                    // The ledger is the authority on the one-live-signal
                    // invariant; a race with the watcher lands here.
                    let reason = RejectionReason::DuplicateSignal { symbol };
                    self.count_rejection(&reason);
                    AnalysisOutcome::Rejected(reason)
                }
                Err(e) => {
                    warn!(symbol = %decision.symbol, error = %e, "signal record failed");
                    AnalysisOutcome::Wait
                }
            },
            Err(reason) => {
                info!(
                    symbol = %decision.symbol,
                    reason = reason.tag(),
                    "decision rejected by validation ({})",
                    reason
                );
                self.count_rejection(&reason);
                AnalysisOutcome::Rejected(reason)
            }
        }
    }

    async fn process_wait(&self, decision: &Decision, snapshot: &MarketSnapshot) -> AnalysisOutcome {
        let Some(candidate) = decision.triggers.first() else {
            return AnalysisOutcome::Wait;
        };

        match self
            .triggers
            .create(
                &decision.symbol,
                candidate,
                decision.higher_tf_note.clone(),
                self.default_expiry_bars,
                snapshot.captured_at,
            )
            .await
        {
            Ok((trigger, superseded)) => {
                if let Some(ref old) = superseded {
                    info!(
                        old_trigger_id = old.id,
                        new_trigger_id = trigger.id,
                        symbol = %trigger.symbol,
                        "trigger {} superseded by {}",
                        old.id,
                        trigger.id
                    );
                    if let Some(ref metrics) = self.metrics {
                        metrics.triggers_superseded_total.inc();
                    }
                }
                info!(
                    trigger_id = trigger.id,
                    symbol = %trigger.symbol,
                    kind = trigger.kind.label(),
                    level = trigger.level,
                    expires_at = %trigger.expires_at,
                    "armed {} trigger for {} at {}",
                    trigger.kind.label(),
                    trigger.symbol,
                    trigger.level
                );
                if let Some(ref metrics) = self.metrics {
                    metrics.triggers_created_total.inc();
                }
                AnalysisOutcome::TriggerArmed(trigger)
            }
            Err(e) => {
                warn!(symbol = %decision.symbol, error = %e, "trigger candidate refused");
                AnalysisOutcome::Wait
            }
        }
    }

    fn count_rejection(&self, reason: &RejectionReason) {
        if let Some(ref metrics) = self.metrics {
            metrics
                .validation_rejections_total
                .with_label_values(&[reason.tag()])
                .inc();
        }
    }
}
