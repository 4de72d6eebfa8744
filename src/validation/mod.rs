//! Hard risk/quality gates applied before a candidate decision may become
//! a trade signal.
//!
//! Gates run in a fixed order and the first failure short-circuits into a
//! WAIT-equivalent rejection. Rejections are expected outcomes, recorded
//! for observability, never raised as faults.

use std::sync::Arc;

use chrono::Timelike;
use thiserror::Error;

use crate::models::decision::Decision;
use crate::models::signal::{Signal, SignalOrigin, SignalStatus, TradeDirection};
use crate::models::snapshot::MarketSnapshot;
use crate::models::symbol::price_to_pips;
use crate::signals::ledger::SignalLedger;

/// Why a candidate was turned away, in gate order.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RejectionReason {
    #[error("outside trading window (hour {hour:02}:00 UTC)")]
    OutsideHours { hour: u32 },

    #[error("risk/reward {rr:.2}:1 below minimum {min:.1}:1")]
    InsufficientRR { rr: f64, min: f64 },

    #[error("momentum extreme (RSI {rsi:.1})")]
    MomentumExtreme { rsi: f64 },

    #[error("stop distance {pips:.1} pips outside {min:.0}-{max:.0} pip band")]
    StopOutOfBand { pips: f64, min: f64, max: f64 },

    #[error("live signal already open for {symbol}")]
    DuplicateSignal { symbol: String },
}

impl RejectionReason {
    /// Stable tag for logs and metrics labels.
    pub fn tag(&self) -> &'static str {
        match self {
            RejectionReason::OutsideHours { .. } => "outside_hours",
            RejectionReason::InsufficientRR { .. } => "insufficient_rr",
            RejectionReason::MomentumExtreme { .. } => "momentum_extreme",
            RejectionReason::StopOutOfBand { .. } => "stop_out_of_band",
            RejectionReason::DuplicateSignal { .. } => "duplicate_signal",
        }
    }
}

/// Gate thresholds, overridable from the environment.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub window_start_hour: u32,
    pub window_end_hour: u32,
    pub min_risk_reward: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub stop_min_pips: f64,
    pub stop_max_pips: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            window_start_hour: 6,
            window_end_hour: 20,
            min_risk_reward: 1.5,
            rsi_overbought: 75.0,
            rsi_oversold: 25.0,
            stop_min_pips: 10.0,
            stop_max_pips: 100.0,
        }
    }
}

/// A fully priced BUY/SELL proposal extracted from a classifier decision.
#[derive(Debug, Clone)]
pub struct TradeCandidate {
    pub symbol: String,
    pub direction: TradeDirection,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub reasoning: String,
    pub origin: SignalOrigin,
    pub trigger_id: Option<i64>,
}

impl TradeCandidate {
    /// Extract a candidate from a decision, or `None` when the verdict is
    /// WAIT or any trade level is missing.
    pub fn from_decision(
        decision: &Decision,
        origin: SignalOrigin,
        trigger_id: Option<i64>,
    ) -> Option<Self> {
        let direction = TradeDirection::try_from(decision.verdict).ok()?;
        let (entry, stop, target) = decision.levels()?;
        Some(Self {
            symbol: decision.symbol.clone(),
            direction,
            entry,
            stop,
            target,
            reasoning: decision.reasoning.clone(),
            origin,
            trigger_id,
        })
    }

    pub fn risk_reward(&self) -> f64 {
        let risk = (self.entry - self.stop).abs();
        if risk == 0.0 {
            return 0.0;
        }
        (self.target - self.entry).abs() / risk
    }
}

/// The gate chain. Holds the ledger only to answer the duplicate gate.
pub struct ValidationEngine {
    config: ValidationConfig,
    ledger: Arc<SignalLedger>,
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig, ledger: Arc<SignalLedger>) -> Self {
        Self { config, ledger }
    }

    /// Apply all gates in order. On success returns an unrecorded signal;
    /// persisting it is the caller's responsibility.
    pub async fn validate(
        &self,
        candidate: &TradeCandidate,
        snapshot: &MarketSnapshot,
    ) -> Result<Signal, RejectionReason> {
        // Gate 1: trading window, evaluated against the snapshot clock.
        let hour = snapshot.captured_at.hour();
        if hour < self.config.window_start_hour || hour >= self.config.window_end_hour {
            return Err(RejectionReason::OutsideHours { hour });
        }

        // Gate 2: risk/reward.
        let rr = candidate.risk_reward();
        if rr < self.config.min_risk_reward {
            return Err(RejectionReason::InsufficientRR {
                rr,
                min: self.config.min_risk_reward,
            });
        }

        // Gate 3: entry-timeframe oscillator extremes. A missing reading is
        // data-unavailable, not a rejection.
        if let Some(rsi) = snapshot.m15.rsi {
            let extreme = match candidate.direction {
                TradeDirection::Buy => rsi > self.config.rsi_overbought,
                TradeDirection::Sell => rsi < self.config.rsi_oversold,
            };
            if extreme {
                return Err(RejectionReason::MomentumExtreme { rsi });
            }
        }

        // Gate 4: symbol-aware stop distance band.
        let stop_pips = price_to_pips(&candidate.symbol, candidate.entry - candidate.stop);
        if stop_pips < self.config.stop_min_pips || stop_pips > self.config.stop_max_pips {
            return Err(RejectionReason::StopOutOfBand {
                pips: stop_pips,
                min: self.config.stop_min_pips,
                max: self.config.stop_max_pips,
            });
        }

        // Gate 5: one live signal per symbol.
        if self.ledger.live_for_symbol(&candidate.symbol).await.is_some() {
            return Err(RejectionReason::DuplicateSignal {
                symbol: candidate.symbol.clone(),
            });
        }

        Ok(Signal {
            id: None,
            symbol: candidate.symbol.clone(),
            direction: candidate.direction,
            entry: candidate.entry,
            original_stop: candidate.stop,
            current_stop: candidate.stop,
            target: candidate.target,
            reasoning: candidate.reasoning.clone(),
            created_at: snapshot.captured_at,
            origin: candidate.origin,
            trigger_id: candidate.trigger_id,
            status: SignalStatus::Open,
            breakeven_at: None,
            outcome: None,
            exit_price: None,
            pnl_pips: None,
            closed_at: None,
        })
    }
}
