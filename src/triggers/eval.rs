//! Price-proximity evaluation of pending triggers.
//!
//! Evaluation is deliberately memoryless: each poll looks at the current
//! price only, with a half-pip tolerance band around the level. "Hold" and
//! "reject" nuance is approximated by which side of the level the price
//! sits on at evaluation time, not by multi-tick confirmation.

use chrono::{DateTime, Utc};

use crate::models::decision::{TriggerDirection, TriggerKind};
use crate::models::symbol::half_pip;
use crate::models::trigger::Trigger;

/// Outcome of polling one trigger against one price.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerPoll {
    /// Condition met; carries the human-readable reason.
    Fired(String),
    /// Time/bar budget exhausted before any match.
    Expired,
    /// Neither; the trigger stays pending.
    Standby,
}

/// Evaluate a pending trigger. Expiry wins over a simultaneous match.
pub fn poll(trigger: &Trigger, price: f64, now: DateTime<Utc>) -> TriggerPoll {
    if trigger.is_expired_at(now) {
        return TriggerPoll::Expired;
    }

    let level = trigger.level;
    let slop = half_pip(&trigger.symbol);
    let at_level = (price - level).abs() <= slop;

    let matched = match trigger.kind {
        TriggerKind::LevelBreak => match trigger.direction {
            TriggerDirection::Bullish if price > level => {
                Some(format!("price {price:.5} broke above {level:.5}"))
            }
            TriggerDirection::Bearish if price < level => {
                Some(format!("price {price:.5} broke below {level:.5}"))
            }
            _ => None,
        },
        TriggerKind::RetestHold => match trigger.direction {
            TriggerDirection::Bullish if at_level && price >= level => {
                Some(format!("price {price:.5} retesting {level:.5} and holding"))
            }
            TriggerDirection::Bearish if at_level && price <= level => {
                Some(format!("price {price:.5} retesting {level:.5} and holding"))
            }
            _ => None,
        },
        TriggerKind::RangeEdgeReject => {
            if at_level {
                Some(format!("price {price:.5} at range boundary {level:.5}"))
            } else {
                None
            }
        }
        TriggerKind::EmaRetouch => {
            if at_level {
                Some(format!("price {price:.5} touching EMA {level:.5}"))
            } else {
                None
            }
        }
    };

    match matched {
        Some(reason) => TriggerPoll::Fired(reason),
        None => TriggerPoll::Standby,
    }
}
