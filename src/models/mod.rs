//! Shared data models spanning the engine layers.

pub mod decision;
pub mod signal;
pub mod snapshot;
pub mod symbol;
pub mod trigger;

pub use decision::{Confidence, Decision, TriggerCandidate, TriggerDirection, TriggerKind, Verdict};
pub use signal::{Signal, SignalOrigin, SignalOutcome, SignalStatus, TradeDirection};
pub use snapshot::{
    Liquidity, MarketContext, MarketSnapshot, Timeframe, TimeframeIndicators, TradingSession,
    TrendDirection, VolatilityState,
};
pub use trigger::{Trigger, TriggerStatus};
