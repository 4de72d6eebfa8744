//! Multi-timeframe market snapshot models.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::models::symbol::price_to_pips;

/// Chart timeframes consumed by the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    H4,
    H1,
    M15,
}

impl Timeframe {
    /// Bar duration in minutes.
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::H4 => 240,
            Timeframe::H1 => 60,
            Timeframe::M15 => 15,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::H4 => "H4",
            Timeframe::H1 => "H1",
            Timeframe::M15 => "M15",
        }
    }
}

/// Trend reading reported per timeframe by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Ranging,
}

/// Indicator readings for one timeframe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeframeIndicators {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_20: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atr: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradingSession {
    Asian,
    London,
    NewYork,
    LateNewYork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Liquidity {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolatilityState {
    Expanding,
    Contracting,
}

/// Calculated context the classifier cannot read off the chart images:
/// session/liquidity, volatility regime, where price sits in the recent
/// H4 range, and whether the recent move is over-extended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub session: TradingSession,
    pub liquidity: Liquidity,
    pub volatility: VolatilityState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_position_pct: Option<f64>,
    pub extended: bool,
}

impl MarketContext {
    /// Derive context from raw collector readings.
    ///
    /// `h4_high_20`/`h4_low_20` bound the recent H4 range; `recent_move` and
    /// `avg_move` are price changes over the last 20 candles, in price units.
    #[allow(clippy::too_many_arguments)]
    pub fn derive(
        symbol: &str,
        at: DateTime<Utc>,
        price: f64,
        atr_h4: f64,
        atr_m15: f64,
        h4_high_20: Option<f64>,
        h4_low_20: Option<f64>,
        recent_move: f64,
        avg_move: f64,
    ) -> Self {
        let (session, liquidity) = match at.hour() {
            0..=6 => (TradingSession::Asian, Liquidity::Low),
            7..=12 => (TradingSession::London, Liquidity::High),
            13..=20 => (TradingSession::NewYork, Liquidity::High),
            _ => (TradingSession::LateNewYork, Liquidity::Low),
        };

        let volatility = if atr_m15 > atr_h4 {
            VolatilityState::Expanding
        } else {
            VolatilityState::Contracting
        };

        let price_position_pct = match (h4_high_20, h4_low_20) {
            (Some(high), Some(low)) if high > low => {
                Some(((price - low) / (high - low) * 100.0).clamp(0.0, 100.0))
            }
            _ => None,
        };

        let recent_pips = price_to_pips(symbol, recent_move);
        let avg_pips = price_to_pips(symbol, avg_move);
        let extended = avg_pips > 0.0 && recent_pips > avg_pips * 1.5;

        Self {
            session,
            liquidity,
            volatility,
            price_position_pct,
            extended,
        }
    }
}

/// One timestamped bundle of current price plus per-timeframe indicator
/// readings. Immutable once produced; consumed, never stored long-term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub captured_at: DateTime<Utc>,
    pub price: f64,
    pub h4: TimeframeIndicators,
    pub h1: TimeframeIndicators,
    pub m15: TimeframeIndicators,
    pub context: MarketContext,
}

impl MarketSnapshot {
    pub fn indicators(&self, timeframe: Timeframe) -> &TimeframeIndicators {
        match timeframe {
            Timeframe::H4 => &self.h4,
            Timeframe::H1 => &self.h1,
            Timeframe::M15 => &self.m15,
        }
    }

    /// Rebuild the snapshot around a fresh price, keeping the last known
    /// indicator context. Used when re-validating a fired trigger.
    pub fn with_price(&self, price: f64, at: DateTime<Utc>) -> Self {
        let mut refreshed = self.clone();
        refreshed.price = price;
        refreshed.captured_at = at;
        refreshed
    }
}
