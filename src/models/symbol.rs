//! Symbol-aware pip arithmetic.
//!
//! Price distances mean different things per instrument: gold quotes one
//! decimal per pip, JPY crosses two, everything else four. All pip math
//! goes through here so the stop gate, firing tolerance and P&L agree.

use crate::models::signal::TradeDirection;

/// Pip multiplier for a symbol.
///
/// Gold: 1 pip = 0.1. JPY pairs: 1 pip = 0.01. Standard FX: 1 pip = 0.0001.
pub fn pip_multiplier(symbol: &str) -> f64 {
    let upper = symbol.to_uppercase();

    if ["XAU", "GOLD", "GC"].iter().any(|g| upper.contains(g)) {
        10.0
    } else if upper.contains("JPY") {
        100.0
    } else {
        10_000.0
    }
}

/// Convert an absolute price distance to pips for the given symbol.
pub fn price_to_pips(symbol: &str, distance: f64) -> f64 {
    distance.abs() * pip_multiplier(symbol)
}

/// Price tolerance equivalent to half a pip, used when matching trigger levels.
pub fn half_pip(symbol: &str) -> f64 {
    0.5 / pip_multiplier(symbol)
}

/// Signed P&L in pips for a filled trade, positive when profitable.
pub fn trade_pips(symbol: &str, direction: TradeDirection, entry: f64, exit: f64) -> f64 {
    let diff = match direction {
        TradeDirection::Buy => exit - entry,
        TradeDirection::Sell => entry - exit,
    };
    let pips = diff * pip_multiplier(symbol);
    (pips * 10.0).round() / 10.0
}
