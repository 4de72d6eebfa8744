//! Unit tests for symbol-aware pip arithmetic

use pipwatch::models::signal::TradeDirection;
use pipwatch::models::symbol::{half_pip, pip_multiplier, price_to_pips, trade_pips};

#[test]
fn pip_multiplier_per_symbol_class() {
    assert_eq!(pip_multiplier("XAUUSD"), 10.0);
    assert_eq!(pip_multiplier("GOLD"), 10.0);
    assert_eq!(pip_multiplier("USDJPY"), 100.0);
    assert_eq!(pip_multiplier("eurjpy"), 100.0);
    assert_eq!(pip_multiplier("EURUSD"), 10_000.0);
    assert_eq!(pip_multiplier("GBPUSD"), 10_000.0);
}

#[test]
fn price_distance_converts_to_pips() {
    assert!((price_to_pips("EURUSD", 0.0050) - 50.0).abs() < 1e-9);
    assert!((price_to_pips("USDJPY", 0.50) - 50.0).abs() < 1e-9);
    assert!((price_to_pips("XAUUSD", 5.0) - 50.0).abs() < 1e-9);
    // Direction of the distance does not matter.
    assert!((price_to_pips("EURUSD", -0.0050) - 50.0).abs() < 1e-9);
}

#[test]
fn half_pip_tolerance_scales_with_symbol() {
    assert!((half_pip("EURUSD") - 0.00005).abs() < 1e-12);
    assert!((half_pip("USDJPY") - 0.005).abs() < 1e-12);
    assert!((half_pip("XAUUSD") - 0.05).abs() < 1e-12);
}

#[test]
fn trade_pips_signed_by_direction() {
    assert_eq!(trade_pips("EURUSD", TradeDirection::Buy, 1.1000, 1.1080), 80.0);
    assert_eq!(trade_pips("EURUSD", TradeDirection::Buy, 1.1000, 1.0950), -50.0);
    assert_eq!(trade_pips("EURUSD", TradeDirection::Sell, 1.1000, 1.0950), 50.0);
    assert_eq!(trade_pips("EURUSD", TradeDirection::Sell, 1.1000, 1.1080), -80.0);
}
