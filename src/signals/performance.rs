//! Performance aggregation over closed signals.

use serde::Serialize;

use crate::models::signal::{Signal, SignalOutcome};

/// Aggregated outcome statistics for a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub period_days: i64,
    pub total_signals: usize,
    pub winners: usize,
    pub losers: usize,
    pub breakeven: usize,
    pub win_rate: f64,
    pub avg_winner_pips: f64,
    pub avg_loser_pips: f64,
    pub total_pips: f64,
    pub profit_factor: f64,
    pub breakeven_moves: usize,
    pub avg_duration_minutes: f64,
}

impl PerformanceReport {
    pub fn from_closed(closed: &[Signal], period_days: i64) -> Self {
        let total = closed.len();
        let winners = closed
            .iter()
            .filter(|s| s.outcome == Some(SignalOutcome::Win))
            .count();
        let losers = closed
            .iter()
            .filter(|s| s.outcome == Some(SignalOutcome::Loss))
            .count();
        let breakeven = closed
            .iter()
            .filter(|s| s.outcome == Some(SignalOutcome::Breakeven))
            .count();

        let winner_pips: Vec<f64> = closed
            .iter()
            .filter(|s| s.outcome == Some(SignalOutcome::Win))
            .filter_map(|s| s.pnl_pips)
            .collect();
        let loser_pips: Vec<f64> = closed
            .iter()
            .filter(|s| s.outcome == Some(SignalOutcome::Loss))
            .filter_map(|s| s.pnl_pips)
            .collect();

        let sum_wins: f64 = winner_pips.iter().sum();
        let sum_losses: f64 = loser_pips.iter().sum();
        let total_pips: f64 = closed.iter().filter_map(|s| s.pnl_pips).sum();

        let durations: Vec<f64> = closed
            .iter()
            .filter_map(|s| s.closed_at.map(|c| (c - s.created_at).num_minutes() as f64))
            .collect();

        Self {
            period_days,
            total_signals: total,
            winners,
            losers,
            breakeven,
            win_rate: ratio(winners, total) * 100.0,
            avg_winner_pips: mean(&winner_pips),
            avg_loser_pips: mean(&loser_pips),
            total_pips: round1(total_pips),
            profit_factor: if sum_losses != 0.0 {
                round2(sum_wins / sum_losses.abs())
            } else {
                0.0
            },
            breakeven_moves: closed.iter().filter(|s| s.breakeven_at.is_some()).count(),
            avg_duration_minutes: round1(mean(&durations)),
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        round1(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
