//! Persistence mirror for triggers and signals.

pub mod postgres;

pub use postgres::Database;
