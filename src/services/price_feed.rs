//! Price feed collaborator interface.
//!
//! The watcher and position monitor only ever need "one current price per
//! symbol per cycle". A missing or stale price is a skip-this-cycle
//! condition, never an error that stops the loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PriceFeedError {
    #[error("price feed unavailable: {0}")]
    Unavailable(String),

    #[error("price feed stale ({age_secs}s old)")]
    Stale { age_secs: u64 },

    #[error("symbol {0} not present in price feed")]
    UnknownSymbol(String),
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Latest bid price for a symbol.
    async fn latest_price(&self, symbol: &str) -> Result<f64, PriceFeedError>;
}

#[derive(Debug, Deserialize)]
struct FeedQuote {
    bid: f64,
}

#[derive(Debug, Deserialize)]
struct FeedDocument {
    #[serde(default)]
    prices: HashMap<String, FeedQuote>,
}

/// File-backed feed: the terminal-side collector rewrites one JSON document
/// with current bid/ask per symbol. Prices older than `max_age` are refused
/// so breakeven and close decisions never run on dead data.
pub struct FilePriceFeed {
    path: PathBuf,
    max_age: Duration,
}

impl FilePriceFeed {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }
}

#[async_trait]
impl PriceFeed for FilePriceFeed {
    async fn latest_price(&self, symbol: &str) -> Result<f64, PriceFeedError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| PriceFeedError::Unavailable(format!("{}: {e}", self.path.display())))?;

        let modified = metadata
            .modified()
            .map_err(|e| PriceFeedError::Unavailable(e.to_string()))?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age > self.max_age {
            return Err(PriceFeedError::Stale {
                age_secs: age.as_secs(),
            });
        }

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| PriceFeedError::Unavailable(e.to_string()))?;
        let document: FeedDocument = serde_json::from_str(&raw)
            .map_err(|e| PriceFeedError::Unavailable(format!("invalid feed JSON: {e}")))?;

        document
            .prices
            .get(symbol)
            .map(|quote| quote.bid)
            .ok_or_else(|| PriceFeedError::UnknownSymbol(symbol.to_string()))
    }
}
