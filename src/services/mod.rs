//! Collaborator interfaces: vision classifier, price feed, notifications,
//! economic-event windows.

pub mod calendar;
pub mod classifier;
pub mod notifier;
pub mod price_feed;

pub use calendar::{EventWindow, EventWindowCache};
pub use classifier::{
    AnalysisRequest, ChartSet, ClassifierError, DecisionClassifier, HttpVisionClassifier,
};
pub use notifier::TelegramNotifier;
pub use price_feed::{FilePriceFeed, PriceFeed, PriceFeedError};
