//! Environment-driven configuration.
//!
//! Everything operational is an environment variable with a sensible
//! default; only the classifier API key is required. `dotenvy` is loaded
//! at the binary entry point so a local `.env` file works in development.

use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::validation::ValidationConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("environment variable {name} has unusable value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Deployment environment, used to pick the log format.
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub path: String,
    pub max_age_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub classifier: ClassifierSettings,
    pub validation: ValidationConfig,
    pub watcher_poll_seconds: u64,
    pub monitor_poll_seconds: u64,
    pub default_expiry_bars: u32,
    pub cooldown_minutes: i64,
    pub event_cache_ttl_minutes: i64,
    pub feed: FeedSettings,
    pub telegram: Option<TelegramSettings>,
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key =
            env::var("ANTHROPIC_API_KEY").map_err(|_| ConfigError::Missing("ANTHROPIC_API_KEY"))?;

        let defaults = ValidationConfig::default();
        let validation = ValidationConfig {
            window_start_hour: var_or("TRADING_WINDOW_START", defaults.window_start_hour)?,
            window_end_hour: var_or("TRADING_WINDOW_END", defaults.window_end_hour)?,
            min_risk_reward: var_or("MIN_RISK_REWARD", defaults.min_risk_reward)?,
            rsi_overbought: var_or("RSI_OVERBOUGHT", defaults.rsi_overbought)?,
            rsi_oversold: var_or("RSI_OVERSOLD", defaults.rsi_oversold)?,
            stop_min_pips: var_or("STOP_MIN_PIPS", defaults.stop_min_pips)?,
            stop_max_pips: var_or("STOP_MAX_PIPS", defaults.stop_max_pips)?,
        };

        let telegram = match (env::var("TELEGRAM_TOKEN"), env::var("TELEGRAM_CHAT_ID")) {
            (Ok(token), Ok(chat_id)) => Some(TelegramSettings { token, chat_id }),
            _ => None,
        };

        Ok(Self {
            port: var_or("PORT", 8080)?,
            classifier: ClassifierSettings {
                api_url: env::var("ANTHROPIC_API_URL")
                    .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
                api_key,
                model: env::var("CLAUDE_MODEL")
                    .unwrap_or_else(|_| "claude-sonnet-4-5-20250929".to_string()),
                timeout_seconds: var_or("CLASSIFIER_TIMEOUT_SECONDS", 60)?,
            },
            validation,
            watcher_poll_seconds: var_or("TRIGGER_POLL_SECONDS", 120)?,
            monitor_poll_seconds: var_or("PRICE_UPDATE_INTERVAL", 60)?,
            default_expiry_bars: var_or("TRIGGER_EXPIRY_BARS", 8)?,
            cooldown_minutes: var_or("COOLDOWN_MINUTES", 60)?,
            event_cache_ttl_minutes: var_or("EVENT_CACHE_TTL_MINUTES", 60)?,
            feed: FeedSettings {
                path: env::var("PRICE_FEED_PATH")
                    .unwrap_or_else(|_| "price_feed.json".to_string()),
                max_age_seconds: var_or("PRICE_FEED_MAX_AGE_SECONDS", 300)?,
            },
            telegram,
            database_url: env::var("DATABASE_URL").ok(),
        })
    }
}

fn var_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
