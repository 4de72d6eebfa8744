//! Chat notification bridge.
//!
//! Notification delivery is best-effort: a failed send is logged and
//! forgotten, it never blocks or fails the pipeline that produced it.

use std::time::Duration;

use tracing::{debug, error};

pub struct TelegramNotifier {
    http: reqwest::Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client with static config");
        Self {
            http,
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Send an HTML-formatted message to the configured chat.
    pub async fn send(&self, message: &str) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let result = self
            .http
            .post(&url)
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", message),
                ("parse_mode", "HTML"),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("notification delivered");
            }
            Ok(response) => {
                error!(status = %response.status(), "notification rejected");
            }
            Err(e) => {
                error!(error = %e, "notification send failed");
            }
        }
    }
}
