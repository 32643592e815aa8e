// sqlbackup/src/notify/telegram.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::TelegramSettings;
use crate::notify::Notifier;

pub struct TelegramNotifier {
    settings: TelegramSettings,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(settings: TelegramSettings) -> Self {
        TelegramNotifier {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: &str, is_success: bool) -> Result<()> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.settings.token
        );
        let text = format!("{} {}", if is_success { "✅" } else { "❌" }, message);
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(30))
            .form(&[
                ("chat_id", self.settings.chat_id.as_str()),
                ("text", text.as_str()),
            ])
            .send()
            .await
            .context("telegram request failed")?;
        response
            .error_for_status()
            .context("telegram API rejected the message")?;
        Ok(())
    }
}
