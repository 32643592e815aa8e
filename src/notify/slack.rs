// sqlbackup/src/notify/slack.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::SlackSettings;
use crate::notify::Notifier;

pub struct SlackNotifier {
    settings: SlackSettings,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(settings: SlackSettings) -> Self {
        SlackNotifier {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, message: &str, is_success: bool) -> Result<()> {
        let text = format!("{} {}", if is_success { "✅" } else { "❌" }, message);
        let response = self
            .client
            .post(&self.settings.webhook_url)
            .timeout(Duration::from_secs(30))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .context("slack request failed")?;
        response
            .error_for_status()
            .context("slack webhook rejected the message")?;
        Ok(())
    }
}
