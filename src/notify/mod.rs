// sqlbackup/src/notify/mod.rs
pub(crate) mod slack;
pub(crate) mod telegram;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AppConfig;

/// One notification channel. Implementations are registered by name and
/// invoked once per run with the final message.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, message: &str, is_success: bool) -> Result<()>;
}

/// Builds the channel registry from the configured channel list. A
/// listed channel is only registered when its section is present and
/// enabled; unknown names get a warning, not an error.
pub fn build_registry(config: &AppConfig) -> Vec<Box<dyn Notifier>> {
    let mut registry: Vec<Box<dyn Notifier>> = Vec::new();
    for channel in &config.notification_channels {
        match channel.as_str() {
            "telegram" => match &config.telegram {
                Some(settings) if settings.enabled => {
                    registry.push(Box::new(telegram::TelegramNotifier::new(settings.clone())));
                }
                _ => tracing::debug!("telegram channel listed but disabled or unconfigured"),
            },
            "slack" => match &config.slack {
                Some(settings) if settings.enabled => {
                    registry.push(Box::new(slack::SlackNotifier::new(settings.clone())));
                }
                _ => tracing::debug!("slack channel listed but disabled or unconfigured"),
            },
            other => tracing::warn!(channel = %other, "unknown notification channel"),
        }
    }
    registry
}

/// Fire-and-forget dispatch: every registered channel gets the message,
/// and a channel's delivery failure is logged without touching the run's
/// outcome.
pub async fn dispatch(config: &AppConfig, message: &str, is_success: bool) {
    dispatch_to(&build_registry(config), message, is_success).await;
}

/// Delivery core, separated from registry construction so callers can
/// hand in any set of channels.
pub async fn dispatch_to(registry: &[Box<dyn Notifier>], message: &str, is_success: bool) {
    for notifier in registry {
        match notifier.send(message, is_success).await {
            Ok(()) => tracing::info!(channel = notifier.name(), "notification sent"),
            Err(err) => {
                tracing::warn!(channel = notifier.name(), error = %err,
                    "notification delivery failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::ArchiveFormat;
    use crate::config::{
        AppConfig, BackupSettings, MysqlSettings, SlackSettings, TelegramSettings, Timeouts,
    };
    use crate::utils::report::{RowStatus, RunSummary, SummaryRow};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingNotifier {
        calls: Arc<Mutex<Vec<(String, bool)>>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, message: &str, is_success: bool) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((message.to_string(), is_success));
            Ok(())
        }
    }

    fn config_with_channels(channels: &[&str]) -> AppConfig {
        AppConfig {
            backup: BackupSettings {
                backup_dir: PathBuf::from("/tmp/backups"),
                archive_format: ArchiveFormat::Gz,
                retention_days: 0,
            },
            mysql: MysqlSettings {
                host: "localhost".to_string(),
                port: 3306,
                user: "backup".to_string(),
                password: String::new(),
                mysqldump_path: None,
                ignored_databases: Vec::new(),
            },
            export: Default::default(),
            timeouts: Timeouts {
                dump: Duration::from_secs(60),
                tool: Duration::from_secs(60),
                upload: Duration::from_secs(60),
            },
            notification_channels: channels.iter().map(|c| c.to_string()).collect(),
            telegram: Some(TelegramSettings {
                enabled: true,
                token: "token".to_string(),
                chat_id: "chat".to_string(),
            }),
            slack: Some(SlackSettings {
                enabled: false,
                webhook_url: "https://hooks.slack.com/services/x".to_string(),
            }),
            remote: None,
        }
    }

    #[test]
    fn registry_contains_only_enabled_configured_channels() {
        let registry = build_registry(&config_with_channels(&["telegram", "slack"]));
        let names: Vec<&str> = registry.iter().map(|n| n.name()).collect();
        assert_eq!(names, ["telegram"]);
    }

    #[test]
    fn unknown_channel_names_are_ignored() {
        let registry = build_registry(&config_with_channels(&["carrier_pigeon"]));
        assert!(registry.is_empty());
    }

    #[test]
    fn empty_channel_list_builds_an_empty_registry() {
        let registry = build_registry(&config_with_channels(&[]));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn clean_run_sends_one_success_notification_per_channel() {
        let mut summary = RunSummary::new();
        for database in ["shop", "crm"] {
            summary.push_row(SummaryRow {
                database: database.to_string(),
                status: RowStatus::Success,
                elapsed: Some(Duration::from_secs(2)),
                raw_size_bytes: 500,
                archived_size_bytes: 120,
            });
        }
        assert!(summary.is_success());

        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry: Vec<Box<dyn Notifier>> = vec![Box::new(RecordingNotifier {
            calls: Arc::clone(&calls),
        })];

        dispatch_to(&registry, &summary.notification_message(), summary.is_success()).await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (message, is_success) = &calls[0];
        assert!(*is_success);
        assert!(message.contains("completed successfully (2 databases)"));
    }
}
