use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;

use crate::config::BarkConfig;
use crate::plugins::traits::{AlertEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

/// Push notifications through a Bark-compatible gateway.
///
/// The event's `notify_target` is the device endpoint, e.g.
/// `https://api.day.app/<key>`. An empty target makes delivery a no-op.
pub struct BarkNotifier {
    client: Client,
    config: BarkConfig,
}

impl BarkNotifier {
    pub fn new(config: BarkConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn create_payload(&self, event: &AlertEvent) -> serde_json::Value {
        let mut payload = json!({
            "title": event.title,
            "body": event.body,
            "url": event.link_url,
        });

        if let Some(group) = &self.config.group {
            payload["group"] = json!(group);
        }

        if let Some(sound) = &self.config.sound {
            payload["sound"] = json!(sound);
        }

        payload
    }

    fn error(message: impl Into<String>) -> AppError {
        AppError::Notification {
            channel: "bark".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl NotifierPlugin for BarkNotifier {
    fn name(&self) -> &str {
        "Bark Notifier"
    }

    fn plugin_type(&self) -> &str {
        "bark"
    }

    fn description(&self) -> &str {
        "Sends push notifications with a deep link through a Bark gateway"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<NotificationResult> {
        let target = event.notify_target.trim();
        if target.is_empty() {
            return Ok(NotificationResult::skipped("no notification target configured"));
        }

        let url = Url::parse(target)
            .map_err(|e| Self::error(format!("invalid target '{}': {}", target, e)))?;

        let response = self
            .client
            .post(url)
            .json(&self.create_payload(event))
            .send()
            .await
            .map_err(|e| Self::error(format!("delivery failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error(format!("gateway returned {}", status)));
        }

        Ok(NotificationResult::delivered(format!(
            "bark-{}",
            event.occurred_at.timestamp_millis()
        )))
    }
}
