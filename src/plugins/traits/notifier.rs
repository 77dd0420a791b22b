use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::WatchItem;
use crate::utils::error::Result;

/// A "became available" event, fanned out to every notification channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub item_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    /// Deep link the user should land on (the cart page).
    pub link_url: String,
    /// Push endpoint captured at dispatch time. Empty disables push delivery.
    pub notify_target: String,
    pub occurred_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn for_item(item: &WatchItem, link_url: impl Into<String>, notify_target: impl Into<String>) -> Self {
        Self {
            item_id: Some(item.id),
            title: format!("In stock: {}", item.product.title),
            body: format!(
                "{} is available for pickup at {} ({})",
                item.product.title, item.store.title, item.region.title
            ),
            link_url: link_url.into(),
            notify_target: notify_target.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Event used by the "try it out" actions.
    pub fn test(link_url: impl Into<String>, notify_target: impl Into<String>) -> Self {
        Self {
            item_id: None,
            title: "In stock reminder (test)".to_string(),
            body: "This is a test reminder. Clicking on the notification will redirect you to the relevant link"
                .to_string(),
            link_url: link_url.into(),
            notify_target: notify_target.into(),
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    /// The channel had nothing to do (disabled, no target). Not a failure.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(reason.into()),
        }
    }
}

/// Trait for implementing alert channels (push, audio, ...)
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;
    fn description(&self) -> &str;

    /// Deliver one event. Errors are reported to the dispatcher, never raised
    /// further.
    async fn notify(&self, event: &AlertEvent) -> Result<NotificationResult>;
}
