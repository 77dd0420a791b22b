use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::notifiers::{AudioNotifier, BarkNotifier};
use super::traits::{AlertEvent, NotificationResult, NotifierPlugin};
use crate::config::NotificationsConfig;
use crate::utils::error::{AppError, Result};

pub type NotifierPluginArc = Arc<dyn NotifierPlugin>;

/// Fans an alert out to every registered channel.
///
/// Each channel runs as its own task with its own timeout, so a slow or
/// failing push gateway never delays the audio cue or the polling loop that
/// raised the alert.
#[derive(Clone)]
pub struct AlertDispatcher {
    notifiers: Arc<RwLock<Vec<NotifierPluginArc>>>,
    timeout: Duration,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl AlertDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(Vec::new())),
            timeout,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Dispatcher with the audio and Bark channels registered.
    pub async fn with_default_notifiers(config: &NotificationsConfig, timeout: Duration) -> Result<Self> {
        let dispatcher = Self::new(timeout);
        dispatcher
            .register_notifier(Arc::new(AudioNotifier::new(config.audio.clone())))
            .await;
        dispatcher
            .register_notifier(Arc::new(BarkNotifier::new(config.bark.clone())?))
            .await;
        Ok(dispatcher)
    }

    /// Register a notifier, replacing any existing one of the same type
    pub async fn register_notifier(&self, plugin: NotifierPluginArc) {
        let mut notifiers = self.notifiers.write().await;
        notifiers.retain(|n| n.plugin_type() != plugin.plugin_type());
        tracing::debug!("Registered notifier: {}", plugin.name());
        notifiers.push(plugin);
    }

    pub async fn has_notifier(&self, plugin_type: &str) -> bool {
        let notifiers = self.notifiers.read().await;
        notifiers.iter().any(|n| n.plugin_type() == plugin_type)
    }

    pub async fn list_notifier_types(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        notifiers.iter().map(|n| n.plugin_type().to_string()).collect()
    }

    /// Fire-and-forget delivery to all channels. Returns once the deliveries
    /// are spawned; results are only logged.
    pub async fn dispatch(&self, event: AlertEvent) {
        let notifiers = self.notifiers.read().await.clone();
        let event = Arc::new(event);

        tracing::info!("Dispatching alert '{}' to {} channel(s)", event.title, notifiers.len());
        metrics::counter!("restock_alerts_total").increment(1);

        for notifier in notifiers {
            let event = Arc::clone(&event);
            let shutdown = self.shutdown.clone();
            let timeout = self.timeout;

            self.tasks.spawn(async move {
                let channel = notifier.plugin_type().to_string();
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Abandoned {} delivery on shutdown", channel);
                    }
                    result = tokio::time::timeout(timeout, notifier.notify(&event)) => {
                        Self::report(&channel, result);
                    }
                }
            });
        }
    }

    fn report(channel: &str, result: std::result::Result<Result<NotificationResult>, tokio::time::error::Elapsed>) {
        match result {
            Ok(Ok(outcome)) if outcome.success => {
                tracing::debug!("Delivered via {}: {:?}", channel, outcome.message_id);
            }
            Ok(Ok(outcome)) => {
                tracing::info!(
                    "Skipped {} delivery: {}",
                    channel,
                    outcome.error.unwrap_or_default()
                );
            }
            Ok(Err(e)) => {
                tracing::warn!("Notification via {} failed: {}", channel, e);
                metrics::counter!("restock_notifications_failed_total", "channel" => channel.to_string())
                    .increment(1);
            }
            Err(_) => {
                tracing::warn!("Notification via {} timed out", channel);
                metrics::counter!("restock_notifications_failed_total", "channel" => channel.to_string())
                    .increment(1);
            }
        }
    }

    /// Deliver through one channel and wait for the outcome.
    pub async fn send_now(&self, plugin_type: &str, event: &AlertEvent) -> Result<NotificationResult> {
        let notifier = {
            let notifiers = self.notifiers.read().await;
            notifiers
                .iter()
                .find(|n| n.plugin_type() == plugin_type)
                .cloned()
                .ok_or_else(|| AppError::NotFound {
                    resource: format!("notifier '{}'", plugin_type),
                })?
        };

        tokio::time::timeout(self.timeout, notifier.notify(event))
            .await
            .map_err(|_| AppError::Notification {
                channel: plugin_type.to_string(),
                message: format!("timed out after {:?}", self.timeout),
            })?
    }

    /// Play the audio cue once.
    pub async fn test_audio(&self) -> Result<NotificationResult> {
        self.send_now("audio", &AlertEvent::test("", "")).await
    }

    /// Send a test push to `target`, linking to `link_url`.
    pub async fn test_push(&self, target: &str, link_url: &str) -> Result<NotificationResult> {
        self.send_now("bark", &AlertEvent::test(link_url, target)).await
    }

    /// Abandon pending deliveries and wait briefly for their tasks to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        if tokio::time::timeout(Duration::from_secs(1), self.tasks.wait()).await.is_err() {
            tracing::warn!("Notification tasks did not exit in time");
        }
    }
}
