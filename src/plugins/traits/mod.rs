pub mod notifier;

pub use notifier::{AlertEvent, NotificationResult, NotifierPlugin};
