pub mod dispatcher;
pub mod notifiers;
pub mod traits;

pub use dispatcher::AlertDispatcher;
pub use traits::{AlertEvent, NotificationResult, NotifierPlugin};
