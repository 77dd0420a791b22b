pub mod catalog;
pub mod config;
pub mod models;
pub mod plugins;
pub mod prober;
pub mod scheduler;
pub mod settings;
pub mod utils;

// Re-export commonly used types
pub use catalog::{Catalog, Selection, StaticCatalog};
pub use config::AppConfig;
pub use models::{Availability, EngineStatus, Product, Region, Store, WatchItem, WatchKey, WatchList};
pub use plugins::{AlertDispatcher, AlertEvent, NotificationResult, NotifierPlugin};
pub use prober::{AvailabilityProber, HttpProber, ProbeOutcome};
pub use scheduler::{EngineStats, MonitorEngine};
pub use settings::{JsonFileSettings, SettingsPort, UserSettings};
pub use utils::error::{AppError, Result};
