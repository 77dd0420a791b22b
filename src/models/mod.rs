use serde::{Deserialize, Serialize};
use std::fmt;

pub mod catalog;
pub mod watch_item;
pub mod watch_list;

// Re-exports for convenience
pub use catalog::*;
pub use watch_item::*;
pub use watch_list::*;

/// Outcome of a single availability probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
    /// The probe could not tell (transport error, non-2xx, malformed payload).
    Indeterminate,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Unavailable => "unavailable",
            Availability::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run state of the monitor engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EngineStatus::Idle => "Idle",
            EngineStatus::Running => "Running",
            EngineStatus::Paused => "Paused",
        };
        f.write_str(label)
    }
}
