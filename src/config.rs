use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub prober: ProberConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub catalog_path: Option<String>,
    pub settings_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProberConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub poll_interval_ms: u64,
    pub jitter_ms: u64,
    pub notify_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub bark: BarkConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarkConfig {
    pub timeout_secs: u64,
    pub group: Option<String>,
    pub sound: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub enabled: bool,
    pub sound_path: Option<String>,
    /// Player command, e.g. `afplay` or `paplay`. Overrides the built-in playback.
    pub player: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prober: ProberConfig::default(),
            scheduler: SchedulerConfig::default(),
            notifications: NotificationsConfig {
                bark: BarkConfig {
                    timeout_secs: 10,
                    group: Some("restock".to_string()),
                    sound: None,
                },
                audio: AudioConfig {
                    enabled: true,
                    sound_path: None,
                    player: None,
                },
            },
            logging: LoggingConfig::default(),
            metrics: MetricsConfig {
                enabled: false,
                port: 9001,
            },
            catalog_path: None,
            settings_path: None,
        }
    }
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.apple.com".to_string(),
            request_timeout_secs: 10,
            user_agent: format!("RestockWatcher/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            jitter_ms: 750,
            notify_timeout_secs: 10,
        }
    }
}

impl ProberConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with built-in defaults
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "RESTOCK_"
            .add_source(Environment::with_prefix("RESTOCK").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.prober.base_url).is_err() {
            return Err(ConfigError::Message("Invalid prober base_url format".into()));
        }

        if self.prober.request_timeout_secs == 0 {
            return Err(ConfigError::Message("Prober request_timeout_secs must be greater than 0".into()));
        }

        if self.scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::Message("Scheduler poll_interval_ms must be greater than 0".into()));
        }

        if self.scheduler.jitter_ms >= self.scheduler.poll_interval_ms {
            return Err(ConfigError::Message("Scheduler jitter_ms must be less than poll_interval_ms".into()));
        }

        if self.scheduler.notify_timeout_secs == 0 || self.notifications.bark.timeout_secs == 0 {
            return Err(ConfigError::Message("Notification timeouts must be greater than 0".into()));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }

    /// Where user settings are persisted: the configured path, or
    /// `settings.json` under the platform config directory.
    pub fn settings_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.settings_path {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("", "", "restock-watcher")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }
}
