use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, Selection};
use crate::models::{Product, Region, Store, WatchItem};
use crate::scheduler::MonitorEngine;
use crate::utils::error::{AppError, Result};

/// The tracked triple as persisted; derived monitoring state is not saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedWatchItem {
    pub region: Region,
    pub store: Store,
    pub product: Product,
}

impl From<&WatchItem> for SavedWatchItem {
    fn from(item: &WatchItem) -> Self {
        Self {
            region: item.region.clone(),
            store: item.store.clone(),
            product: item.product.clone(),
        }
    }
}

impl From<SavedWatchItem> for WatchItem {
    fn from(saved: SavedWatchItem) -> Self {
        WatchItem::new(saved.region, saved.store, saved.product)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub selected_region: String,
    pub selected_store: String,
    pub selected_product: String,
    pub notify_target: String,
    #[serde(default)]
    pub watch_items: Vec<SavedWatchItem>,
}

impl UserSettings {
    pub fn selection(&self) -> Selection {
        Selection::new(
            self.selected_region.clone(),
            self.selected_store.clone(),
            self.selected_product.clone(),
        )
    }
}

/// Load/save/clear of user preferences. The storage format belongs to the
/// implementation; the only contract is round-trip fidelity.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsPort: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<UserSettings>>;
    fn save(&self, settings: &UserSettings) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Settings stored as a JSON document on disk.
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SettingsPort for JsonFileSettings {
    fn load(&self) -> Result<Option<UserSettings>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let settings = serde_json::from_str(&content).map_err(|e| {
            AppError::Settings(format!("corrupt settings at {}: {}", self.path.display(), e))
        })?;
        Ok(Some(settings))
    }

    fn save(&self, settings: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(settings)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Load settings and apply them to the engine. Any persistence failure falls
/// back to defaults; this never prevents the engine from starting.
///
/// The saved region title is resolved through `catalog` when one is given,
/// so the selection survives even with an empty watch list. Otherwise the
/// region of the first saved item is used.
pub async fn restore(
    port: &dyn SettingsPort,
    engine: &MonitorEngine,
    catalog: Option<&dyn Catalog>,
) -> UserSettings {
    let settings = match port.load() {
        Ok(Some(settings)) => settings,
        Ok(None) => {
            tracing::info!("No saved settings, starting with an empty watch list");
            return UserSettings::default();
        }
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            return UserSettings::default();
        }
    };

    let selected = catalog.and_then(|c| c.region_by_title(&settings.selected_region));
    match selected.or_else(|| settings.watch_items.first().map(|i| i.region.clone())) {
        Some(region) => engine.change_region(region).await,
        None if !settings.selected_region.is_empty() => {
            tracing::warn!("Saved region '{}' is not in the catalog", settings.selected_region);
        }
        None => {}
    }
    engine.set_notify_target(&settings.notify_target).await;
    engine
        .replace_items(settings.watch_items.iter().cloned().map(WatchItem::from).collect())
        .await;

    tracing::info!("Restored {} watch item(s) from settings", settings.watch_items.len());
    settings
}

/// Capture the engine's current list and target together with a selection.
pub async fn export(engine: &MonitorEngine, selection: &Selection) -> UserSettings {
    UserSettings {
        selected_region: selection.region.clone(),
        selected_store: selection.store.clone(),
        selected_product: selection.product.clone(),
        notify_target: engine.notify_target().await,
        watch_items: engine.snapshot().await.iter().map(SavedWatchItem::from).collect(),
    }
}

pub async fn persist(port: &dyn SettingsPort, engine: &MonitorEngine, selection: &Selection) -> Result<()> {
    let settings = export(engine, selection).await;
    port.save(&settings)
}
