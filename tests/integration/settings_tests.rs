use tempfile::TempDir;

use restock_watcher::settings::{self, JsonFileSettings, SettingsPort};
use restock_watcher::{Availability, Selection};

use super::*;

fn settings_engine() -> MonitorEngine {
    MonitorEngine::new(
        CountingProber::new(Availability::Unavailable),
        AlertDispatcher::new(Duration::from_secs(1)),
        fast_config(1000),
        Duration::from_secs(1),
    )
}

#[tokio::test]
async fn test_settings_round_trip() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let port = JsonFileSettings::new(dir.path().join("settings.json"));

    let engine = settings_engine();
    let (r, s, p) = triple("S1", "P1");
    engine.change_region(r.clone()).await;
    engine.add(r, s, p, "https://example/x").await;
    let (r, s, p) = triple("S2", "P1");
    engine.add(r, s, p, "").await;

    let selection = Selection::new("CN", "S1", "P1");
    settings::persist(&port, &engine, &selection).await?;

    // A fresh engine restored from disk tracks the same triples
    let restored = settings_engine();
    let loaded = settings::restore(&port, &restored, None).await;

    assert_eq!(loaded.selection(), selection);
    assert_eq!(loaded.notify_target, "https://example/x");
    assert_eq!(restored.notify_target().await, "https://example/x");
    assert_eq!(restored.region().await.map(|r| r.id), Some("CN".to_string()));

    let keys = |items: Vec<WatchItem>| items.into_iter().map(|i| i.key()).collect::<Vec<_>>();
    assert_eq!(keys(restored.snapshot().await), keys(engine.snapshot().await));
    Ok(())
}

#[tokio::test]
async fn test_restore_resets_monitoring_state() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let port = JsonFileSettings::new(dir.path().join("settings.json"));

    let engine = settings_engine();
    let (r, s, p) = triple("S1", "P1");
    engine.add(r, s, p, "").await;
    settings::persist(&port, &engine, &Selection::new("CN", "S1", "P1")).await?;

    let restored = settings_engine();
    settings::restore(&port, &restored, None).await;

    let item = restored.snapshot().await.remove(0);
    assert_eq!(item.last_result, None);
    assert!(!item.alert_fired);
    assert_eq!(item.error_count, 0);
    assert_eq!(restored.status(), restock_watcher::EngineStatus::Idle);
    Ok(())
}

#[tokio::test]
async fn test_missing_or_corrupt_settings_start_empty() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("settings.json");
    let port = JsonFileSettings::new(&path);

    let engine = settings_engine();
    let loaded = settings::restore(&port, &engine, None).await;
    assert!(loaded.watch_items.is_empty());
    assert!(engine.snapshot().await.is_empty());

    std::fs::write(&path, b"\x00\x01 definitely not json")?;
    let loaded = settings::restore(&port, &engine, None).await;
    assert_eq!(loaded, restock_watcher::UserSettings::default());
    assert!(engine.snapshot().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_clear_then_restore_is_empty() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let port = JsonFileSettings::new(dir.path().join("settings.json"));

    let engine = settings_engine();
    let (r, s, p) = triple("S1", "P1");
    engine.add(r, s, p, "").await;
    settings::persist(&port, &engine, &Selection::new("CN", "S1", "P1")).await?;

    port.clear()?;
    let restored = settings_engine();
    settings::restore(&port, &restored, None).await;
    assert!(restored.snapshot().await.is_empty());
    Ok(())
}
