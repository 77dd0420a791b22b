use std::sync::Arc;
use std::time::Duration;

use restock_watcher::{AlertDispatcher, Availability, EngineStatus, MonitorEngine};
use restock_watcher::Availability::{Available as A, Indeterminate as I, Unavailable as U};

use super::*;

/// Feed a script one result at a time and wait for each to be applied.
async fn feed(
    engine: &MonitorEngine,
    tx: &tokio::sync::mpsc::UnboundedSender<Availability>,
    script: &[Availability],
) -> anyhow::Result<()> {
    let base = engine.stats().await.probes_issued;
    for (n, result) in script.iter().enumerate() {
        tx.send(*result)?;
        anyhow::ensure!(
            wait_for_probes(engine, base + n as u64 + 1).await,
            "probe {} was never applied",
            n
        );
    }
    // Deliveries run on their own tasks
    tokio::time::sleep(Duration::from_millis(30)).await;
    Ok(())
}

async fn alerts_for(script: &[Availability]) -> anyhow::Result<usize> {
    let (prober, tx) = SteppedProber::new();
    let (engine, events) = create_test_engine(prober, fast_config(10)).await;

    let (r, s, p) = triple("S1", "P1");
    engine.add(r, s, p, "").await;
    engine.start().await;

    feed(&engine, &tx, script).await?;
    let count = events.lock().unwrap().len();
    engine.shutdown().await;
    Ok(count)
}

#[tokio::test]
async fn test_alert_fires_once_per_availability_edge() -> anyhow::Result<()> {
    assert_eq!(alerts_for(&[U, A, A, U, A]).await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_indeterminate_is_not_a_transition() -> anyhow::Result<()> {
    // Errors between two available results do not re-arm the alert
    assert_eq!(alerts_for(&[I, A, I, I, A]).await?, 1);
    // Only a real unavailable result re-arms it
    assert_eq!(alerts_for(&[A, I, U, I, A]).await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_first_result_available_alerts() -> anyhow::Result<()> {
    assert_eq!(alerts_for(&[A]).await?, 1);
    assert_eq!(alerts_for(&[U, U, U]).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_restock_scenario() -> anyhow::Result<()> {
    let (prober, tx) = SteppedProber::new();
    let (engine, events) = create_test_engine(prober, fast_config(10)).await;

    let (r, s, p) = triple("StoreA", "iPhone16");
    assert!(engine.add(r, s, p, "https://api.day.app/key").await);
    engine.start().await;

    feed(&engine, &tx, &[U]).await?;
    assert_eq!(engine.status(), EngineStatus::Running);
    let item = engine.snapshot().await.remove(0);
    assert_eq!(item.last_result, Some(U));
    assert!(!item.alert_fired);
    assert!(events.lock().unwrap().is_empty());

    feed(&engine, &tx, &[A]).await?;
    let item = engine.snapshot().await.remove(0);
    assert!(item.alert_fired);
    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].item_id, Some(item.id));
        assert_eq!(events[0].link_url, CART_URL);
        assert_eq!(events[0].notify_target, "https://api.day.app/key");
        assert!(events[0].title.contains("iPhone16"));
        assert!(events[0].body.contains("StoreA"));
    }

    feed(&engine, &tx, &[A]).await?;
    assert_eq!(events.lock().unwrap().len(), 1);
    assert_eq!(engine.stats().await.alerts_fired, 1);

    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_clear_alert_rearms_item() -> anyhow::Result<()> {
    let (prober, tx) = SteppedProber::new();
    let (engine, events) = create_test_engine(prober, fast_config(10)).await;

    let (r, s, p) = triple("S1", "P1");
    engine.add(r, s, p, "").await;
    engine.start().await;

    feed(&engine, &tx, &[A, A]).await?;
    assert_eq!(events.lock().unwrap().len(), 1);

    let id = engine.snapshot().await[0].id;
    assert!(engine.clear_alert(id).await);
    feed(&engine, &tx, &[A]).await?;
    assert_eq!(events.lock().unwrap().len(), 2);

    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_failing_push_does_not_suppress_audio() -> anyhow::Result<()> {
    let dispatcher = AlertDispatcher::new(Duration::from_secs(2));
    let audio = RecordingNotifier::new("audio");
    let audio_events = Arc::clone(&audio.events);
    let push = RecordingNotifier::failing("bark", Duration::from_millis(300));
    let push_events = Arc::clone(&push.events);
    dispatcher.register_notifier(Arc::new(audio)).await;
    dispatcher.register_notifier(Arc::new(push)).await;

    let (prober, tx) = SteppedProber::new();
    let engine = MonitorEngine::new(prober, dispatcher, fast_config(10), Duration::from_secs(1));
    let (r, s, p) = triple("S1", "P1");
    engine.add(r, s, p, "https://api.day.app/key").await;
    engine.start().await;

    feed(&engine, &tx, &[A]).await?;

    // The audio cue lands while the push is still stalled
    assert_eq!(audio_events.lock().unwrap().len(), 1);
    assert!(push_events.lock().unwrap().is_empty());

    // The failed push leaves the item's alert state alone
    let probes = engine.stats().await.probes_issued;
    let pushed = &push_events;
    assert!(wait_for_condition(|| async move { pushed.lock().unwrap().len() == 1 }, 1000).await);
    assert!(engine.snapshot().await[0].alert_fired);
    feed(&engine, &tx, &[A]).await?;
    assert!(engine.stats().await.probes_issued > probes);
    assert_eq!(audio_events.lock().unwrap().len(), 1);

    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_multiple_items_alert_independently() -> anyhow::Result<()> {
    let prober = ScriptedProber::new(&[A]);
    let (engine, events) = create_test_engine(prober, fast_config(20)).await;

    let (r, s, p) = triple("S1", "P1");
    engine.add(r, s, p, "").await;
    let (r, s, p) = triple("S2", "P1");
    engine.add(r, s, p, "").await;
    engine.start().await;

    // The scripted prober answers Available from now on for both items
    assert!(wait_for_probes(&engine, 6).await);
    tokio::time::sleep(Duration::from_millis(30)).await;

    let events = events.lock().unwrap().clone();
    assert_eq!(events.len(), 2);
    assert_ne!(events[0].item_id, events[1].item_id);

    engine.shutdown().await;
    Ok(())
}
