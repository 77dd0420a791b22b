use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use restock_watcher::config::{AppConfig, ProberConfig};
use restock_watcher::{
    AlertDispatcher, Availability, EngineStatus, HttpProber, MonitorEngine, Product, Region, Store,
};

use super::*;

fn fulfillment_body(store: &str, part: &str, display: &str) -> serde_json::Value {
    json!({
        "body": {
            "content": {
                "pickupMessage": {
                    "stores": [{
                        "storeNumber": store,
                        "partsAvailability": {
                            part: { "pickupDisplay": display }
                        }
                    }]
                }
            }
        }
    })
}

async fn mount_storefront(server: &MockServer, display: &str) {
    Mock::given(method("GET"))
        .and(path("/shop/fulfillment-messages"))
        .and(query_param("parts.0", "MYEV3CH/A"))
        .and(query_param("store", "R448"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fulfillment_body("R448", "MYEV3CH/A", display)))
        .mount(server)
        .await;
}

fn watched(storefront: &MockServer) -> (Region, Store, Product) {
    let region = Region::new("cn", "China Mainland").with_storefront(storefront.uri());
    let store = Store::new("R448", "Wangfujing", &region);
    let product = Product::new("MYEV3CH/A", "iPhone 16 Pro", &region);
    (region, store, product)
}

async fn create_http_engine(audio: RecordingNotifier) -> anyhow::Result<MonitorEngine> {
    let mut config = AppConfig::default();
    config.notifications.audio.enabled = false;
    config.notifications.bark.timeout_secs = 2;

    let prober = HttpProber::new(ProberConfig {
        request_timeout_secs: 2,
        ..config.prober.clone()
    })?;
    let dispatcher = AlertDispatcher::with_default_notifiers(&config.notifications, Duration::from_secs(2)).await?;
    dispatcher.register_notifier(Arc::new(audio)).await;

    Ok(MonitorEngine::new(
        Arc::new(prober),
        dispatcher,
        fast_config(50),
        Duration::from_secs(2),
    ))
}

#[tokio::test]
async fn test_available_store_pushes_cart_link() -> anyhow::Result<()> {
    let storefront = MockServer::start().await;
    mount_storefront(&storefront, "available").await;

    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/device-key"))
        .and(body_partial_json(json!({
            "url": format!("{}/shop/bag", storefront.uri()),
            "group": "restock"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&gateway)
        .await;

    let audio = RecordingNotifier::new("audio");
    let audio_events = Arc::clone(&audio.events);
    let engine = create_http_engine(audio).await?;

    let (r, s, p) = watched(&storefront);
    engine.add(r, s, p, &format!("{}/device-key", gateway.uri())).await;
    engine.start().await;

    // Several polls, a single push
    assert!(wait_for_probes(&engine, 3).await);
    let gw = &gateway;
    assert!(
        wait_for_condition(
            || async move { gw.received_requests().await.map_or(0, |r| r.len()) >= 1 },
            2000
        )
        .await
    );
    assert_eq!(audio_events.lock().unwrap().len(), 1);
    assert!(engine.snapshot().await[0].alert_fired);

    engine.shutdown().await;
    gateway.verify().await;
    Ok(())
}

#[tokio::test]
async fn test_unavailable_store_stays_quiet() -> anyhow::Result<()> {
    let storefront = MockServer::start().await;
    mount_storefront(&storefront, "unavailable").await;

    let audio = RecordingNotifier::new("audio");
    let audio_events = Arc::clone(&audio.events);
    let engine = create_http_engine(audio).await?;

    let (r, s, p) = watched(&storefront);
    engine.add(r, s, p, "").await;
    engine.start().await;

    assert!(wait_for_probes(&engine, 2).await);
    let item = engine.snapshot().await.remove(0);
    assert_eq!(item.last_result, Some(Availability::Unavailable));
    assert_eq!(item.error_count, 0);
    assert!(audio_events.lock().unwrap().is_empty());

    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_storefront_errors_are_indeterminate() -> anyhow::Result<()> {
    let storefront = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&storefront)
        .await;

    let audio = RecordingNotifier::new("audio");
    let engine = create_http_engine(audio).await?;

    let (r, s, p) = watched(&storefront);
    engine.add(r, s, p, "").await;
    engine.start().await;

    assert!(wait_for_probes(&engine, 2).await);
    engine.pause().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let item = engine.snapshot().await.remove(0);
    assert_eq!(item.last_result, None);
    assert!(item.error_count >= 2);
    assert_eq!(engine.status(), EngineStatus::Paused);

    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_gateway_failure_does_not_suppress_audio() -> anyhow::Result<()> {
    let storefront = MockServer::start().await;
    mount_storefront(&storefront, "available").await;

    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&gateway)
        .await;

    let audio = RecordingNotifier::new("audio");
    let audio_events = Arc::clone(&audio.events);
    let engine = create_http_engine(audio).await?;

    let (r, s, p) = watched(&storefront);
    engine.add(r, s, p, &gateway.uri()).await;
    engine.start().await;

    let events = &audio_events;
    assert!(wait_for_condition(|| async move { !events.lock().unwrap().is_empty() }, 2000).await);
    assert!(engine.snapshot().await[0].alert_fired);

    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_push_test_action_hits_gateway() -> anyhow::Result<()> {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/device-key"))
        .and(body_partial_json(json!({
            "title": "In stock reminder (test)",
            "url": "https://www.apple.com.cn/shop/bag"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&gateway)
        .await;

    let engine = create_http_engine(RecordingNotifier::new("audio")).await?;
    let result = engine
        .dispatcher()
        .test_push(&format!("{}/device-key", gateway.uri()), CART_URL)
        .await?;
    assert!(result.success);

    let audio = engine.dispatcher().test_audio().await?;
    assert!(audio.success);

    gateway.verify().await;
    Ok(())
}
