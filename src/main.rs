use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use restock_watcher::catalog::{Catalog, StaticCatalog};
use restock_watcher::settings::{self, JsonFileSettings};
use restock_watcher::{AlertDispatcher, AppConfig, HttpProber, MonitorEngine};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let _log_guard = init_tracing(&config)?;

    info!("Starting Restock Watcher...");

    if config.metrics.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!("Metrics exporter listening on {}", addr);
    }

    let prober = Arc::new(HttpProber::new(config.prober.clone())?);
    let dispatcher =
        AlertDispatcher::with_default_notifiers(&config.notifications, config.scheduler.notify_timeout()).await?;
    let engine = MonitorEngine::new(
        prober,
        dispatcher,
        config.scheduler.clone(),
        config.prober.request_timeout(),
    );

    let catalog = config
        .catalog_path
        .as_ref()
        .and_then(|path| match StaticCatalog::from_path(path) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                warn!("Failed to load catalog from {}: {}", path, e);
                None
            }
        });

    match config.settings_file() {
        Some(path) => {
            info!("Using settings file {}", path.display());
            let port = JsonFileSettings::new(path);
            settings::restore(&port, &engine, catalog.as_ref().map(|c| c as &dyn Catalog)).await;
        }
        None => warn!("No settings location available, watch list will not be restored"),
    }

    if engine.region().await.is_none() {
        if let Some(region) = catalog.as_ref().and_then(|c| c.default_region()) {
            let stores = catalog.as_ref().map_or(0, |c| c.store_options(&region.title).len());
            info!("Default region {} offers {} store(s)", region.title, stores);
            engine.change_region(region).await;
        }
    }

    let mut status_rx = engine.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            info!("Status: {}", *status_rx.borrow_and_update());
        }
    });

    engine.start().await;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    engine.shutdown().await;

    Ok(())
}

fn init_tracing(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive("restock_watcher=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match &config.logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "restock-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}
