use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::models::{Availability, EngineStatus, Product, Region, Store, Transition, WatchItem, WatchList};
use crate::plugins::{AlertDispatcher, AlertEvent};
use crate::prober::{AvailabilityProber, ProbeOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub status: EngineStatus,
    pub total_items: usize,
    pub active_loops: usize,
    pub probes_issued: u64,
    pub available_results: u64,
    pub unavailable_results: u64,
    pub indeterminate_results: u64,
    pub alerts_fired: u64,
    pub uptime_seconds: u64,
}

#[derive(Default)]
struct Counters {
    probes: AtomicU64,
    available: AtomicU64,
    unavailable: AtomicU64,
    indeterminate: AtomicU64,
    alerts: AtomicU64,
}

impl Counters {
    fn record(&self, availability: Availability) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        let counter = match availability {
            Availability::Available => &self.available,
            Availability::Unavailable => &self.unavailable,
            Availability::Indeterminate => &self.indeterminate,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("restock_probes_total", "result" => availability.as_str()).increment(1);
    }
}

/// One item's polling task.
struct ItemLoop {
    cancel: CancellationToken,
    /// Held for the whole probe-and-apply step, so a loop started after a
    /// quick pause/start never overlaps the previous loop's in-flight probe.
    probe_lock: Arc<Mutex<()>>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Control {
    run: Option<CancellationToken>,
    loops: HashMap<Uuid, ItemLoop>,
}

struct EngineInner {
    prober: Arc<dyn AvailabilityProber>,
    dispatcher: AlertDispatcher,
    config: SchedulerConfig,
    probe_timeout: Duration,
    items: RwLock<WatchList>,
    // Serializes start/pause/add/remove. Always taken before `items`.
    control: Mutex<Control>,
    status_tx: watch::Sender<EngineStatus>,
    notify_target: RwLock<String>,
    region: RwLock<Option<Region>>,
    shutdown: CancellationToken,
    counters: Counters,
    start_time: DateTime<Utc>,
}

/// Owns the watch list and runs one polling loop per item while Running.
///
/// Cheap to clone; all clones drive the same engine.
#[derive(Clone)]
pub struct MonitorEngine {
    inner: Arc<EngineInner>,
}

impl MonitorEngine {
    pub fn new(
        prober: Arc<dyn AvailabilityProber>,
        dispatcher: AlertDispatcher,
        config: SchedulerConfig,
        probe_timeout: Duration,
    ) -> Self {
        let (status_tx, _) = watch::channel(EngineStatus::Idle);

        Self {
            inner: Arc::new(EngineInner {
                prober,
                dispatcher,
                config,
                probe_timeout,
                items: RwLock::new(WatchList::new()),
                control: Mutex::new(Control::default()),
                status_tx,
                notify_target: RwLock::new(String::new()),
                region: RwLock::new(None),
                shutdown: CancellationToken::new(),
                counters: Counters::default(),
                start_time: Utc::now(),
            }),
        }
    }

    pub fn status(&self) -> EngineStatus {
        *self.inner.status_tx.borrow()
    }

    /// Subscribe to run-state changes.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.inner.dispatcher
    }

    /// Idle/Paused -> Running. No-op when already Running or shut down.
    pub async fn start(&self) {
        let mut control = self.inner.control.lock().await;
        if self.inner.shutdown.is_cancelled() {
            tracing::warn!("Start refused: engine has been shut down");
            return;
        }
        if self.status() == EngineStatus::Running {
            tracing::debug!("Start ignored: engine already running");
            return;
        }

        let run = self.inner.shutdown.child_token();
        control.run = Some(run.clone());

        let items = self.inner.items.read().await;
        control.loops.retain(|id, _| items.get(*id).is_some());
        for item in items.iter() {
            self.inner.spawn_loop(&mut control, item.id, &run);
        }
        let count = items.len();
        drop(items);

        self.inner.status_tx.send_replace(EngineStatus::Running);
        tracing::info!("Monitor started with {} item(s)", count);
    }

    /// Running -> Paused. In-flight probes finish and are applied; nothing new
    /// is scheduled. No-op unless Running.
    pub async fn pause(&self) {
        let mut control = self.inner.control.lock().await;
        if self.status() != EngineStatus::Running {
            tracing::debug!("Pause ignored: engine is {}", self.status());
            return;
        }

        if let Some(run) = control.run.take() {
            run.cancel();
        }
        for item_loop in control.loops.values_mut() {
            item_loop.handle = None;
        }

        self.inner.status_tx.send_replace(EngineStatus::Paused);
        tracing::info!("Monitor paused");
    }

    /// Track a new (region, store, product). Returns false if it was already
    /// tracked. A non-empty `notify_target` replaces the current push target.
    pub async fn add(&self, region: Region, store: Store, product: Product, notify_target: &str) -> bool {
        if !notify_target.trim().is_empty() {
            self.set_notify_target(notify_target).await;
        }

        let mut control = self.inner.control.lock().await;
        let mut items = self.inner.items.write().await;
        let Some(item) = items.add(region, store, product) else {
            return false;
        };
        let (id, label) = (item.id, item.label());
        drop(items);

        if let Some(run) = control.run.clone() {
            self.inner.spawn_loop(&mut control, id, &run);
        }
        tracing::info!("Added watch item: {}", label);
        true
    }

    /// Stop tracking one item. Only that item's loop is cancelled.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut control = self.inner.control.lock().await;
        let removed = self.inner.items.write().await.remove(id);

        if let Some(item_loop) = control.loops.remove(&id) {
            item_loop.cancel.cancel();
        }

        match removed {
            Some(item) => {
                tracing::info!("Removed watch item: {}", item.label());
                true
            }
            None => false,
        }
    }

    /// Empty the watch list and stop every item loop. The run state is kept.
    pub async fn clear(&self) {
        let mut control = self.inner.control.lock().await;
        let removed = self.inner.items.write().await.clear();
        Self::cancel_loops(&mut control);
        tracing::info!("Cleared {} watch item(s)", removed.len());
    }

    /// Replace the list wholesale, e.g. from persisted settings. Derived state
    /// starts fresh; loops follow the current run state.
    pub async fn replace_items(&self, items: Vec<WatchItem>) {
        let mut control = self.inner.control.lock().await;

        let mut list = self.inner.items.write().await;
        list.replace(items);
        let ids: HashSet<Uuid> = list.iter().map(|i| i.id).collect();
        drop(list);

        // Surviving ids keep their probe lock, so the new loop queues behind
        // the old loop's in-flight probe instead of overlapping it.
        for item_loop in control.loops.values_mut() {
            item_loop.cancel.cancel();
            item_loop.handle = None;
        }
        control.loops.retain(|id, _| ids.contains(id));

        if let Some(run) = control.run.clone() {
            for id in &ids {
                self.inner.spawn_loop(&mut control, *id, &run);
            }
        }
        tracing::info!("Watch list replaced with {} item(s)", ids.len());
    }

    /// Select a new region. Items from the previous region are dropped.
    pub async fn change_region(&self, region: Region) {
        let changed = {
            let mut current = self.inner.region.write().await;
            let changed = current.as_ref() != Some(&region);
            *current = Some(region);
            changed
        };
        if changed {
            self.clear().await;
        }
    }

    pub async fn region(&self) -> Option<Region> {
        self.inner.region.read().await.clone()
    }

    /// Re-arm one item's alert so its next available result notifies again.
    pub async fn clear_alert(&self, id: Uuid) -> bool {
        let mut items = self.inner.items.write().await;
        match items.get_mut(id) {
            Some(item) => {
                item.clear_alert();
                true
            }
            None => false,
        }
    }

    pub async fn snapshot(&self) -> Vec<WatchItem> {
        self.inner.items.read().await.snapshot()
    }

    pub async fn notify_target(&self) -> String {
        self.inner.notify_target.read().await.clone()
    }

    /// Takes effect on the next alert; in-flight deliveries keep their target.
    pub async fn set_notify_target(&self, target: &str) {
        *self.inner.notify_target.write().await = target.trim().to_string();
    }

    /// Number of item loops currently scheduled to run.
    pub async fn active_loops(&self) -> usize {
        let control = self.inner.control.lock().await;
        control.loops.values().filter(|l| !l.cancel.is_cancelled()).count()
    }

    pub async fn stats(&self) -> EngineStats {
        let total_items = self.inner.items.read().await.len();
        let active_loops = self.active_loops().await;
        let counters = &self.inner.counters;
        let uptime = Utc::now().signed_duration_since(self.inner.start_time);

        EngineStats {
            status: self.status(),
            total_items,
            active_loops,
            probes_issued: counters.probes.load(Ordering::Relaxed),
            available_results: counters.available.load(Ordering::Relaxed),
            unavailable_results: counters.unavailable.load(Ordering::Relaxed),
            indeterminate_results: counters.indeterminate.load(Ordering::Relaxed),
            alerts_fired: counters.alerts.load(Ordering::Relaxed),
            uptime_seconds: uptime.num_seconds().max(0) as u64,
        }
    }

    /// Stop all loops and abandon pending notification deliveries. The engine
    /// cannot be started again afterwards.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        {
            let mut control = self.inner.control.lock().await;
            control.run = None;
            for (_, item_loop) in control.loops.drain() {
                if let Some(handle) = item_loop.handle {
                    handle.abort();
                }
            }
            if self.status() == EngineStatus::Running {
                self.inner.status_tx.send_replace(EngineStatus::Paused);
            }
        }
        self.inner.dispatcher.shutdown().await;
        tracing::info!("Monitor shut down");
    }

    fn cancel_loops(control: &mut Control) {
        for (_, item_loop) in control.loops.drain() {
            item_loop.cancel.cancel();
        }
    }
}

impl EngineInner {
    fn spawn_loop(self: &Arc<Self>, control: &mut Control, id: Uuid, run: &CancellationToken) {
        let cancel = run.child_token();
        let probe_lock = control
            .loops
            .get(&id)
            .map(|l| Arc::clone(&l.probe_lock))
            .unwrap_or_default();

        let engine = Arc::clone(self);
        let handle = tokio::spawn(engine.run_item_loop(id, cancel.clone(), Arc::clone(&probe_lock)));

        control.loops.insert(
            id,
            ItemLoop {
                cancel,
                probe_lock,
                handle: Some(handle),
            },
        );
    }

    /// Uniform in `[0, jitter_ms]`.
    fn jitter_offset(&self) -> Duration {
        let jitter_ms = self.config.jitter_ms;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::random_range(0..=jitter_ms)
        };
        Duration::from_millis(extra)
    }

    fn next_delay(&self) -> Duration {
        self.config.poll_interval() + self.jitter_offset()
    }

    async fn run_item_loop(self: Arc<Self>, id: Uuid, cancel: CancellationToken, probe_lock: Arc<Mutex<()>>) {
        tracing::debug!("Polling loop started for item {}", id);
        // Spread first probes so items started together do not fire at once
        let mut delay = self.jitter_offset();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = self.next_delay();

            let _guard = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                guard = probe_lock.lock() => guard,
            };
            if cancel.is_cancelled() {
                break;
            }

            let item = match self.items.read().await.get(id) {
                Some(item) => item.clone(),
                None => break,
            };

            let outcome = self.prober.probe(&item, self.probe_timeout).await;
            self.apply(id, outcome).await;
        }

        tracing::debug!("Polling loop stopped for item {}", id);
    }

    async fn apply(&self, id: Uuid, outcome: ProbeOutcome) {
        let fired = {
            let mut items = self.items.write().await;
            let Some(item) = items.get_mut(id) else {
                tracing::debug!("Dropping probe result for removed item {}", id);
                return;
            };

            let transition = item.record(outcome.availability, Utc::now());
            self.counters.record(outcome.availability);

            match transition {
                Transition::BecameAvailable => {
                    tracing::info!("{} is now available", item.label());
                    Some(item.clone())
                }
                Transition::StillAvailable => {
                    tracing::debug!("{} still available, alert already sent", item.label());
                    None
                }
                Transition::Unavailable => {
                    tracing::debug!("{} unavailable", item.label());
                    None
                }
                Transition::Indeterminate => {
                    tracing::warn!(
                        "Could not determine availability of {} ({} errors): {}",
                        item.label(),
                        item.error_count,
                        outcome.detail.as_deref().unwrap_or("unknown error")
                    );
                    None
                }
            }
        };

        if let Some(item) = fired {
            self.counters.alerts.fetch_add(1, Ordering::Relaxed);
            let target = self.notify_target.read().await.clone();
            let link = outcome.cart_url.unwrap_or_default();
            self.dispatcher
                .dispatch(AlertEvent::for_item(&item, link, target))
                .await;
        }
    }
}
