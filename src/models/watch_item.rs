use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Availability, Product, Region, Store};

/// Identity of a watch item: the (region, store, product) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchKey {
    pub region_id: String,
    pub store_id: String,
    pub product_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchItem {
    /// Per-insertion id. A removed and re-added triple gets a fresh id, so a
    /// loop that outlived its item can never write into the new one.
    pub id: Uuid,
    pub region: Region,
    pub store: Store,
    pub product: Product,

    // Derived monitoring state
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_result: Option<Availability>,
    pub alert_fired: bool,
    pub error_count: u64,

    pub added_at: DateTime<Utc>,
}

/// What a recorded probe result did to the item's alert state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Non-available to available with the alert armed: dispatch an alert.
    BecameAvailable,
    /// Available again while the alert has already fired.
    StillAvailable,
    /// Confirmed unavailable; the alert is armed for the next transition.
    Unavailable,
    /// The probe could not decide; alert state untouched.
    Indeterminate,
}

impl WatchItem {
    pub fn new(region: Region, store: Store, product: Product) -> Self {
        Self {
            id: Uuid::new_v4(),
            region,
            store,
            product,
            last_checked_at: None,
            last_result: None,
            alert_fired: false,
            error_count: 0,
            added_at: Utc::now(),
        }
    }

    pub fn key(&self) -> WatchKey {
        WatchKey {
            region_id: self.region.id.clone(),
            store_id: self.store.id.clone(),
            product_id: self.product.id.clone(),
        }
    }

    /// Short human label used in logs and notification bodies.
    pub fn label(&self) -> String {
        format!("{} @ {}", self.product.title, self.store.title)
    }

    /// Apply one probe result. Edge-triggered: only the first available result
    /// after an armed state reports `BecameAvailable`.
    pub fn record(&mut self, availability: Availability, at: DateTime<Utc>) -> Transition {
        self.last_checked_at = Some(at);

        match availability {
            Availability::Available => {
                self.last_result = Some(Availability::Available);
                if self.alert_fired {
                    Transition::StillAvailable
                } else {
                    self.alert_fired = true;
                    Transition::BecameAvailable
                }
            }
            Availability::Unavailable => {
                self.last_result = Some(Availability::Unavailable);
                self.alert_fired = false;
                Transition::Unavailable
            }
            Availability::Indeterminate => {
                self.error_count += 1;
                Transition::Indeterminate
            }
        }
    }

    /// Re-arm the alert without touching the last observed result.
    pub fn clear_alert(&mut self) {
        self.alert_fired = false;
    }

    /// Drop all derived state, as if the item had just been added.
    pub fn reset_state(&mut self) {
        self.last_checked_at = None;
        self.last_result = None;
        self.alert_fired = false;
        self.error_count = 0;
    }
}
