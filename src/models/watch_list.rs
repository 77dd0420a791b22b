use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{Product, Region, Store, WatchItem, WatchKey};

/// Insertion-ordered set of watch items, unique by (region, store, product).
///
/// The list itself is not synchronized; the engine owns it behind a lock and
/// hands out snapshots.
#[derive(Debug, Clone, Default)]
pub struct WatchList {
    items: Vec<WatchItem>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new triple. Returns the inserted item, or `None` when the
    /// triple is already tracked (a no-op, not an error).
    pub fn add(&mut self, region: Region, store: Store, product: Product) -> Option<&WatchItem> {
        let item = WatchItem::new(region, store, product);
        if self.contains(&item.key()) {
            return None;
        }
        self.items.push(item);
        self.items.last()
    }

    pub fn remove(&mut self, id: Uuid) -> Option<WatchItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    /// Empty the list, returning what was removed.
    pub fn clear(&mut self) -> Vec<WatchItem> {
        std::mem::take(&mut self.items)
    }

    /// Replace the whole list. Derived state is reset and later duplicates of
    /// an earlier triple are dropped.
    pub fn replace<I>(&mut self, items: I) -> Vec<WatchItem>
    where
        I: IntoIterator<Item = WatchItem>,
    {
        let previous = self.clear();
        let mut seen = HashSet::new();
        for mut item in items {
            if seen.insert(item.key()) {
                item.reset_state();
                self.items.push(item);
            }
        }
        previous
    }

    pub fn contains(&self, key: &WatchKey) -> bool {
        self.items.iter().any(|item| &item.key() == key)
    }

    pub fn get(&self, id: Uuid) -> Option<&WatchItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut WatchItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn snapshot(&self) -> Vec<WatchItem> {
        self.items.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
