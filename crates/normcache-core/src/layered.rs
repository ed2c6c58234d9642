//! # Layered Key-Value Map
//!
//! A base mapping plus an ordered stack of numbered overlays ("optimistic
//! layers"). Lookups scan overlays newest-first, then the base.
//!
//! ## Invariants
//!
//! - At most one overlay exists per layer id; writing to an open layer
//!   merges into it.
//! - A tombstone (`None`) in an overlay shadows older layers and the base.
//! - A value written over a tombstone in the same overlay keeps shadowing:
//!   older layers stay hidden, as they would after a delete in the base.
//! - Clearing a layer removes it entirely; the order of the others is kept.
//!
//! Overlays are kept in a `BTreeMap` keyed by the sequence number they were
//! opened with, so "newest first" is reverse key order and opening or
//! clearing a layer never shifts the others.

use crate::types::LayerId;
use std::collections::{BTreeMap, BTreeSet};

/// One open overlay.
#[derive(Debug, Clone)]
struct Overlay<V> {
    id: LayerId,
    values: BTreeMap<String, Option<V>>,
    /// Keys rewritten after a tombstone in this overlay.
    revived: BTreeSet<String>,
}

/// Generic layered container.
#[derive(Debug, Clone)]
pub struct Layered<V> {
    /// Committed values.
    base: BTreeMap<String, V>,
    /// Open overlays keyed by opening sequence (newest = largest).
    overlays: BTreeMap<u64, Overlay<V>>,
    /// Reverse index: layer id -> opening sequence.
    open: BTreeMap<LayerId, u64>,
    /// Next opening sequence number.
    next_seq: u64,
}

impl<V> Default for Layered<V> {
    fn default() -> Self {
        Self {
            base: BTreeMap::new(),
            overlays: BTreeMap::new(),
            open: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<V> Layered<V> {
    /// Create an empty container (empty base, no layers).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` in the given layer, or in the base when `layer` is `None`.
    ///
    /// In a layer, `None` records a tombstone. In the base, `None` deletes
    /// the key.
    pub fn set(&mut self, key: impl Into<String>, value: Option<V>, layer: Option<LayerId>) {
        let key = key.into();
        match layer {
            Some(layer) => {
                let overlay = self.overlay_mut(layer);
                match (&value, overlay.values.get(&key)) {
                    (Some(_), Some(None)) => {
                        overlay.revived.insert(key.clone());
                    }
                    (None, _) => {
                        overlay.revived.remove(&key);
                    }
                    _ => {}
                }
                overlay.values.insert(key, value);
            }
            None => match value {
                Some(value) => {
                    self.base.insert(key, value);
                }
                None => {
                    self.base.remove(&key);
                }
            },
        }
    }

    /// Get the visible value of `key`.
    ///
    /// The first layer holding the key wins, even when it holds a tombstone.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.stack(key).next().flatten()
    }

    /// Check if `key` currently has a visible value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Every stored entry for `key`, newest layer first, base last.
    ///
    /// Layers that never touched the key are skipped. A `None` item is a
    /// tombstone; a value revived over a tombstone is followed by one.
    pub fn stack<'a, 'k>(
        &'a self,
        key: &'k str,
    ) -> impl Iterator<Item = Option<&'a V>> + use<'a, 'k, V> {
        self.overlays
            .values()
            .rev()
            .flat_map(move |overlay| {
                let entry = overlay.values.get(key).map(Option::as_ref);
                let shadow = entry
                    .flatten()
                    .filter(|_| overlay.revived.contains(key))
                    .map(|_| None);
                entry.into_iter().chain(shadow)
            })
            .chain(self.base.get(key).map(Some))
    }

    /// Open an empty overlay for `layer` at the front of the stack.
    ///
    /// No-op if it is already open; its position is kept.
    pub fn open(&mut self, layer: LayerId) {
        self.overlay_mut(layer);
    }

    /// Remove the overlay for `layer`. No-op if it is not open.
    pub fn clear(&mut self, layer: LayerId) {
        if let Some(seq) = self.open.remove(&layer) {
            self.overlays.remove(&seq);
            tracing::trace!(layer, "cleared optimistic layer");
        }
    }

    /// Check if an overlay is open for `layer`.
    #[must_use]
    pub fn is_open(&self, layer: LayerId) -> bool {
        self.open.contains_key(&layer)
    }

    /// Open layer ids, newest first.
    #[must_use]
    pub fn layers(&self) -> Vec<LayerId> {
        self.overlays.values().rev().map(|overlay| overlay.id).collect()
    }

    /// Every key with a visible value, in key order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut candidates: BTreeSet<&str> = self.base.keys().map(String::as_str).collect();
        for overlay in self.overlays.values() {
            candidates.extend(overlay.values.keys().map(String::as_str));
        }
        candidates
            .into_iter()
            .filter(|key| self.contains(key))
            .collect()
    }

    /// Mutable access to the value stored for `key` in exactly one layer
    /// (or the base), inserting `V::default()` if that layer holds nothing
    /// or a tombstone.
    ///
    /// Values in older layers are not copied in.
    pub fn slot_mut(&mut self, key: &str, layer: Option<LayerId>) -> &mut V
    where
        V: Default,
    {
        match layer {
            Some(layer) => {
                let overlay = self.overlay_mut(layer);
                if let Some(None) = overlay.values.get(key) {
                    overlay.revived.insert(key.to_string());
                }
                let slot = overlay.values.entry(key.to_string()).or_insert(None);
                slot.get_or_insert_with(V::default)
            }
            None => self.base.entry(key.to_string()).or_default(),
        }
    }

    /// Open the overlay for `layer` if needed and return it.
    fn overlay_mut(&mut self, layer: LayerId) -> &mut Overlay<V> {
        let seq = match self.open.get(&layer) {
            Some(seq) => *seq,
            None => {
                let seq = self.next_seq;
                self.next_seq = self.next_seq.saturating_add(1);
                self.open.insert(layer, seq);
                tracing::trace!(layer, "opened optimistic layer");
                seq
            }
        };
        self.overlays.entry(seq).or_insert_with(|| Overlay {
            id: layer,
            values: BTreeMap::new(),
            revived: BTreeSet::new(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
