// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use rand::seq::IteratorRandom;
use tokio::{
    sync::{OwnedRwLockWriteGuard, RwLock},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    clock::Clock,
    store::value::Value,
};

/// Keys sampled per sweep tick.
const SWEEP_SAMPLE: usize = 20;

/// One committed keyspace record. `expires_at = None` means no key-level TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub value: Value,
    pub expires_at: Option<SystemTime>,
}

type Slot = Arc<RwLock<Option<Record>>>;

/// The shared in-memory store.
///
/// Every key owns a logical read-write lock (the `RwLock` inside its slot).
/// Multi-key operations acquire slots in sorted key order and release them
/// all on return, so concurrent handlers cannot deadlock. Slot creation for
/// missing keys is funneled through a keyspace-wide latch held only for the
/// map-insert instant.
#[derive(Debug)]
pub struct Keyspace {
    entries: DashMap<String, Slot>,
    create_latch: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl Keyspace {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            create_latch: Mutex::new(()),
            clock,
        })
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Pure read: whether each key currently resolves to a live record.
    pub async fn keys_exist(&self, keys: &[String]) -> HashMap<String, bool> {
        let mut out = HashMap::with_capacity(keys.len());
        let now = self.clock.now();
        let mut purge = Vec::new();

        for key in keys {
            if out.contains_key(key) {
                continue;
            }
            let exists = match self.slot(key) {
                None => false,
                Some(slot) => {
                    let guard = slot.clone().read_owned().await;
                    let (value, needs_purge) = match &*guard {
                        Some(rec) => live_view(rec, now),
                        None => (None, false),
                    };
                    if needs_purge {
                        purge.push(key.clone());
                    }
                    value.is_some()
                },
            };
            out.insert(key.clone(), exists);
        }

        for key in purge {
            self.purge_expired(&key).await;
        }
        out
    }

    /// Shared-mode batch read. Guards for every requested key are held in
    /// sorted order until all values are cloned out, so the caller sees one
    /// consistent snapshot across the set.
    pub async fn get_values(
        &self,
        keys: &[String],
    ) -> HashMap<String, Option<Value>> {
        let sorted = sorted_unique(keys);
        let now = self.clock.now();
        let mut out = HashMap::with_capacity(sorted.len());
        let mut purge = Vec::new();
        let mut guards = Vec::with_capacity(sorted.len());

        for key in &sorted {
            match self.slot(key) {
                None => {
                    out.insert(key.clone(), None);
                },
                Some(slot) => {
                    let guard = slot.clone().read_owned().await;
                    let (value, needs_purge) = match &*guard {
                        Some(rec) => live_view(rec, now),
                        None => (None, false),
                    };
                    if needs_purge {
                        purge.push(key.clone());
                    }
                    out.insert(key.clone(), value);
                    guards.push(guard);
                },
            }
        }

        drop(guards);
        for key in purge {
            self.purge_expired(&key).await;
        }
        out
    }

    /// Exclusive-mode batch write: installs every entry atomically across the
    /// set. A pre-existing key-level TTL survives the overwrite; empty
    /// aggregates (a hash whose last field was removed, a drained set, ...)
    /// delete the record instead.
    pub async fn set_values(&self, entries: HashMap<String, Value>) {
        let keys: Vec<String> = {
            let mut keys: Vec<String> = entries.keys().cloned().collect();
            keys.sort_unstable();
            keys
        };

        let mut guards: Vec<(String, Slot, OwnedRwLockWriteGuard<Option<Record>>)> =
            Vec::with_capacity(keys.len());
        for key in keys {
            let (slot, guard) = self.write_slot(&key).await;
            guards.push((key, slot, guard));
        }

        let now = self.clock.now();
        for (key, slot, guard) in &mut guards {
            let Some(value) = entries.get(key) else {
                continue;
            };
            if is_dead_value(value) {
                **guard = None;
                self.remove_entry(key, slot);
                continue;
            }
            let expires_at = guard
                .as_ref()
                .filter(|rec| !record_expired(rec, now))
                .and_then(|rec| rec.expires_at);
            **guard = Some(Record {
                value: value.clone(),
                expires_at,
            });
        }
    }

    /// Key-level TTL of a live record, `None` when the key is missing or has
    /// no expiry.
    pub async fn get_expiry(&self, key: &str) -> Option<SystemTime> {
        let slot = self.slot(key)?;
        let guard = slot.clone().read_owned().await;
        let now = self.clock.now();
        match &*guard {
            Some(rec) if !record_expired(rec, now) => rec.expires_at,
            Some(_) => {
                drop(guard);
                self.purge_expired(key).await;
                None
            },
            None => None,
        }
    }

    /// Installs (or clears, with `at = None`) the key-level TTL. Returns
    /// false when the key does not exist. `touch` is accepted for the
    /// eviction-accounting contract and is inert under `noeviction`.
    pub async fn set_expiry(
        &self,
        key: &str,
        at: Option<SystemTime>,
        _touch: bool,
    ) -> bool {
        let Some(slot) = self.slot(key) else {
            return false;
        };
        let mut guard = slot.clone().write_owned().await;
        let now = self.clock.now();
        match guard.as_mut() {
            Some(rec) if !record_expired(rec, now) => {
                rec.expires_at = at;
                true
            },
            _ => false,
        }
    }

    pub async fn remove_expiry(&self, key: &str) -> bool {
        self.set_expiry(key, None, false).await
    }

    /// Removes the record. Returns whether a live record existed.
    pub async fn delete_key(&self, key: &str) -> bool {
        let Some(slot) = self.slot(key) else {
            return false;
        };
        let mut guard = slot.clone().write_owned().await;
        let now = self.clock.now();
        let existed = guard
            .as_ref()
            .map(|rec| !record_expired(rec, now))
            .unwrap_or(false);
        *guard = None;
        self.remove_entry(key, &slot);
        existed
    }

    /// Samples a handful of keys on an interval and drops whatever has
    /// expired, so TTLs fire even on keys no client touches again.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        cancel: CancellationToken,
        interval: Duration,
    ) -> JoinHandle<()> {
        let ks = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        let sample: Vec<String> = {
                            let mut rng = rand::rng();
                            ks.entries
                                .iter()
                                .map(|e| e.key().clone())
                                .choose_multiple(&mut rng, SWEEP_SAMPLE)
                        };
                        for key in sample {
                            ks.purge_expired(&key).await;
                        }
                    },
                }
            }
            debug!("keyspace sweeper stopped");
        })
    }

    fn slot(&self, key: &str) -> Option<Slot> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    fn slot_or_create(&self, key: &str) -> Slot {
        if let Some(slot) = self.slot(key) {
            return slot;
        }
        let _latch = self
            .create_latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            self.entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(None)))
                .value(),
        )
    }

    /// Write-locks the key's slot, retrying if the slot was detached from the
    /// map (concurrent delete) between fetch and lock.
    async fn write_slot(
        &self,
        key: &str,
    ) -> (Slot, OwnedRwLockWriteGuard<Option<Record>>) {
        loop {
            let slot = self.slot_or_create(key);
            let guard = Arc::clone(&slot).write_owned().await;
            let still_current = self
                .entries
                .get(key)
                .map(|e| Arc::ptr_eq(e.value(), &slot))
                .unwrap_or(false);
            if still_current {
                return (slot, guard);
            }
        }
    }

    /// Unlinks `slot` from the map if it is still the current one. Caller
    /// holds the slot's write guard.
    fn remove_entry(&self, key: &str, slot: &Slot) {
        let _latch = self
            .create_latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.entries
            .remove_if(key, |_, current| Arc::ptr_eq(current, slot));
    }

    /// Drops an expired record, or the expired fields of a live hash.
    async fn purge_expired(&self, key: &str) {
        let Some(slot) = self.slot(key) else {
            return;
        };
        let mut guard = Arc::clone(&slot).write_owned().await;
        let now = self.clock.now();
        let clear = match guard.as_mut() {
            None => false,
            Some(rec) if record_expired(rec, now) => true,
            Some(rec) => match &mut rec.value {
                Value::Hash(fields) => {
                    fields.retain(|_, f| !f.expired(now));
                    fields.is_empty()
                },
                _ => false,
            },
        };
        if clear {
            *guard = None;
            self.remove_entry(key, &slot);
        }
    }
}

fn record_expired(rec: &Record, now: SystemTime) -> bool {
    matches!(rec.expires_at, Some(at) if at <= now)
}

/// Clones the value a reader is allowed to see at `now`, flagging whether the
/// stored record carries expired data worth purging.
fn live_view(rec: &Record, now: SystemTime) -> (Option<Value>, bool) {
    if record_expired(rec, now) {
        return (None, true);
    }
    match &rec.value {
        Value::Hash(fields) => {
            let had = fields.len();
            let live: HashMap<_, _> = fields
                .iter()
                .filter(|(_, f)| !f.expired(now))
                .map(|(k, f)| (k.clone(), f.clone()))
                .collect();
            let dirty = live.len() != had;
            if live.is_empty() {
                (None, dirty)
            } else {
                (Some(Value::Hash(live)), dirty)
            }
        },
        other => (Some(other.clone()), false),
    }
}

fn is_dead_value(value: &Value) -> bool {
    match value {
        Value::Hash(h) => h.is_empty(),
        Value::Set(s) => s.is_empty(),
        Value::SortedSet(z) => z.is_empty(),
        Value::List(l) => l.is_empty(),
        _ => false,
    }
}

fn sorted_unique(keys: &[String]) -> Vec<String> {
    let mut sorted: Vec<String> = keys.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}
