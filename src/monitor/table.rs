//! The shared first-contact table.
//!
//! Maps every observed [`FlowKey`] to the instant it was last seen. The map is
//! private behind a single `Mutex`; callers only get locked operations, each of
//! which does its whole scan or update inside one critical section and hands
//! back plain copied values.
//!
//! Callers pass `now` explicitly. A worker samples the clock once per cycle so
//! every entry in that cycle is judged against the same reference time.

use crate::monitor::config::{WindowTier, TIER_COUNT};
use crate::monitor::types::{FanOutSnapshot, FlowKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ContactTable {
    entries: Mutex<HashMap<FlowKey, Instant>>,
}

/// Handle shared by the three workers.
pub type SharedTable = Arc<ContactTable>;

impl ContactTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTable {
        Arc::new(Self::new())
    }

    // The map only holds keys and timestamps; a panic elsewhere cannot leave
    // an entry half-written, so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<FlowKey, Instant>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a contact for `key` at `now`.
    ///
    /// Creates the entry on first contact. An existing timestamp is only ever
    /// moved forward. Returns `true` if the key was new.
    pub fn upsert(&self, key: FlowKey, now: Instant) -> bool {
        let mut entries = self.lock();
        match entries.get_mut(&key) {
            Some(seen) => {
                if now > *seen {
                    *seen = now;
                }
                false
            }
            None => {
                entries.insert(key, now);
                true
            }
        }
    }

    /// Counts, per source address, the flows younger than each tier's window.
    ///
    /// The whole table is scanned under one lock acquisition; the returned
    /// snapshot is an independent copy.
    pub fn snapshot(&self, now: Instant, tiers: &[WindowTier; TIER_COUNT]) -> FanOutSnapshot {
        let entries = self.lock();
        let mut snapshot = FanOutSnapshot::new();

        for (key, seen) in entries.iter() {
            let age = now.saturating_duration_since(*seen);
            for (i, tier) in tiers.iter().enumerate() {
                if age < tier.duration {
                    snapshot.entry(key.src_ip.clone()).or_insert([0; TIER_COUNT])[i] += 1;
                }
            }
        }

        snapshot
    }

    /// Removes every entry whose last contact satisfies `pred(key, age)`.
    ///
    /// The victims are collected first and deleted afterwards, both under the
    /// same lock acquisition. Returns the number of removed entries.
    pub fn remove_if<F>(&self, now: Instant, mut pred: F) -> usize
    where
        F: FnMut(&FlowKey, Duration) -> bool,
    {
        let mut entries = self.lock();
        let victims: Vec<FlowKey> = entries
            .iter()
            .filter(|(key, seen)| pred(*key, now.saturating_duration_since(**seen)))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &victims {
            entries.remove(key);
        }
        victims.len()
    }

    /// Removes entries last seen strictly more than `max_age` before `now`.
    pub fn expire(&self, now: Instant, max_age: Duration) -> usize {
        self.remove_if(now, |_, age| age > max_age)
    }

    /// Last contact time of `key`, copied out of the table.
    pub fn last_seen(&self, key: &FlowKey) -> Option<Instant> {
        self.lock().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::config::WINDOW_TIERS;
    use std::thread;

    fn key(src: &str, port: u16) -> FlowKey {
        FlowKey::new(src, "192.168.1.1", port)
    }

    #[test]
    fn repeated_upserts_keep_one_entry() {
        let table = ContactTable::new();
        let t0 = Instant::now();

        assert!(table.upsert(key("10.0.0.1", 80), t0));
        for i in 1..50 {
            assert!(!table.upsert(key("10.0.0.1", 80), t0 + Duration::from_millis(i)));
        }

        assert_eq!(table.len(), 1);
        assert_eq!(table.last_seen(&key("10.0.0.1", 80)), Some(t0 + Duration::from_millis(49)));
    }

    #[test]
    fn timestamps_never_move_backwards() {
        let table = ContactTable::new();
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(10);

        table.upsert(key("10.0.0.1", 80), later);
        table.upsert(key("10.0.0.1", 80), t0);

        assert_eq!(table.last_seen(&key("10.0.0.1", 80)), Some(later));
    }

    #[test]
    fn snapshot_counts_per_window() {
        let table = ContactTable::new();
        let now = Instant::now() + Duration::from_secs(1000);

        table.upsert(key("10.0.0.1", 1), now - Duration::from_millis(200));
        table.upsert(key("10.0.0.1", 2), now - Duration::from_secs(30));
        table.upsert(key("10.0.0.1", 3), now - Duration::from_secs(120));
        table.upsert(key("10.0.0.1", 4), now - Duration::from_secs(400));
        table.upsert(key("10.0.0.2", 1), now);

        let snap = table.snapshot(now, &WINDOW_TIERS);
        assert_eq!(snap["10.0.0.1"], [1, 2, 3]);
        assert_eq!(snap["10.0.0.2"], [1, 1, 1]);
    }

    #[test]
    fn sources_outside_every_window_are_absent() {
        let table = ContactTable::new();
        let now = Instant::now() + Duration::from_secs(1000);
        table.upsert(key("10.0.0.9", 1), now - Duration::from_secs(301));

        assert!(table.snapshot(now, &WINDOW_TIERS).is_empty());
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let table = ContactTable::new();
        let now = Instant::now() + Duration::from_secs(1000);
        table.upsert(key("10.0.0.1", 1), now - Duration::from_secs(1));

        assert_eq!(table.snapshot(now, &WINDOW_TIERS)["10.0.0.1"], [0, 1, 1]);
    }

    #[test]
    fn expire_removes_only_old_entries() {
        let table = ContactTable::new();
        let t0 = Instant::now();

        table.upsert(key("10.0.0.1", 1), t0);
        table.upsert(key("10.0.0.1", 2), t0 + Duration::from_secs(200));
        table.upsert(key("10.0.0.2", 3), t0 + Duration::from_secs(100));

        let removed = table.expire(t0 + Duration::from_secs(400), Duration::from_secs(300));

        assert_eq!(removed, 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.last_seen(&key("10.0.0.1", 1)), None);
    }

    #[test]
    fn remove_if_sees_keys() {
        let table = ContactTable::new();
        let t0 = Instant::now();
        table.upsert(key("10.0.0.1", 1), t0);
        table.upsert(key("10.0.0.2", 1), t0);

        assert_eq!(table.remove_if(t0, |k, _| k.src_ip == "10.0.0.2"), 1);
        assert!(table.last_seen(&key("10.0.0.1", 1)).is_some());
    }

    #[test]
    fn concurrent_writers_share_one_table() {
        let table = ContactTable::shared();
        let now = Instant::now();

        let handles: Vec<_> = (0..4u16)
            .map(|t| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for port in 0..250u16 {
                        table.upsert(key(&format!("10.0.0.{}", t), port), now);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(table.len(), 1000);
        let snap = table.snapshot(now, &WINDOW_TIERS);
        assert!(snap.values().all(|c| *c == [250, 250, 250]));
    }
}
