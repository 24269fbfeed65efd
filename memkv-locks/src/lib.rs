//! A fixed-size table of reader-writer locks, addressed by hashing keys to
//! slots. Multi-key commands acquire the slots covering several keys at
//! once through [`LockTable::lock_many`], which orders acquisition by
//! ascending slot index so that no interleaving of concurrent callers can
//! deadlock.
//!
//! Because distinct keys can share a slot, this provides per-slot
//! granularity rather than per-key granularity; two unrelated keys that
//! hash to the same slot will serialize against each other. That
//! false-sharing cost buys a fixed, small number of lock objects instead
//! of one per key.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use memkv_util::fnv1a32;

/// Default slot count from the original design; must stay a power of two.
pub const DEFAULT_SIZE: usize = 1024;

/// A table of `size` (power-of-two) reader-writer locks.
pub struct LockTable {
    slots: Vec<RwLock<()>>,
    mask: usize,
}

impl LockTable {
    /// Creates a table with `size` slots. `size` must be a power of two.
    pub fn new(size: usize) -> Self {
        assert!(size.is_power_of_two(), "lock table size must be a power of two");
        Self {
            slots: (0..size).map(|_| RwLock::new(())).collect(),
            mask: size - 1,
        }
    }

    fn slot_of(&self, key: &str) -> usize {
        (fnv1a32(key.as_bytes()) as usize) & self.mask
    }

    /// Acquires the slot for `key` exclusively.
    pub fn lock<'a>(&'a self, key: &str) -> RwLockWriteGuard<'a, ()> {
        self.slots[self.slot_of(key)].write()
    }

    /// Acquires the slot for `key` in shared mode.
    pub fn rlock<'a>(&'a self, key: &str) -> RwLockReadGuard<'a, ()> {
        self.slots[self.slot_of(key)].read()
    }

    /// Acquires, in one call, every slot implicated by `write_keys` (each
    /// exclusive) and every slot implicated only by `read_keys` (each
    /// shared). A slot touched by both a write key and a read key is
    /// upgraded to exclusive. Slots are locked in ascending index order;
    /// releasing (dropping the returned guard) happens in descending order,
    /// so `lock_many` is deadlock-free under any interleaving of
    /// concurrent callers.
    pub fn lock_many<'a>(&'a self, write_keys: &[String], read_keys: &[String]) -> MultiGuard<'a> {
        let mut write_slots: Vec<usize> = write_keys.iter().map(|k| self.slot_of(k)).collect();
        write_slots.sort_unstable();
        write_slots.dedup();

        let mut read_slots: Vec<usize> = read_keys
            .iter()
            .map(|k| self.slot_of(k))
            .filter(|s| write_slots.binary_search(s).is_err())
            .collect();
        read_slots.sort_unstable();
        read_slots.dedup();

        let mut plan: Vec<(usize, bool)> = write_slots
            .into_iter()
            .map(|s| (s, true))
            .chain(read_slots.into_iter().map(|s| (s, false)))
            .collect();
        plan.sort_unstable_by_key(|(slot, _)| *slot);

        let mut guards = Vec::with_capacity(plan.len());
        for (slot, exclusive) in plan {
            if exclusive {
                guards.push(SlotGuard::Write(self.slots[slot].write()));
            } else {
                guards.push(SlotGuard::Read(self.slots[slot].read()));
            }
        }
        MultiGuard { guards }
    }
}

enum SlotGuard<'a> {
    Read(RwLockReadGuard<'a, ()>),
    Write(RwLockWriteGuard<'a, ()>),
}

/// RAII handle for the slots acquired by [`LockTable::lock_many`]. Dropping
/// it (or calling [`MultiGuard::unlock`] explicitly) releases the slots in
/// descending index order, the inverse of acquisition.
pub struct MultiGuard<'a> {
    guards: Vec<SlotGuard<'a>>,
}

impl MultiGuard<'_> {
    /// Releases all held slots. Equivalent to dropping the guard, spelled
    /// out for call sites that want the release to be visible at the call
    /// site (matching `unlock_many` in the original design).
    pub fn unlock(self) {
        drop(self)
    }
}

impl Drop for MultiGuard<'_> {
    fn drop(&mut self) {
        while self.guards.pop().is_some() {
            // Popping from the back releases the highest slot index first,
            // i.e. descending order relative to the ascending acquisition
            // order built in `lock_many`.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_key_lock_unlock() {
        let table = LockTable::new(16);
        let g = table.lock("a");
        drop(g);
        let _g2 = table.rlock("a");
    }

    #[test]
    fn lock_many_is_reentrant_safe_across_threads() {
        // Exercise lock_many under many random key sets from many threads;
        // if acquisition order were inconsistent this would deadlock and
        // the test would hang rather than fail cleanly.
        let table = Arc::new(LockTable::new(16));
        let mut handles = Vec::new();
        for t in 0..8 {
            let table = Arc::clone(&table);
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    let keys: Vec<String> = (0..5)
                        .map(|k| format!("key{}", (t * 7 + i * 3 + k) % 20))
                        .collect();
                    let (writes, reads) = keys.split_at(2);
                    let _guard = table.lock_many(&writes.to_vec(), &reads.to_vec());
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn overlapping_write_and_read_key_upgrades_to_exclusive() {
        let table = LockTable::new(16);
        let writes = vec!["shared".to_string()];
        let reads = vec!["shared".to_string()];
        // Should not panic or double-lock a slot: the read key is filtered
        // out because its slot is already claimed as a write slot.
        let _guard = table.lock_many(&writes, &reads);
    }
}
