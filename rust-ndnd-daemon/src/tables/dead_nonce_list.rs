//! Dead Nonce List: a bounded set of recent (name, nonce) fingerprints.
//!
//! Each addition is hashed to a 64-bit fingerprint and appended to a FIFO
//! queue with a capacity tuned at runtime: a mark value is enqueued at a
//! fixed interval, and the number of marks present in the queue measures how
//! long entries actually survive. Too few marks means entries are evicted
//! before the configured lifetime and the capacity grows; too many means
//! memory is wasted and it shrinks.

use std::collections::hash_map::RandomState;
use std::collections::{HashMap, VecDeque};
use std::hash::{BuildHasher, Hash, Hasher};
use std::time::Duration;

use log::trace;
use rust_ndnd_common::Name;

/// Minimum entry lifetime.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(6);

/// Marks expected in the queue when capacity matches the arrival rate.
const EXPECTED_MARK_COUNT: usize = 5;

const INITIAL_CAPACITY: usize = 1 << 7;
const MIN_CAPACITY: usize = 1 << 6;
const MAX_CAPACITY: usize = 1 << 24;

/// Reserved fingerprint used as the mark.
const MARK: u64 = 0;

pub struct DeadNonceList {
    lifetime: Duration,
    capacity: usize,
    queue: VecDeque<u64>,
    // fingerprint -> occurrence count (collisions within the queue are legal)
    index: HashMap<u64, u32>,
    n_marks: usize,
    hasher: RandomState,
}

impl DeadNonceList {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            capacity: INITIAL_CAPACITY,
            queue: VecDeque::new(),
            index: HashMap::new(),
            n_marks: 0,
            hasher: RandomState::new(),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Interval at which the housekeeping timer must call [`Self::mark`].
    pub fn mark_interval(&self) -> Duration {
        self.lifetime / EXPECTED_MARK_COUNT as u32
    }

    /// Number of nonce entries (marks excluded).
    pub fn size(&self) -> usize {
        self.queue.len() - self.n_marks
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn fingerprint(&self, name: &Name, nonce: u32) -> u64 {
        let mut hasher = self.hasher.build_hasher();
        name.hash(&mut hasher);
        nonce.hash(&mut hasher);
        // fingerprint 0 is reserved for the mark
        hasher.finish().max(1)
    }

    pub fn has(&self, name: &Name, nonce: u32) -> bool {
        self.index.contains_key(&self.fingerprint(name, nonce))
    }

    pub fn add(&mut self, name: &Name, nonce: u32) {
        let fingerprint = self.fingerprint(name, nonce);
        self.queue.push_back(fingerprint);
        *self.index.entry(fingerprint).or_insert(0) += 1;
        self.evict_over_capacity();
    }

    /// Enqueues a mark and retunes the capacity; driven by the forwarder's
    /// housekeeping timer every [`Self::mark_interval`].
    pub fn mark(&mut self) {
        self.queue.push_back(MARK);
        self.n_marks += 1;
        self.adjust_capacity();
        self.evict_over_capacity();
    }

    fn adjust_capacity(&mut self) {
        if self.n_marks < EXPECTED_MARK_COUNT {
            // entries are evicted before their lifetime elapses; grow
            self.capacity = (self.capacity * 6 / 5).min(MAX_CAPACITY);
            trace!("dead-nonce-list: capacity up to {}", self.capacity);
        } else if self.n_marks > EXPECTED_MARK_COUNT {
            self.capacity = (self.capacity * 4 / 5).max(MIN_CAPACITY);
            trace!("dead-nonce-list: capacity down to {}", self.capacity);
        }
    }

    fn evict_over_capacity(&mut self) {
        while self.queue.len() > self.capacity {
            let Some(fingerprint) = self.queue.pop_front() else {
                break;
            };
            if fingerprint == MARK {
                self.n_marks -= 1;
            } else if let Some(count) = self.index.get_mut(&fingerprint) {
                *count -= 1;
                if *count == 0 {
                    self.index.remove(&fingerprint);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_nonce_is_found() {
        let mut dnl = DeadNonceList::new(DEFAULT_LIFETIME);
        let name = Name::from_string("/A");
        dnl.add(&name, 732);
        assert!(dnl.has(&name, 732));
        assert!(!dnl.has(&name, 944));
        assert!(!dnl.has(&Name::from_string("/B"), 732));
        assert_eq!(dnl.size(), 1);
    }

    #[test]
    fn entries_survive_at_least_the_tuned_window() {
        let mut dnl = DeadNonceList::new(DEFAULT_LIFETIME);
        let name = Name::from_string("/A");
        dnl.add(&name, 1);
        // five marks = one full lifetime with no pressure: entry still present
        for _ in 0..EXPECTED_MARK_COUNT {
            dnl.mark();
        }
        assert!(dnl.has(&name, 1));
    }

    #[test]
    fn capacity_grows_under_pressure() {
        let mut dnl = DeadNonceList::new(DEFAULT_LIFETIME);
        let before = dnl.capacity();
        let name = Name::from_string("/A");
        // overflow the queue so marks are evicted early
        for nonce in 0..(2 * before as u32) {
            dnl.add(&name, nonce);
        }
        dnl.mark();
        assert!(dnl.capacity() > before);
    }

    #[test]
    fn capacity_shrinks_when_idle() {
        let mut dnl = DeadNonceList::new(DEFAULT_LIFETIME);
        for _ in 0..(EXPECTED_MARK_COUNT + 2) {
            dnl.mark();
        }
        assert!(dnl.capacity() < INITIAL_CAPACITY);
        assert!(dnl.capacity() >= MIN_CAPACITY);
    }
}
