//! Content Store: in-network cache of Data packets.
//!
//! Entries are keyed by the Data's full name (implicit digest included) in a
//! sorted map, so prefix queries are range scans. Eviction uses a priority
//! queue ordered by (staleness deadline, arrival time): stale entries leave
//! first. Lookup uses a callback interface because a store may need disk or
//! cooperative yielding; this implementation answers on the same turn.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::rc::Rc;
use std::time::Instant;

use log::{debug, trace};
use rust_ndnd_common::{Data, Interest, Name};

/// Default capacity in packets.
pub const DEFAULT_CAPACITY: usize = 65536;

struct CsEntry {
    data: Data,
    is_unsolicited: bool,
    arrival: Instant,
    staleness_deadline: Instant,
}

impl CsEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.staleness_deadline
    }
}

struct CsInner {
    capacity: usize,
    entries: BTreeMap<Name, CsEntry>,
    // eviction candidates; entries may be superseded, so each popped
    // candidate is validated against the live map
    eviction_queue: BinaryHeap<Reverse<(Instant, Instant, Name)>>,
}

impl CsInner {
    fn evict_one(&mut self) {
        while let Some(Reverse((staleness_deadline, arrival, name))) = self.eviction_queue.pop() {
            let live = self
                .entries
                .get(&name)
                .map(|e| e.staleness_deadline == staleness_deadline && e.arrival == arrival)
                .unwrap_or(false);
            if live {
                trace!("cs: evict {}", name);
                self.entries.remove(&name);
                return;
            }
        }
    }
}

#[derive(Clone)]
pub struct Cs {
    inner: Rc<RefCell<CsInner>>,
}

impl Cs {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CsInner {
                capacity,
                entries: BTreeMap::new(),
                eviction_queue: BinaryHeap::new(),
            })),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity
    }

    /// Shrinking below the current size evicts immediately.
    pub fn set_capacity(&self, capacity: usize, _now: Instant) {
        let mut inner = self.inner.borrow_mut();
        inner.capacity = capacity;
        while inner.entries.len() > inner.capacity {
            inner.evict_one();
        }
    }

    /// Inserts `data`; a same-name entry is replaced and its unsolicited flag
    /// refreshed.
    pub fn insert(&self, data: Data, is_unsolicited: bool, now: Instant) {
        let mut inner = self.inner.borrow_mut();
        if inner.capacity == 0 {
            return;
        }
        let full_name = data.full_name();
        let staleness_deadline = now + data.freshness_period;
        debug!("cs: insert {} unsolicited={}", full_name, is_unsolicited);
        inner
            .eviction_queue
            .push(Reverse((staleness_deadline, now, full_name.clone())));
        inner.entries.insert(
            full_name,
            CsEntry {
                data,
                is_unsolicited,
                arrival: now,
                staleness_deadline,
            },
        );
        while inner.entries.len() > inner.capacity {
            inner.evict_one();
        }
    }

    /// Looks `interest` up and invokes exactly one of the callbacks. The
    /// match is the leftmost stored Data whose full name the Interest
    /// matches; a stale entry is returned unless `MustBeFresh` forbids.
    pub fn find(
        &self,
        interest: &Interest,
        now: Instant,
        on_hit: impl FnOnce(&Interest, Data),
        on_miss: impl FnOnce(&Interest),
    ) {
        let found = self.find_impl(interest, now);
        match found {
            Some(data) => on_hit(interest, data),
            None => on_miss(interest),
        }
    }

    fn find_impl(&self, interest: &Interest, now: Instant) -> Option<Data> {
        let inner = self.inner.borrow();
        for (full_name, entry) in inner.entries.range(interest.name.clone()..) {
            if !interest.name.is_prefix_of(full_name) {
                break;
            }
            let name_matches = interest.matches_data_name(&entry.data.name)
                || interest.name == *full_name;
            if !name_matches {
                continue;
            }
            if interest.selectors.must_be_fresh && !entry.is_fresh(now) {
                continue;
            }
            return Some(entry.data.clone());
        }
        None
    }

    /// Erases entries under `prefix`; returns how many were erased.
    pub fn erase_under(&self, prefix: &Name) -> usize {
        let mut inner = self.inner.borrow_mut();
        let victims: Vec<Name> = inner
            .entries
            .range(prefix.clone()..)
            .take_while(|(name, _)| prefix.is_prefix_of(name))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &victims {
            inner.entries.remove(name);
        }
        victims.len()
    }

    /// Whether the entry stored under exactly `data`'s full name is marked
    /// unsolicited.
    pub fn is_unsolicited(&self, data: &Data) -> Option<bool> {
        self.inner
            .borrow()
            .entries
            .get(&data.full_name())
            .map(|e| e.is_unsolicited)
    }
}
