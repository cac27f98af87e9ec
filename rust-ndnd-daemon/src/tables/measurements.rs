//! Measurements table: per-prefix scratch state for strategies.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use rust_ndnd_common::Name;

use super::name_tree::NameTree;
use crate::fw::strategy_info::StrategyInfoStore;

/// Lifetime granted to an entry on creation; strategies extend it.
pub const INITIAL_LIFETIME: Duration = Duration::from_secs(4);

pub struct Entry {
    name: Name,
    pub expiry: Instant,
    pub strategy_info: StrategyInfoStore,
}

impl Entry {
    pub fn name(&self) -> &Name {
        &self.name
    }
}

#[derive(Clone)]
pub struct Measurements {
    tree: NameTree,
    n_items: Rc<Cell<usize>>,
}

impl Measurements {
    pub fn new(tree: NameTree) -> Self {
        Self {
            tree,
            n_items: Rc::new(Cell::new(0)),
        }
    }

    pub fn size(&self) -> usize {
        self.n_items.get()
    }

    /// Finds or creates the entry for `name`.
    pub fn get(&self, name: &Name, now: Instant) -> Rc<RefCell<Entry>> {
        let node = self.tree.lookup(name);
        let existing = self.tree.with_node(node, |n| n.measurements_entry.clone());
        if let Some(entry) = existing {
            return entry;
        }
        let entry = Rc::new(RefCell::new(Entry {
            name: name.clone(),
            expiry: now + INITIAL_LIFETIME,
            strategy_info: StrategyInfoStore::new(),
        }));
        self.tree
            .with_node_mut(node, |n| n.measurements_entry = Some(Rc::clone(&entry)));
        self.n_items.set(self.n_items.get() + 1);
        entry
    }

    /// Finds or creates the entry for `child`'s parent name. The root entry
    /// is its own parent.
    pub fn get_parent(&self, child: &Rc<RefCell<Entry>>, now: Instant) -> Rc<RefCell<Entry>> {
        let name = child.borrow().name.parent();
        self.get(&name, now)
    }

    pub fn find_exact_match(&self, name: &Name) -> Option<Rc<RefCell<Entry>>> {
        self.tree
            .find_exact_match(name)
            .and_then(|node| self.tree.with_node(node, |n| n.measurements_entry.clone()))
    }

    pub fn find_longest_prefix_match(
        &self,
        name: &Name,
        predicate: impl Fn(&Entry) -> bool,
    ) -> Option<Rc<RefCell<Entry>>> {
        self.tree
            .find_longest_prefix_match(name, |node| {
                node.measurements_entry
                    .as_ref()
                    .map(|entry| predicate(&entry.borrow()))
                    .unwrap_or(false)
            })
            .and_then(|node| self.tree.with_node(node, |n| n.measurements_entry.clone()))
    }

    /// Keeps `entry` alive until at least `now + lifetime`.
    pub fn extend_lifetime(&self, entry: &Rc<RefCell<Entry>>, lifetime: Duration, now: Instant) {
        let mut entry = entry.borrow_mut();
        let deadline = now + lifetime;
        if entry.expiry < deadline {
            entry.expiry = deadline;
        }
    }

    /// Erases expired entries; called from the forwarder's housekeeping
    /// timer.
    pub fn cleanup_expired(&self, now: Instant) {
        for node in self.tree.all_nodes() {
            // GC of an earlier node may have reclaimed this one already
            if !self.tree.contains(node) {
                continue;
            }
            let expired = self.tree.with_node(node, |n| {
                n.measurements_entry
                    .as_ref()
                    .map(|entry| entry.borrow().expiry <= now)
                    .unwrap_or(false)
            });
            if expired {
                self.tree.with_node_mut(node, |n| n.measurements_entry = None);
                self.n_items.set(self.n_items.get() - 1);
                self.tree.cleanup_if_empty(node);
            }
        }
    }
}

/// A strategy's window onto the Measurements table. Every method applies
/// the authority filter: an entry whose effective strategy is not the
/// holder yields `None`. The filter is re-evaluated on each call, so a
/// strategy-choice change during iteration cannot leak foreign entries.
pub struct MeasurementsAccessor {
    measurements: Measurements,
    strategy_choice: super::StrategyChoice,
    strategy_name: Name,
}

impl MeasurementsAccessor {
    pub fn new(
        measurements: Measurements,
        strategy_choice: super::StrategyChoice,
        strategy_name: Name,
    ) -> Self {
        Self {
            measurements,
            strategy_choice,
            strategy_name,
        }
    }

    fn filter(&self, entry: Rc<RefCell<Entry>>) -> Option<Rc<RefCell<Entry>>> {
        let effective = {
            let entry = entry.borrow();
            self.strategy_choice.find_effective_strategy_name(entry.name())
        };
        (effective.as_ref() == Some(&self.strategy_name)).then_some(entry)
    }

    pub fn get(&self, name: &Name, now: Instant) -> Option<Rc<RefCell<Entry>>> {
        self.filter(self.measurements.get(name, now))
    }

    pub fn get_parent(&self, child: &Rc<RefCell<Entry>>, now: Instant) -> Option<Rc<RefCell<Entry>>> {
        self.filter(self.measurements.get_parent(child, now))
    }

    pub fn find_exact_match(&self, name: &Name) -> Option<Rc<RefCell<Entry>>> {
        self.measurements
            .find_exact_match(name)
            .and_then(|entry| self.filter(entry))
    }

    pub fn find_longest_prefix_match(
        &self,
        name: &Name,
        predicate: impl Fn(&Entry) -> bool,
    ) -> Option<Rc<RefCell<Entry>>> {
        self.measurements
            .find_longest_prefix_match(name, predicate)
            .and_then(|entry| self.filter(entry))
    }

    pub fn extend_lifetime(&self, entry: &Rc<RefCell<Entry>>, lifetime: Duration, now: Instant) {
        self.measurements.extend_lifetime(entry, lifetime, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_creates_then_reuses() {
        let measurements = Measurements::new(NameTree::new());
        let now = Instant::now();
        let entry1 = measurements.get(&Name::from_string("/A"), now);
        let entry2 = measurements.get(&Name::from_string("/A"), now);
        assert!(Rc::ptr_eq(&entry1, &entry2));
        assert_eq!(measurements.size(), 1);
    }

    #[test]
    fn parent_walks_up_one_component() {
        let measurements = Measurements::new(NameTree::new());
        let now = Instant::now();
        let child = measurements.get(&Name::from_string("/A/B"), now);
        let parent = measurements.get_parent(&child, now);
        assert_eq!(parent.borrow().name().to_string(), "/A");

        let root = measurements.get(&Name::new(), now);
        let root_parent = measurements.get_parent(&root, now);
        assert!(Rc::ptr_eq(&root, &root_parent));
    }

    #[test]
    fn expired_entries_are_erased() {
        let measurements = Measurements::new(NameTree::new());
        let now = Instant::now();
        let entry = measurements.get(&Name::from_string("/A"), now);
        measurements.extend_lifetime(&entry, Duration::from_secs(60), now);
        measurements.get(&Name::from_string("/B"), now);
        drop(entry);

        measurements.cleanup_expired(now + INITIAL_LIFETIME + Duration::from_secs(1));
        assert_eq!(measurements.size(), 1);
        assert!(measurements.find_exact_match(&Name::from_string("/A")).is_some());
        assert!(measurements.find_exact_match(&Name::from_string("/B")).is_none());
    }
}
