//! Forwarding Information Base: prefix → ordered nexthop list.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;
use rust_ndnd_common::Name;

use super::name_tree::NameTree;
use crate::face::FaceId;
use crate::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub face: FaceId,
    pub cost: u64,
}

pub struct Entry {
    name: Name,
    next_hops: Vec<NextHop>,
}

impl Entry {
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Nexthops sorted ascending by cost.
    pub fn next_hops(&self) -> &[NextHop] {
        &self.next_hops
    }

    pub fn has_next_hops(&self) -> bool {
        !self.next_hops.is_empty()
    }

    pub fn next_hop_for(&self, face: FaceId) -> Option<&NextHop> {
        self.next_hops.iter().find(|nh| nh.face == face)
    }

    /// Adds a nexthop, or updates the cost of an existing one in place.
    /// Returns true when the nexthop is newly created.
    fn add_or_update(&mut self, face: FaceId, cost: u64) -> bool {
        let is_new = match self.next_hops.iter_mut().find(|nh| nh.face == face) {
            Some(next_hop) => {
                next_hop.cost = cost;
                false
            }
            None => {
                self.next_hops.push(NextHop { face, cost });
                true
            }
        };
        self.next_hops.sort_by_key(|nh| nh.cost);
        is_new
    }

    fn remove(&mut self, face: FaceId) -> bool {
        let before = self.next_hops.len();
        self.next_hops.retain(|nh| nh.face != face);
        self.next_hops.len() != before
    }
}

#[derive(Clone)]
pub struct Fib {
    tree: NameTree,
    n_items: Rc<Cell<usize>>,
    after_new_next_hop: Signal<(Name, NextHop)>,
}

impl Fib {
    pub fn new(tree: NameTree) -> Self {
        Self {
            tree,
            n_items: Rc::new(Cell::new(0)),
            after_new_next_hop: Signal::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.n_items.get()
    }

    /// Fires when a nexthop is newly created, not when its cost is updated.
    pub fn after_new_next_hop(&self) -> &Signal<(Name, NextHop)> {
        &self.after_new_next_hop
    }

    /// Finds or creates the entry for `prefix`.
    pub fn insert(&self, prefix: &Name) -> (Rc<RefCell<Entry>>, bool) {
        let node = self.tree.lookup(prefix);
        let existing = self.tree.with_node(node, |n| n.fib_entry.clone());
        if let Some(entry) = existing {
            return (entry, false);
        }
        let entry = Rc::new(RefCell::new(Entry {
            name: prefix.clone(),
            next_hops: Vec::new(),
        }));
        self.tree
            .with_node_mut(node, |n| n.fib_entry = Some(Rc::clone(&entry)));
        self.n_items.set(self.n_items.get() + 1);
        (entry, true)
    }

    pub fn find_exact_match(&self, prefix: &Name) -> Option<Rc<RefCell<Entry>>> {
        self.tree
            .find_exact_match(prefix)
            .and_then(|node| self.tree.with_node(node, |n| n.fib_entry.clone()))
    }

    pub fn find_longest_prefix_match(&self, name: &Name) -> Option<Rc<RefCell<Entry>>> {
        self.tree
            .find_longest_prefix_match(name, |node| node.fib_entry.is_some())
            .and_then(|node| self.tree.with_node(node, |n| n.fib_entry.clone()))
    }

    pub fn erase(&self, prefix: &Name) -> bool {
        let Some(node) = self.tree.find_exact_match(prefix) else {
            return false;
        };
        let removed = self.tree.with_node_mut(node, |n| n.fib_entry.take());
        if removed.is_some() {
            self.n_items.set(self.n_items.get() - 1);
            self.tree.cleanup_if_empty(node);
            true
        } else {
            false
        }
    }

    /// Adds or updates a nexthop on the entry at `prefix`, creating the entry
    /// if needed. Returns true when the nexthop is newly created.
    pub fn add_or_update_next_hop(&self, prefix: &Name, face: FaceId, cost: u64) -> bool {
        let (entry, _) = self.insert(prefix);
        let is_new = entry.borrow_mut().add_or_update(face, cost);
        if is_new {
            debug!("fib: add nexthop {} face={} cost={}", prefix, face, cost);
            self.after_new_next_hop
                .emit(&(prefix.clone(), NextHop { face, cost }));
        }
        is_new
    }

    /// Removes the nexthop toward `face`; erases the entry when it was the
    /// last one. Returns true when the nexthop existed.
    pub fn remove_next_hop(&self, prefix: &Name, face: FaceId) -> bool {
        let Some(entry) = self.find_exact_match(prefix) else {
            return false;
        };
        let (removed, now_empty) = {
            let mut entry = entry.borrow_mut();
            let removed = entry.remove(face);
            (removed, !entry.has_next_hops())
        };
        if now_empty {
            self.erase(prefix);
        }
        removed
    }

    /// Drops every nexthop toward a removed face, erasing entries that end up
    /// with none.
    pub fn remove_next_hop_from_all_entries(&self, face: FaceId) {
        for entry in self.entries() {
            let prefix = entry.borrow().name.clone();
            if entry.borrow().next_hop_for(face).is_some() {
                self.remove_next_hop(&prefix, face);
            }
        }
    }

    /// Every FIB entry. Enumeration order is unspecified.
    pub fn entries(&self) -> Vec<Rc<RefCell<Entry>>> {
        self.tree
            .all_nodes()
            .into_iter()
            .filter_map(|node| self.tree.with_node(node, |n| n.fib_entry.clone()))
            .collect()
    }
}
