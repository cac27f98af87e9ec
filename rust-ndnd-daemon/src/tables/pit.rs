//! Pending Interest Table.
//!
//! Entries are keyed on (name, selectors). Each entry tracks one in-record
//! per downstream face and one out-record per upstream face; the nonce of
//! the last Interest seen on each record drives loop detection.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use rust_ndnd_common::{Data, Interest, Nack, Name, Selectors};

use super::name_tree::{NameTree, NodeId};
use crate::face::FaceId;
use crate::fw::strategy_info::StrategyInfoStore;
use crate::runtime::EventId;

#[derive(Debug, Clone)]
pub struct InRecord {
    pub face: FaceId,
    pub nonce: u32,
    pub expiry: Instant,
    pub interest: Interest,
}

#[derive(Debug, Clone)]
pub struct OutRecord {
    pub face: FaceId,
    pub nonce: u32,
    pub expiry: Instant,
    pub incoming_nack: Option<Nack>,
}

pub struct Entry {
    interest: Interest,
    node: NodeId,
    in_records: Vec<InRecord>,
    out_records: Vec<OutRecord>,
    pub expiry_timer: Option<EventId>,
    pub satisfied: bool,
    pub data_freshness: Option<Duration>,
    pub strategy_info: StrategyInfoStore,
}

impl Entry {
    pub fn name(&self) -> &Name {
        &self.interest.name
    }

    pub fn selectors(&self) -> Selectors {
        self.interest.selectors
    }

    /// The representative Interest (the one that created this entry).
    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn can_match(&self, interest: &Interest) -> bool {
        self.interest.name == interest.name && self.interest.selectors == interest.selectors
    }

    /// Whether an incoming Data with this (name, full name) pair satisfies
    /// the entry.
    pub fn can_be_satisfied_by(&self, data: &Data, full_name: &Name) -> bool {
        self.interest.matches_data_name(&data.name) || self.interest.name == *full_name
    }

    pub fn in_records(&self) -> &[InRecord] {
        &self.in_records
    }

    pub fn out_records(&self) -> &[OutRecord] {
        &self.out_records
    }

    pub fn in_record_for(&self, face: FaceId) -> Option<&InRecord> {
        self.in_records.iter().find(|r| r.face == face)
    }

    pub fn out_record_for(&self, face: FaceId) -> Option<&OutRecord> {
        self.out_records.iter().find(|r| r.face == face)
    }

    pub fn out_record_for_mut(&mut self, face: FaceId) -> Option<&mut OutRecord> {
        self.out_records.iter_mut().find(|r| r.face == face)
    }

    /// Creates or refreshes the in-record for `face`.
    pub fn insert_or_update_in_record(
        &mut self,
        face: FaceId,
        interest: &Interest,
        now: Instant,
    ) -> &InRecord {
        let expiry = now + interest.lifetime;
        match self.in_records.iter().position(|r| r.face == face) {
            Some(pos) => {
                let record = &mut self.in_records[pos];
                record.nonce = interest.nonce;
                record.expiry = expiry;
                record.interest = interest.clone();
                &self.in_records[pos]
            }
            None => {
                self.in_records.push(InRecord {
                    face,
                    nonce: interest.nonce,
                    expiry,
                    interest: interest.clone(),
                });
                self.in_records.last().unwrap()
            }
        }
    }

    /// Creates or refreshes the out-record for `face`. A refresh clears any
    /// recorded Nack.
    pub fn insert_or_update_out_record(
        &mut self,
        face: FaceId,
        nonce: u32,
        lifetime: Duration,
        now: Instant,
    ) {
        let expiry = now + lifetime;
        match self.out_records.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.nonce = nonce;
                record.expiry = expiry;
                record.incoming_nack = None;
            }
            None => self.out_records.push(OutRecord {
                face,
                nonce,
                expiry,
                incoming_nack: None,
            }),
        }
    }

    pub fn delete_in_record(&mut self, face: FaceId) {
        self.in_records.retain(|r| r.face != face);
    }

    pub fn delete_out_record(&mut self, face: FaceId) {
        self.out_records.retain(|r| r.face != face);
    }

    pub fn clear_in_records(&mut self) {
        self.in_records.clear();
    }

    /// Latest in-record expiry, which bounds the entry's own lifetime.
    pub fn last_in_record_expiry(&self) -> Option<Instant> {
        self.in_records.iter().map(|r| r.expiry).max()
    }

    pub fn has_unexpired_out_records(&self, now: Instant) -> bool {
        self.out_records.iter().any(|r| r.expiry > now)
    }
}

/// Where a duplicate nonce was found within a PIT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DuplicateNonce {
    pub in_same: bool,
    pub in_other: bool,
    pub out_same: bool,
    pub out_other: bool,
}

impl DuplicateNonce {
    pub fn any(&self) -> bool {
        self.in_same || self.in_other || self.out_same || self.out_other
    }

    /// A duplicate found only in the same face's in-record is a permitted
    /// retransmission, not a loop.
    pub fn is_loop(&self) -> bool {
        self.in_other || self.out_same || self.out_other
    }
}

/// Locates `nonce` among the records of `entry`, relative to `face`.
pub fn find_duplicate_nonce(entry: &Entry, nonce: u32, face: FaceId) -> DuplicateNonce {
    let mut result = DuplicateNonce::default();
    for record in entry.in_records() {
        if record.nonce == nonce {
            if record.face == face {
                result.in_same = true;
            } else {
                result.in_other = true;
            }
        }
    }
    for record in entry.out_records() {
        if record.nonce == nonce {
            if record.face == face {
                result.out_same = true;
            } else {
                result.out_other = true;
            }
        }
    }
    result
}

#[derive(Clone)]
pub struct Pit {
    tree: NameTree,
    n_items: Rc<Cell<usize>>,
}

impl Pit {
    pub fn new(tree: NameTree) -> Self {
        Self {
            tree,
            n_items: Rc::new(Cell::new(0)),
        }
    }

    pub fn size(&self) -> usize {
        self.n_items.get()
    }

    /// Finds the entry matching `interest` by (name, selectors); creates one
    /// when absent. Returns the entry and whether it is new.
    pub fn insert(&self, interest: &Interest) -> (Rc<RefCell<Entry>>, bool) {
        let node = self.tree.lookup(&interest.name);
        let existing = self.tree.with_node(node, |n| {
            n.pit_entries
                .iter()
                .find(|entry| entry.borrow().can_match(interest))
                .cloned()
        });
        if let Some(entry) = existing {
            return (entry, false);
        }
        let entry = Rc::new(RefCell::new(Entry {
            interest: interest.clone(),
            node,
            in_records: Vec::new(),
            out_records: Vec::new(),
            expiry_timer: None,
            satisfied: false,
            data_freshness: None,
            strategy_info: StrategyInfoStore::new(),
        }));
        self.tree
            .with_node_mut(node, |n| n.pit_entries.push(Rc::clone(&entry)));
        self.n_items.set(self.n_items.get() + 1);
        (entry, true)
    }

    /// Finds the entry matching `interest` without creating one.
    pub fn find(&self, interest: &Interest) -> Option<Rc<RefCell<Entry>>> {
        self.tree.find_exact_match(&interest.name).and_then(|node| {
            self.tree.with_node(node, |n| {
                n.pit_entries
                    .iter()
                    .find(|entry| entry.borrow().can_match(interest))
                    .cloned()
            })
        })
    }

    pub fn erase(&self, entry: &Rc<RefCell<Entry>>) {
        let node = entry.borrow().node;
        let removed = self.tree.with_node_mut(node, |n| {
            let before = n.pit_entries.len();
            n.pit_entries.retain(|e| !Rc::ptr_eq(e, entry));
            before != n.pit_entries.len()
        });
        if removed {
            self.n_items.set(self.n_items.get() - 1);
            self.tree.cleanup_if_empty(node);
        }
    }

    /// Every entry that `data` satisfies, over all prefixes of the Data name
    /// and its full name with the implicit digest.
    pub fn data_matches(&self, data: &Data) -> Vec<Rc<RefCell<Entry>>> {
        let full_name = data.full_name();
        let mut matches = Vec::new();
        for node in self.tree.find_all_matches(&full_name, |n| !n.pit_entries.is_empty()) {
            let entries = self.tree.with_node(node, |n| n.pit_entries.clone());
            for entry in entries {
                if entry.borrow().can_be_satisfied_by(data, &full_name) {
                    matches.push(entry);
                }
            }
        }
        matches
    }

    /// The entry whose Interest the Nack refers to, if any.
    pub fn nack_matches(&self, nack: &Nack) -> Option<Rc<RefCell<Entry>>> {
        self.find(&nack.interest)
    }

    /// Every entry. Enumeration order is unspecified.
    pub fn entries(&self) -> Vec<Rc<RefCell<Entry>>> {
        self.tree
            .all_nodes()
            .into_iter()
            .flat_map(|node| self.tree.with_node(node, |n| n.pit_entries.clone()))
            .collect()
    }

    /// Every entry whose name has `prefix` as a prefix.
    pub fn entries_under(&self, prefix: &Name) -> Vec<Rc<RefCell<Entry>>> {
        self.tree
            .nodes_under(prefix)
            .into_iter()
            .flat_map(|node| self.tree.with_node(node, |n| n.pit_entries.clone()))
            .collect()
    }
}
