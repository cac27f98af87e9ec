//! Shared prefix index backing the FIB, PIT, Measurements, and
//! StrategyChoice tables.
//!
//! Every table entry is anchored at a node; a node with no entries and no
//! children is reclaimed. Nodes live in an arena indexed by `NodeId`, with a
//! hash index over every inserted name, so longest-prefix and all-prefix
//! queries are a bounded number of hash lookups.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rust_ndnd_common::Name;

use super::{fib, measurements, pit, strategy_choice};

pub type NodeId = usize;

pub struct Node {
    pub name: Name,
    parent: Option<NodeId>,
    child_count: usize,
    pub fib_entry: Option<Rc<RefCell<fib::Entry>>>,
    pub pit_entries: Vec<Rc<RefCell<pit::Entry>>>,
    pub measurements_entry: Option<Rc<RefCell<measurements::Entry>>>,
    pub strategy_choice_entry: Option<Rc<RefCell<strategy_choice::Entry>>>,
}

impl Node {
    fn new(name: Name, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            child_count: 0,
            fib_entry: None,
            pit_entries: Vec::new(),
            measurements_entry: None,
            strategy_choice_entry: None,
        }
    }

    fn has_table_entries(&self) -> bool {
        self.fib_entry.is_some()
            || !self.pit_entries.is_empty()
            || self.measurements_entry.is_some()
            || self.strategy_choice_entry.is_some()
    }
}

struct Inner {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    index: HashMap<Name, NodeId>,
    root: NodeId,
}

impl Inner {
    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id].as_ref().expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id].as_mut().expect("dangling NodeId")
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let name = node.name.clone();
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(name, id);
        id
    }

    fn lookup(&mut self, name: &Name) -> NodeId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        // create the chain of missing ancestors top-down
        let mut current = self.root;
        for depth in 1..=name.len() {
            let prefix = name.get_prefix(depth);
            match self.index.get(&prefix) {
                Some(&id) => current = id,
                None => {
                    let id = self.alloc(Node::new(prefix, Some(current)));
                    self.node_mut(current).child_count += 1;
                    current = id;
                }
            }
        }
        current
    }
}

#[derive(Clone)]
pub struct NameTree {
    inner: Rc<RefCell<Inner>>,
}

impl Default for NameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NameTree {
    pub fn new() -> Self {
        let root = Node::new(Name::new(), None);
        let mut index = HashMap::new();
        index.insert(Name::new(), 0);
        Self {
            inner: Rc::new(RefCell::new(Inner {
                nodes: vec![Some(root)],
                free: Vec::new(),
                index,
                root: 0,
            })),
        }
    }

    /// Finds the node for `name`, creating it and any missing ancestors.
    pub fn lookup(&self, name: &Name) -> NodeId {
        self.inner.borrow_mut().lookup(name)
    }

    pub fn find_exact_match(&self, name: &Name) -> Option<NodeId> {
        self.inner.borrow().index.get(name).copied()
    }

    /// Longest existing prefix of `name` whose node satisfies `predicate`.
    pub fn find_longest_prefix_match(
        &self,
        name: &Name,
        predicate: impl Fn(&Node) -> bool,
    ) -> Option<NodeId> {
        let inner = self.inner.borrow();
        for depth in (0..=name.len()).rev() {
            let prefix = name.get_prefix(depth);
            if let Some(&id) = inner.index.get(&prefix) {
                if predicate(inner.node(id)) {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Every existing ancestor of `name` plus `name` itself, shortest first,
    /// filtered by `predicate`.
    pub fn find_all_matches(
        &self,
        name: &Name,
        predicate: impl Fn(&Node) -> bool,
    ) -> Vec<NodeId> {
        let inner = self.inner.borrow();
        let mut matches = Vec::new();
        for depth in 0..=name.len() {
            let prefix = name.get_prefix(depth);
            if let Some(&id) = inner.index.get(&prefix) {
                if predicate(inner.node(id)) {
                    matches.push(id);
                }
            }
        }
        matches
    }

    /// Every existing node whose name has `prefix` as a prefix, including the
    /// prefix node itself. Enumeration order is unspecified.
    pub fn nodes_under(&self, prefix: &Name) -> Vec<NodeId> {
        let inner = self.inner.borrow();
        inner
            .index
            .iter()
            .filter(|(name, _)| prefix.is_prefix_of(name))
            .map(|(_, &id)| id)
            .collect()
    }

    /// Every existing node. Enumeration order is unspecified.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        let inner = self.inner.borrow();
        inner.index.values().copied().collect()
    }

    /// Whether `id` still refers to a live node. Ids go stale when GC
    /// reclaims a node out from under a snapshot enumeration.
    pub fn contains(&self, id: NodeId) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(id)
            .map(|node| node.is_some())
            .unwrap_or(false)
    }

    pub fn name_of(&self, id: NodeId) -> Name {
        self.inner.borrow().node(id).name.clone()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.inner.borrow().node(id).parent
    }

    pub fn size(&self) -> usize {
        self.inner.borrow().index.len()
    }

    /// Runs `f` with shared access to the node.
    pub fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&Node) -> R) -> R {
        f(self.inner.borrow().node(id))
    }

    /// Runs `f` with exclusive access to the node.
    pub fn with_node_mut<R>(&self, id: NodeId, f: impl FnOnce(&mut Node) -> R) -> R {
        f(self.inner.borrow_mut().node_mut(id))
    }

    /// Reclaims `id` and its ancestors while they hold no table entries and
    /// have no children.
    pub fn cleanup_if_empty(&self, id: NodeId) {
        let mut inner = self.inner.borrow_mut();
        let mut current = Some(id);
        while let Some(id) = current {
            if id == inner.root {
                break;
            }
            let node = inner.node(id);
            if node.has_table_entries() || node.child_count > 0 {
                break;
            }
            let parent = node.parent;
            let name = node.name.clone();
            inner.index.remove(&name);
            inner.nodes[id] = None;
            inner.free.push(id);
            if let Some(parent) = parent {
                inner.node_mut(parent).child_count -= 1;
            }
            current = parent;
        }
    }
}
