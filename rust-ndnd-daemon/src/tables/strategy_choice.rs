//! Strategy Choice table: name prefix → forwarding strategy.
//!
//! Strategy instances are owned here, keyed by versioned name. Choosing an
//! unversioned name picks the highest installed version. The root entry is
//! mandatory and cannot be erased. When the effective strategy of a
//! namespace changes, the per-strategy scratch on Measurements entries in
//! that namespace is cleared.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, info};
use rust_ndnd_common::{Error, Name};

use super::name_tree::{NameTree, NodeId};
use crate::fw::strategy::Strategy;

pub struct Entry {
    prefix: Name,
    strategy_name: Name,
}

impl Entry {
    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// The versioned name of the chosen strategy.
    pub fn strategy_name(&self) -> &Name {
        &self.strategy_name
    }
}

#[derive(Clone)]
pub struct StrategyChoice {
    tree: NameTree,
    n_items: Rc<Cell<usize>>,
    instances: Rc<RefCell<BTreeMap<Name, Rc<dyn Strategy>>>>,
}

impl StrategyChoice {
    pub fn new(tree: NameTree) -> Self {
        Self {
            tree,
            n_items: Rc::new(Cell::new(0)),
            instances: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    pub fn size(&self) -> usize {
        self.n_items.get()
    }

    /// Installs a strategy instance. A duplicate name keeps the existing
    /// instance, which is returned with `false`.
    pub fn install(&self, strategy: Rc<dyn Strategy>) -> (bool, Rc<dyn Strategy>) {
        let name = strategy.name().clone();
        let mut instances = self.instances.borrow_mut();
        if let Some(existing) = instances.get(&name) {
            return (false, Rc::clone(existing));
        }
        info!("strategy-choice: install {}", name);
        instances.insert(name, Rc::clone(&strategy));
        (true, strategy)
    }

    /// Whether `strategy_name` is installed. With `is_exact` the name must
    /// match a versioned instance name exactly; otherwise an unversioned
    /// name matches any installed version.
    pub fn has_strategy(&self, strategy_name: &Name, is_exact: bool) -> bool {
        if is_exact {
            self.instances.borrow().contains_key(strategy_name)
        } else {
            self.resolve_instance(strategy_name).is_some()
        }
    }

    /// Resolves a versioned or unversioned name to an installed instance;
    /// an unversioned name picks the highest installed version.
    fn resolve_instance(&self, strategy_name: &Name) -> Option<Rc<dyn Strategy>> {
        let instances = self.instances.borrow();
        if let Some(instance) = instances.get(strategy_name) {
            return Some(Rc::clone(instance));
        }
        instances
            .iter()
            .filter(|(name, _)| {
                name.len() == strategy_name.len() + 1
                    && strategy_name.is_prefix_of(name)
                    && name.last().map(|c| c.is_version()).unwrap_or(false)
            })
            .max_by_key(|(name, _)| name.last().and_then(|c| c.to_version()).unwrap_or(0))
            .map(|(_, instance)| Rc::clone(instance))
    }

    /// Sets the strategy for `prefix`. Fails when the strategy is not
    /// installed.
    pub fn insert(&self, prefix: &Name, strategy_name: &Name) -> Result<(), Error> {
        let instance = self.resolve_instance(strategy_name).ok_or_else(|| {
            Error::Management(format!("strategy {} is not installed", strategy_name))
        })?;
        let resolved_name = instance.name().clone();

        let old_effective = self.find_effective_strategy_name(prefix);
        let node = self.tree.lookup(prefix);
        let is_new = self.tree.with_node_mut(node, |n| {
            let is_new = n.strategy_choice_entry.is_none();
            n.strategy_choice_entry = Some(Rc::new(RefCell::new(Entry {
                prefix: prefix.clone(),
                strategy_name: resolved_name.clone(),
            })));
            is_new
        });
        if is_new {
            self.n_items.set(self.n_items.get() + 1);
        }
        debug!("strategy-choice: set {} -> {}", prefix, resolved_name);

        if old_effective.as_ref() != Some(&resolved_name) {
            self.clear_strategy_info_under(prefix, node);
        }
        Ok(())
    }

    /// Removes the choice at `prefix`, reverting the namespace to its
    /// parent's strategy. The root choice cannot be erased.
    pub fn erase(&self, prefix: &Name) -> Result<(), Error> {
        if prefix.is_empty() {
            return Err(Error::Management(
                "the root strategy choice cannot be erased".into(),
            ));
        }
        let Some(node) = self.tree.find_exact_match(prefix) else {
            return Ok(());
        };
        let removed = self.tree.with_node_mut(node, |n| n.strategy_choice_entry.take());
        let Some(removed) = removed else {
            return Ok(());
        };
        self.n_items.set(self.n_items.get() - 1);

        let new_effective = self.find_effective_strategy_name(prefix);
        if new_effective.as_ref() != Some(removed.borrow().strategy_name()) {
            self.clear_strategy_info_under(prefix, node);
        }
        self.tree.cleanup_if_empty(node);
        Ok(())
    }

    /// The exact choice at `prefix`, if one is set.
    pub fn get(&self, prefix: &Name) -> Option<Name> {
        self.tree.find_exact_match(prefix).and_then(|node| {
            self.tree.with_node(node, |n| {
                n.strategy_choice_entry
                    .as_ref()
                    .map(|entry| entry.borrow().strategy_name.clone())
            })
        })
    }

    /// Versioned name of the strategy governing `name`.
    pub fn find_effective_strategy_name(&self, name: &Name) -> Option<Name> {
        self.tree
            .find_longest_prefix_match(name, |node| node.strategy_choice_entry.is_some())
            .and_then(|node| {
                self.tree.with_node(node, |n| {
                    n.strategy_choice_entry
                        .as_ref()
                        .map(|entry| entry.borrow().strategy_name.clone())
                })
            })
    }

    /// The strategy instance governing `name`. The root entry guarantees a
    /// result; dispatch depends only on table contents, not query order.
    pub fn find_effective_strategy(&self, name: &Name) -> Rc<dyn Strategy> {
        let strategy_name = self
            .find_effective_strategy_name(name)
            .expect("the root strategy choice entry is mandatory");
        self.instances
            .borrow()
            .get(&strategy_name)
            .map(Rc::clone)
            .expect("a chosen strategy must stay installed")
    }

    /// Every (prefix, strategy name) choice. Enumeration order is
    /// unspecified.
    pub fn entries(&self) -> Vec<(Name, Name)> {
        self.tree
            .all_nodes()
            .into_iter()
            .filter_map(|node| {
                self.tree.with_node(node, |n| {
                    n.strategy_choice_entry
                        .as_ref()
                        .map(|entry| (entry.borrow().prefix.clone(), entry.borrow().strategy_name.clone()))
                })
            })
            .collect()
    }

    /// Installed strategy instance names.
    pub fn installed_strategies(&self) -> Vec<Name> {
        self.instances.borrow().keys().cloned().collect()
    }

    /// Clears per-strategy scratch on Measurements entries whose effective
    /// strategy is decided by the choice at `prefix`. Subtrees with their
    /// own choice keep their scratch.
    fn clear_strategy_info_under(&self, prefix: &Name, prefix_node: NodeId) {
        for node in self.tree.nodes_under(prefix) {
            if node != prefix_node {
                let deciding = self
                    .tree
                    .find_longest_prefix_match(&self.tree.name_of(node), |n| {
                        n.strategy_choice_entry.is_some()
                    });
                if deciding != Some(prefix_node) {
                    continue;
                }
            }
            self.tree.with_node_mut(node, |n| {
                if let Some(entry) = &n.measurements_entry {
                    entry.borrow_mut().strategy_info.clear();
                }
            });
        }
    }
}
