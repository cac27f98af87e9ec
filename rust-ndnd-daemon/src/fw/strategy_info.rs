//! Typed per-strategy scratch attached to PIT and Measurements entries.
//!
//! Each strategy keeps its own state type; the store maps the type's
//! `TypeId` to a boxed value so unrelated strategies never collide.

use std::any::{Any, TypeId};
use std::collections::HashMap;

#[derive(Default)]
pub struct StrategyInfoStore {
    items: HashMap<TypeId, Box<dyn Any>>,
}

impl StrategyInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.items
            .get(&TypeId::of::<T>())
            .and_then(|item| item.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.items
            .get_mut(&TypeId::of::<T>())
            .and_then(|item| item.downcast_mut::<T>())
    }

    /// Inserts `info`, replacing any previous value of the same type.
    pub fn insert<T: Any>(&mut self, info: T) {
        self.items.insert(TypeId::of::<T>(), Box::new(info));
    }

    /// Finds or creates the scratch of type `T`.
    pub fn get_or_insert_with<T: Any>(&mut self, default: impl FnOnce() -> T) -> &mut T {
        self.items
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(default()))
            .downcast_mut::<T>()
            .expect("strategy info type mismatch")
    }

    pub fn take<T: Any>(&mut self) -> Option<T> {
        self.items
            .remove(&TypeId::of::<T>())
            .and_then(|item| item.downcast::<T>().ok())
            .map(|item| *item)
    }

    /// Erases every stored item. Used when the effective strategy of the
    /// owning entry changes.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl std::fmt::Debug for StrategyInfoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyInfoStore")
            .field("items", &self.items.len())
            .finish()
    }
}
