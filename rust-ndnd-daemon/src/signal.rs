//! Single-threaded signals.
//!
//! A [`Signal`] is a list of observer callbacks with opaque slot ids. The
//! whole daemon runs on one logical task, so no locking is involved; a
//! [`ScopedConnection`] guard unregisters its slot on drop.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Slot<T> = (u64, Rc<dyn Fn(&T)>);

struct Slots<T> {
    next_id: u64,
    callbacks: Vec<Slot<T>>,
}

pub struct Signal<T> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Registers an observer and returns its connection handle.
    pub fn connect(&self, callback: impl Fn(&T) + 'static) -> Connection<T> {
        let mut slots = self.slots.borrow_mut();
        let id = slots.next_id;
        slots.next_id += 1;
        slots.callbacks.push((id, Rc::new(callback)));
        Connection {
            id,
            slots: Rc::downgrade(&self.slots),
        }
    }

    /// Invokes every connected observer in registration order.
    ///
    /// Observers may connect or disconnect during emission; emission works on
    /// a snapshot, and a slot disconnected mid-emit is still invoked once.
    pub fn emit(&self, args: &T) {
        let snapshot: Vec<Rc<dyn Fn(&T)>> = self
            .slots
            .borrow()
            .callbacks
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(args);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.slots.borrow().callbacks.len()
    }
}

/// Handle to a connected observer.
pub struct Connection<T> {
    id: u64,
    slots: Weak<RefCell<Slots<T>>>,
}

impl<T> Connection<T> {
    pub fn disconnect(&self) {
        if let Some(slots) = self.slots.upgrade() {
            slots
                .borrow_mut()
                .callbacks
                .retain(|(slot, _)| *slot != self.id);
        }
    }

    /// Converts into a guard that disconnects when dropped.
    pub fn scoped(self) -> ScopedConnection<T> {
        ScopedConnection { inner: Some(self) }
    }
}

/// Disconnects the held connection on drop unless released first.
pub struct ScopedConnection<T> {
    inner: Option<Connection<T>>,
}

impl<T> ScopedConnection<T> {
    /// Detaches the guard; the connection stays registered.
    pub fn release(mut self) -> Connection<T> {
        self.inner.take().expect("connection already released")
    }
}

impl<T> Drop for ScopedConnection<T> {
    fn drop(&mut self) {
        if let Some(connection) = self.inner.take() {
            connection.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn emit_reaches_all_observers() {
        let signal: Signal<u32> = Signal::new();
        let seen = Rc::new(Cell::new(0u32));

        let seen1 = Rc::clone(&seen);
        let _c1 = signal.connect(move |v| seen1.set(seen1.get() + v));
        let seen2 = Rc::clone(&seen);
        let _c2 = signal.connect(move |v| seen2.set(seen2.get() + v * 10));

        signal.emit(&3);
        assert_eq!(seen.get(), 33);
    }

    #[test]
    fn disconnect_removes_observer() {
        let signal: Signal<u32> = Signal::new();
        let seen = Rc::new(Cell::new(0u32));
        let seen1 = Rc::clone(&seen);
        let connection = signal.connect(move |v| seen1.set(seen1.get() + v));

        signal.emit(&1);
        connection.disconnect();
        signal.emit(&1);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn scoped_connection_disconnects_on_drop() {
        let signal: Signal<u32> = Signal::new();
        let seen = Rc::new(Cell::new(0u32));
        {
            let seen1 = Rc::clone(&seen);
            let _guard = signal.connect(move |v| seen1.set(seen1.get() + v)).scoped();
            signal.emit(&1);
        }
        signal.emit(&1);
        assert_eq!(seen.get(), 1);
        assert_eq!(signal.observer_count(), 0);
    }
}
