//! Event loop runtime: scheduler, timers, and cross-loop posting.
//!
//! All forwarder state lives on one logical task. Timer callbacks receive a
//! `&mut Forwarder` when the loop driver fires them, so no component needs a
//! shared reference back into the forwarder. The clock is advanced explicitly
//! by the driver (the daemon main loop, or a test), which keeps every timeout
//! in the system deterministic under test.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::fw::Forwarder;

/// A deferred unit of work run against the forwarder on the main loop.
pub type Event = Box<dyn FnOnce(&mut Forwarder)>;

/// Identifier of a scheduled event. Cancelling a fired or cancelled event is
/// a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

struct SchedulerInner {
    now: Instant,
    next_id: u64,
    // earliest deadline first; ties fire in scheduling order
    queue: BinaryHeap<Reverse<(Instant, u64)>>,
    events: HashMap<u64, Event>,
}

/// Timer event queue driven by the event loop.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Scheduler {
    pub fn new(start: Instant) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                now: start,
                next_id: 0,
                queue: BinaryHeap::new(),
                events: HashMap::new(),
            })),
        }
    }

    /// Current time on this loop's clock.
    pub fn now(&self) -> Instant {
        self.inner.borrow().now
    }

    /// Schedules `event` to fire `delay` from now.
    pub fn schedule(&self, delay: Duration, event: Event) -> EventId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let deadline = inner.now + delay;
        inner.queue.push(Reverse((deadline, id)));
        inner.events.insert(id, event);
        EventId(id)
    }

    /// Cancels a pending event. No-op if it already fired or was cancelled.
    pub fn cancel(&self, id: EventId) {
        self.inner.borrow_mut().events.remove(&id.0);
    }

    pub fn pending_events(&self) -> usize {
        self.inner.borrow().events.len()
    }

    /// Time until the earliest pending event, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        let inner = self.inner.borrow();
        inner.queue.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Moves the clock forward by `dt`, firing due events in deadline order.
    pub fn advance(&self, forwarder: &mut Forwarder, dt: Duration) {
        let target = self.inner.borrow().now + dt;
        self.advance_to(forwarder, target);
    }

    /// Moves the clock to `target`, firing due events in deadline order.
    /// Events scheduled while firing run too if their deadline is reached.
    pub fn advance_to(&self, forwarder: &mut Forwarder, target: Instant) {
        loop {
            let event = {
                let mut inner = self.inner.borrow_mut();
                match inner.queue.peek() {
                    Some(Reverse((deadline, id))) if *deadline <= target => {
                        let (deadline, id) = (*deadline, *id);
                        inner.queue.pop();
                        match inner.events.remove(&id) {
                            Some(event) => {
                                inner.now = inner.now.max(deadline);
                                Some(event)
                            }
                            None => continue, // cancelled
                        }
                    }
                    _ => None,
                }
            };
            match event {
                Some(event) => event(forwarder),
                None => break,
            }
        }
        let mut inner = self.inner.borrow_mut();
        inner.now = inner.now.max(target);
    }
}

/// Cancels the held event when dropped, unless released first. Assigning a
/// new id cancels the previous one.
pub struct ScopedEventId {
    scheduler: Scheduler,
    id: Option<EventId>,
}

impl ScopedEventId {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            id: None,
        }
    }

    pub fn assign(&mut self, id: EventId) {
        if let Some(old) = self.id.replace(id) {
            self.scheduler.cancel(old);
        }
    }

    pub fn cancel(&mut self) {
        if let Some(id) = self.id.take() {
            self.scheduler.cancel(id);
        }
    }

    /// Detaches the event from the guard; it will fire normally.
    pub fn release(&mut self) -> Option<EventId> {
        self.id.take()
    }
}

impl Drop for ScopedEventId {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Handle to one event loop: its scheduler plus its post queue. Another loop
/// (or a component inside this one) posts closures that the loop driver runs
/// at the next iteration.
#[derive(Clone)]
pub struct Runtime {
    scheduler: Scheduler,
    posts: Rc<RefCell<VecDeque<Event>>>,
}

impl Runtime {
    pub fn new(start: Instant) -> Self {
        Self {
            scheduler: Scheduler::new(start),
            posts: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn now(&self) -> Instant {
        self.scheduler.now()
    }

    /// Enqueues work to run on this loop's next iteration.
    pub fn post(&self, event: Event) {
        self.posts.borrow_mut().push_back(event);
    }

    /// Runs every queued post, including posts enqueued while draining.
    pub fn process_posts(&self, forwarder: &mut Forwarder) {
        loop {
            let event = self.posts.borrow_mut().pop_front();
            match event {
                Some(event) => event(forwarder),
                None => break,
            }
        }
    }

    pub fn has_pending_posts(&self) -> bool {
        !self.posts.borrow().is_empty()
    }
}
