//! Scheduler and runtime behavior: firing order, cancellation, scoped
//! guards, and cross-loop posts.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use common::make_forwarder;
use rust_ndnd_daemon::runtime::ScopedEventId;

#[test]
fn events_fire_in_deadline_then_scheduling_order() {
    let (runtime, mut forwarder) = make_forwarder();
    let order = Rc::new(RefCell::new(Vec::new()));

    for (label, delay_ms) in [("b", 20u64), ("a", 10), ("c", 20)] {
        let order = Rc::clone(&order);
        runtime.scheduler().schedule(
            Duration::from_millis(delay_ms),
            Box::new(move |_| order.borrow_mut().push(label)),
        );
    }

    runtime
        .scheduler()
        .advance(&mut forwarder, Duration::from_millis(50));
    // same-instant events fire in scheduling order
    assert_eq!(order.borrow().as_slice(), &["a", "b", "c"]);
}

#[test]
fn cancelled_event_never_fires() {
    let (runtime, mut forwarder) = make_forwarder();
    let fired = Rc::new(RefCell::new(false));

    let fired2 = Rc::clone(&fired);
    let id = runtime.scheduler().schedule(
        Duration::from_millis(10),
        Box::new(move |_| *fired2.borrow_mut() = true),
    );
    runtime.scheduler().cancel(id);
    runtime
        .scheduler()
        .advance(&mut forwarder, Duration::from_millis(50));
    assert!(!*fired.borrow());

    // cancelling an already-fired event is a no-op
    let id = runtime
        .scheduler()
        .schedule(Duration::from_millis(10), Box::new(|_| {}));
    runtime
        .scheduler()
        .advance(&mut forwarder, Duration::from_millis(50));
    runtime.scheduler().cancel(id);
}

#[test]
fn scoped_event_cancels_on_drop_and_reassignment() {
    let (runtime, mut forwarder) = make_forwarder();
    let count = Rc::new(RefCell::new(0u32));

    let schedule = |label_count: &Rc<RefCell<u32>>| {
        let count = Rc::clone(label_count);
        runtime.scheduler().schedule(
            Duration::from_millis(10),
            Box::new(move |_| *count.borrow_mut() += 1),
        )
    };

    // dropped guard cancels
    {
        let mut guard = ScopedEventId::new(runtime.scheduler().clone());
        guard.assign(schedule(&count));
    }
    // reassignment cancels the previous event
    let mut guard = ScopedEventId::new(runtime.scheduler().clone());
    guard.assign(schedule(&count));
    guard.assign(schedule(&count));
    // released events fire normally
    let mut released = ScopedEventId::new(runtime.scheduler().clone());
    released.assign(schedule(&count));
    released.release();
    drop(released);

    runtime
        .scheduler()
        .advance(&mut forwarder, Duration::from_millis(50));
    // one survivor from the reassigned guard, one released
    assert_eq!(*count.borrow(), 2);
}

#[test]
fn events_scheduled_while_firing_run_at_their_deadline() {
    let (runtime, mut forwarder) = make_forwarder();
    let order = Rc::new(RefCell::new(Vec::new()));

    let order2 = Rc::clone(&order);
    let inner_runtime = runtime.clone();
    runtime.scheduler().schedule(
        Duration::from_millis(10),
        Box::new(move |_| {
            order2.borrow_mut().push("outer");
            let order3 = Rc::clone(&order2);
            inner_runtime.scheduler().schedule(
                Duration::from_millis(10),
                Box::new(move |_| order3.borrow_mut().push("inner")),
            );
        }),
    );

    runtime
        .scheduler()
        .advance(&mut forwarder, Duration::from_millis(30));
    assert_eq!(order.borrow().as_slice(), &["outer", "inner"]);
}

#[test]
fn posts_run_on_the_next_turn() {
    let (runtime, mut forwarder) = make_forwarder();
    let ran = Rc::new(RefCell::new(false));

    let ran2 = Rc::clone(&ran);
    runtime.post(Box::new(move |_| *ran2.borrow_mut() = true));
    assert!(runtime.has_pending_posts());

    runtime.process_posts(&mut forwarder);
    assert!(*ran.borrow());
    assert!(!runtime.has_pending_posts());
}
