//! End-to-end pipeline tests driven through dummy faces on a manual clock.

mod common;

use std::rc::Rc;
use std::time::Duration;

use common::*;
use rust_ndnd_common::{Data, Interest, NackReason, Name};
use rust_ndnd_daemon::face::{FacePersistency, FaceScope, LinkType, CONTENT_STORE_FACE_ID};
use rust_ndnd_daemon::fw::Strategy;

#[test]
fn simple_exchange() {
    let (runtime, mut forwarder) = make_forwarder();
    let f1 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f2 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    forwarder.fib().add_or_update_next_hop(&Name::from_string("/A"), f2.id, 0);

    assert_eq!(forwarder.counters.n_in_interests.value(), 0);
    assert_eq!(forwarder.counters.n_out_interests.value(), 0);

    let interest = Interest::new(Name::from_string("/A/B"))
        .with_nonce(1001)
        .with_lifetime(Duration::from_secs(4));
    deliver_interest(&mut forwarder, &f1, &interest);

    let sent = f2.sent_interests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.name, Name::from_string("/A/B"));
    assert_eq!(sent[0].0.incoming_face_id, Some(f1.id));
    assert_eq!(forwarder.counters.n_in_interests.value(), 1);
    assert_eq!(forwarder.counters.n_out_interests.value(), 1);

    assert_eq!(forwarder.counters.n_in_data.value(), 0);
    assert_eq!(forwarder.counters.n_out_data.value(), 0);

    let data = Data::new(Name::from_string("/A/B/C"), &b"payload"[..]);
    deliver_data(&mut forwarder, &f2, &data);

    let sent = f1.sent_data();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.name, Name::from_string("/A/B/C"));
    assert_eq!(sent[0].0.incoming_face_id, Some(f2.id));
    assert_eq!(forwarder.counters.n_in_data.value(), 1);
    assert_eq!(forwarder.counters.n_out_data.value(), 1);

    // the satisfied entry retires
    runtime.scheduler().advance(&mut forwarder, Duration::from_secs(1));
    assert_eq!(forwarder.pit().size(), 0);
    assert_eq!(forwarder.counters.n_satisfied.value(), 1);
}

#[test]
fn content_store_hit() {
    let (runtime, mut forwarder) = make_forwarder();
    let f1 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f2 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f3 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    forwarder.fib().add_or_update_next_hop(&Name::from_string("/A"), f2.id, 0);

    let mut cached = Data::new(Name::from_string("/A"), &b"cached"[..]);
    cached.tags.incoming_face_id = Some(f3.id);
    let now = runtime.now();
    forwarder.cs().insert(cached, false, now);

    let interest = Interest::new(Name::from_string("/A"))
        .with_nonce(2002)
        .with_lifetime(Duration::from_secs(4));
    deliver_interest(&mut forwarder, &f1, &interest);

    // answered from the store, not forwarded
    assert_eq!(f2.sent_count(), 0);
    let sent = f1.sent_data();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.incoming_face_id, Some(CONTENT_STORE_FACE_ID));
    assert_eq!(forwarder.counters.n_cs_hits.value(), 1);

    runtime.scheduler().advance(&mut forwarder, Duration::from_millis(500));
    assert_eq!(forwarder.pit().size(), 0);
}

#[test]
fn interest_loop_nack() {
    let (_runtime, mut forwarder) = make_forwarder();
    let f1 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f2 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f3 = add_face(&mut forwarder, FaceScope::NonLocal, LinkType::MultiAccess);
    let f4 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    forwarder
        .fib()
        .add_or_update_next_hop(&Name::from_string("/zT4XwK0Hnx"), f4.id, 0);

    let name = Name::from_string("/zT4XwK0Hnx/28JBUvbEzc");
    let interest = |nonce: u32| {
        Interest::new(name.clone())
            .with_nonce(nonce)
            .with_lifetime(Duration::from_secs(4))
    };

    // first arrival is forwarded without complaint
    deliver_interest(&mut forwarder, &f1, &interest(732));
    assert_eq!(f4.sent_interests().len(), 1);
    assert!(f1.sent_nacks().is_empty());

    // duplicate nonce from the same downstream: the nonce is already on an
    // out-record, so this is a loop
    f1.clear();
    deliver_interest(&mut forwarder, &f1, &interest(732));
    let nacks = f1.sent_nacks();
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].1.reason, NackReason::Duplicate);
    assert_eq!(nacks[0].1.interest.nonce, 732);

    // duplicate nonce from another downstream
    deliver_interest(&mut forwarder, &f2, &interest(732));
    let nacks = f2.sent_nacks();
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].1.reason, NackReason::Duplicate);

    // a fresh nonce aggregates instead
    f2.clear();
    deliver_interest(&mut forwarder, &f2, &interest(944));
    assert!(f2.sent_nacks().is_empty());

    // loops on multi-access faces are dropped silently
    deliver_interest(&mut forwarder, &f3, &interest(732));
    assert!(f3.sent_nacks().is_empty());
}

#[test]
fn unsatisfied_entry_feeds_dead_nonce_list() {
    let (runtime, mut forwarder) = make_forwarder();
    let f1 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f2 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    forwarder.fib().add_or_update_next_hop(&Name::from_string("/A"), f2.id, 0);

    let name = Name::from_string("/A/1");
    let interest = Interest::new(name.clone())
        .with_nonce(82101183)
        .with_lifetime(Duration::from_millis(50));
    deliver_interest(&mut forwarder, &f1, &interest);
    assert_eq!(f2.sent_interests().len(), 1);

    // expire unsatisfied: the forwarded nonce must land in the DNL
    runtime.scheduler().advance(&mut forwarder, Duration::from_secs(1));
    assert_eq!(forwarder.pit().size(), 0);
    assert_eq!(forwarder.counters.n_unsatisfied.value(), 1);
    assert!(forwarder.dead_nonce_list().has(&name, 82101183));

    // the looped-back Interest is suppressed and leaves no PIT state
    f1.clear();
    deliver_interest(&mut forwarder, &f1, &interest);
    assert_eq!(f1.sent_nacks().len(), 1);
    assert_eq!(forwarder.pit().size(), 0);
    assert_eq!(f2.sent_interests().len(), 1);
}

#[test]
fn incoming_data_reaches_all_downstreams_except_origin() {
    let (_runtime, mut forwarder) = make_forwarder();
    let f1 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f2 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f3 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f4 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    forwarder.fib().add_or_update_next_hop(&Name::from_string("/A"), f4.id, 0);

    let prefix_interest = |nonce: u32| {
        Interest::new(Name::from_string("/A"))
            .with_nonce(nonce)
            .with_can_be_prefix(true)
            .with_lifetime(Duration::from_secs(4))
    };
    deliver_interest(&mut forwarder, &f1, &prefix_interest(1));
    deliver_interest(&mut forwarder, &f2, &prefix_interest(2));
    let exact = Interest::new(Name::from_string("/A/B/C"))
        .with_nonce(3)
        .with_lifetime(Duration::from_secs(4));
    deliver_interest(&mut forwarder, &f3, &exact);

    let data = Data::new(Name::from_string("/A/B/C"), &b"x"[..]);
    deliver_data(&mut forwarder, &f3, &data);

    assert_eq!(f1.sent_data().len(), 1);
    assert_eq!(f2.sent_data().len(), 1);
    // f3 delivered the Data; its own pending Interest is not answered back
    assert_eq!(f3.sent_data().len(), 0);
}

#[test]
fn unsolicited_data_is_dropped_by_default() {
    let (runtime, mut forwarder) = make_forwarder();
    let f1 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    let data = Data::new(Name::from_string("/nowhere"), &b"x"[..]);
    deliver_data(&mut forwarder, &f1, &data);
    assert_eq!(forwarder.counters.n_unsolicited_data.value(), 1);
    assert_eq!(forwarder.cs().size(), 0);

    // an admit-all policy caches it instead
    forwarder.set_unsolicited_data_policy(Box::new(
        rust_ndnd_daemon::fw::unsolicited_data_policy::AdmitAllPolicy,
    ));
    deliver_data(&mut forwarder, &f1, &data);
    assert_eq!(forwarder.cs().size(), 1);
    let _ = runtime;
}

#[test]
fn incoming_nack_requires_matching_out_record() {
    let (_runtime, mut forwarder) = make_forwarder();
    let f1 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f2 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    forwarder.fib().add_or_update_next_hop(&Name::from_string("/A"), f2.id, 0);

    let interest = Interest::new(Name::from_string("/A/1"))
        .with_nonce(562)
        .with_lifetime(Duration::from_secs(4));
    deliver_interest(&mut forwarder, &f1, &interest);
    let forwarded = f2.sent_interests();
    assert_eq!(forwarded.len(), 1);
    let forwarded_nonce = forwarded[0].1.nonce;

    // a Nack with the wrong nonce is ignored
    let bogus = rust_ndnd_common::Nack::new(
        NackReason::NoRoute,
        interest.clone().with_nonce(forwarded_nonce.wrapping_add(1)),
    );
    deliver_nack(&mut forwarder, &f2, &bogus);
    assert!(f1.sent_nacks().is_empty());

    // the matching Nack is recorded and relayed by best-route
    let nack = rust_ndnd_common::Nack::new(
        NackReason::NoRoute,
        interest.clone().with_nonce(forwarded_nonce),
    );
    deliver_nack(&mut forwarder, &f2, &nack);
    let relayed = f1.sent_nacks();
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0].1.reason, NackReason::NoRoute);
}

#[test]
fn localhost_scope_is_enforced() {
    let (_runtime, mut forwarder) = make_forwarder();
    let f_local = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f_net = add_face(&mut forwarder, FaceScope::NonLocal, LinkType::PointToPoint);

    let counting = Rc::new(CountingStrategy::new("counting", None));
    let dispatched = Rc::clone(&counting.n_dispatched);
    forwarder.strategy_choice().install(counting.clone());
    forwarder
        .strategy_choice()
        .insert(&Name::from_string("/localhost"), counting.name())
        .unwrap();
    forwarder
        .fib()
        .add_or_update_next_hop(&Name::from_string("/localhost/A"), f_net.id, 0);

    let interest = Interest::new(Name::from_string("/localhost/A/1"))
        .with_nonce(7)
        .with_lifetime(Duration::from_secs(4));

    // from the network: dropped before any dispatch
    deliver_interest(&mut forwarder, &f_net, &interest);
    assert_eq!(dispatched.get(), 0);
    assert_eq!(forwarder.counters.n_scope_violations.value(), 1);
    assert_eq!(forwarder.pit().size(), 0);

    // from a local application: dispatched normally
    deliver_interest(&mut forwarder, &f_local, &interest);
    assert_eq!(dispatched.get(), 1);
}

#[test]
fn localhost_data_never_leaves_non_local_faces() {
    let (runtime, mut forwarder) = make_forwarder();
    let f_local = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f_net = add_face(&mut forwarder, FaceScope::NonLocal, LinkType::PointToPoint);
    let f_src = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    // seed the PIT with downstreams on both faces; the non-local in-record
    // could not arise through the incoming pipeline, so plant it directly
    let interest = Interest::new(Name::from_string("/localhost/A"))
        .with_nonce(1)
        .with_lifetime(Duration::from_secs(4));
    let now = runtime.now();
    let (entry, _) = forwarder.pit().insert(&interest);
    entry
        .borrow_mut()
        .insert_or_update_in_record(f_local.id, &interest, now);
    entry
        .borrow_mut()
        .insert_or_update_in_record(f_net.id, &interest, now);

    let data = Data::new(Name::from_string("/localhost/A"), &b"x"[..]);
    deliver_data(&mut forwarder, &f_src, &data);

    assert_eq!(f_local.sent_data().len(), 1);
    assert_eq!(f_net.sent_data().len(), 0);
    assert_eq!(forwarder.counters.n_scope_violations.value(), 1);
}

#[test]
fn expired_on_demand_face_is_closed_and_purged() {
    let (runtime, mut forwarder) = make_forwarder();
    let f1 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f2 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    {
        let face = forwarder.faces().get(f2.id).unwrap();
        let mut face = face.borrow_mut();
        face.transport_mut()
            .change_persistency(FacePersistency::OnDemand)
            .unwrap();
        let deadline = runtime.now() + Duration::from_millis(100);
        face.set_expiration_time(Some(deadline));
    }
    forwarder.fib().add_or_update_next_hop(&Name::from_string("/A"), f2.id, 0);

    let interest = Interest::new(Name::from_string("/A/1"))
        .with_nonce(11)
        .with_lifetime(Duration::from_secs(8));
    deliver_interest(&mut forwarder, &f1, &interest);
    assert_eq!(f2.sent_interests().len(), 1);

    // the housekeeping tick closes the face and purges its table state
    runtime.scheduler().advance(&mut forwarder, Duration::from_secs(2));
    assert!(forwarder.faces().get(f2.id).is_none());
    assert!(forwarder
        .fib()
        .find_longest_prefix_match(&Name::from_string("/A/1"))
        .is_none());
    let entry = forwarder.pit().find(&interest).expect("entry still pending");
    assert!(entry.borrow().out_records().is_empty());
}

#[test]
fn new_next_hop_retries_pending_interest() {
    let (_runtime, mut forwarder) = make_forwarder();
    let f1 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let f2 = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    // no route yet: best-route nacks with NoRoute
    let interest = Interest::new(Name::from_string("/A/1"))
        .with_nonce(5)
        .with_lifetime(Duration::from_secs(4));
    deliver_interest(&mut forwarder, &f1, &interest);
    assert_eq!(f1.sent_nacks().len(), 1);

    // deliver again and install the route while pending
    f1.clear();
    let retry = interest.clone().with_nonce(6);
    deliver_interest(&mut forwarder, &f1, &retry);
    forwarder.add_next_hop(&Name::from_string("/A"), f2.id, 0);
    assert_eq!(f2.sent_interests().len(), 1);
}
