//! Management plane tests: commands travel the real path through the
//! internal face and responses come back as Data.

mod common;

use std::time::Duration;

use common::*;
use rust_ndnd_common::name::NameComponent;
use rust_ndnd_common::{Data, Interest, Name};
use rust_ndnd_daemon::face::{FaceScope, LinkType};
use rust_ndnd_daemon::fw::strategy::make_unversioned_strategy_name;
use rust_ndnd_daemon::fw::Forwarder;
use rust_ndnd_daemon::mgmt::control::{
    parse_segment_component, ControlParameters, ControlResponse,
};
use rust_ndnd_daemon::mgmt::{attach_management, AcceptAllAuthenticator, Dispatcher};
use rust_ndnd_daemon::runtime::Runtime;

fn make_managed_forwarder() -> (Runtime, Forwarder, Dispatcher) {
    let (runtime, mut forwarder) = make_forwarder();
    let dispatcher = attach_management(&mut forwarder, Box::new(AcceptAllAuthenticator));
    (runtime, forwarder, dispatcher)
}

fn command_interest(module: &str, verb: &str, parameters: &ControlParameters) -> Interest {
    let name = Name::from_string("/localhost/nfd")
        .appended(NameComponent::new(module.as_bytes().to_vec()))
        .appended(NameComponent::new(verb.as_bytes().to_vec()))
        .appended(NameComponent::new(parameters.encode()));
    Interest::new(name).with_lifetime(Duration::from_secs(4))
}

/// Sends a command from `client`, runs the dispatcher, and returns the
/// decoded status response from the client's wire.
fn run_command(
    forwarder: &mut Forwarder,
    dispatcher: &mut Dispatcher,
    client: &TestFace,
    interest: &Interest,
) -> ControlResponse {
    client.clear();
    deliver_interest(forwarder, client, interest);
    dispatcher.process_pending(forwarder);

    let responses = client.sent_data();
    assert_eq!(responses.len(), 1, "expected exactly one response Data");
    assert_eq!(responses[0].1.name, interest.name);
    ControlResponse::decode(&responses[0].1.content).expect("response must carry a status")
}

#[test]
fn fib_add_nexthop_with_self_registration() {
    let (_runtime, mut forwarder, mut dispatcher) = make_managed_forwarder();
    let client = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    // FaceId 0 resolves to the command's ingress face
    let parameters = ControlParameters {
        name: Some(Name::from_string("/app/prefix")),
        face_id: Some(0),
        cost: Some(10),
        strategy: None,
    };
    let response = run_command(
        &mut forwarder,
        &mut dispatcher,
        &client,
        &command_interest("fib", "add-nexthop", &parameters),
    );
    assert_eq!(response.code, 200);

    let entry = forwarder
        .fib()
        .find_exact_match(&Name::from_string("/app/prefix"))
        .expect("route must be installed");
    let entry = entry.borrow();
    assert_eq!(entry.next_hops().len(), 1);
    assert_eq!(entry.next_hops()[0].face, client.id);
    assert_eq!(entry.next_hops()[0].cost, 10);

    // and remove it again
    let response = run_command(
        &mut forwarder,
        &mut dispatcher,
        &client,
        &command_interest("fib", "remove-nexthop", &parameters),
    );
    assert_eq!(response.code, 200);
    assert!(forwarder
        .fib()
        .find_exact_match(&Name::from_string("/app/prefix"))
        .is_none());
}

#[test]
fn fib_add_nexthop_rejects_unknown_face() {
    let (_runtime, mut forwarder, mut dispatcher) = make_managed_forwarder();
    let client = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    let parameters = ControlParameters {
        name: Some(Name::from_string("/app/prefix")),
        face_id: Some(9999),
        cost: None,
        strategy: None,
    };
    let response = run_command(
        &mut forwarder,
        &mut dispatcher,
        &client,
        &command_interest("fib", "add-nexthop", &parameters),
    );
    assert_eq!(response.code, 404);
}

#[test]
fn strategy_choice_set_and_unset() {
    let (_runtime, mut forwarder, mut dispatcher) = make_managed_forwarder();
    let client = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    let parameters = ControlParameters {
        name: Some(Name::from_string("/B")),
        face_id: None,
        cost: None,
        strategy: Some(make_unversioned_strategy_name("multicast")),
    };
    let response = run_command(
        &mut forwarder,
        &mut dispatcher,
        &client,
        &command_interest("strategy-choice", "set", &parameters),
    );
    assert_eq!(response.code, 200);
    let chosen = forwarder
        .strategy_choice()
        .get(&Name::from_string("/B"))
        .expect("choice must exist");
    assert!(make_unversioned_strategy_name("multicast").is_prefix_of(&chosen));

    let response = run_command(
        &mut forwarder,
        &mut dispatcher,
        &client,
        &command_interest("strategy-choice", "unset", &parameters),
    );
    assert_eq!(response.code, 200);
    assert!(forwarder
        .strategy_choice()
        .get(&Name::from_string("/B"))
        .is_none());
}

#[test]
fn unknown_strategy_yields_504() {
    let (_runtime, mut forwarder, mut dispatcher) = make_managed_forwarder();
    let client = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    let parameters = ControlParameters {
        name: Some(Name::from_string("/B")),
        face_id: None,
        cost: None,
        strategy: Some(Name::from_string("/localhost/nfd/strategy/no-such-thing")),
    };
    let response = run_command(
        &mut forwarder,
        &mut dispatcher,
        &client,
        &command_interest("strategy-choice", "set", &parameters),
    );
    assert_eq!(response.code, 504);
}

#[test]
fn unset_root_yields_403() {
    let (_runtime, mut forwarder, mut dispatcher) = make_managed_forwarder();
    let client = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    let parameters = ControlParameters {
        name: Some(Name::new()),
        face_id: None,
        cost: None,
        strategy: None,
    };
    let response = run_command(
        &mut forwarder,
        &mut dispatcher,
        &client,
        &command_interest("strategy-choice", "unset", &parameters),
    );
    assert_eq!(response.code, 403);
}

#[test]
fn unknown_verb_yields_501() {
    let (_runtime, mut forwarder, mut dispatcher) = make_managed_forwarder();
    let client = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    let parameters = ControlParameters::default();
    let response = run_command(
        &mut forwarder,
        &mut dispatcher,
        &client,
        &command_interest("fib", "frobnicate", &parameters),
    );
    assert_eq!(response.code, 501);
}

#[test]
fn unauthorized_module_yields_403() {
    let (_runtime, mut forwarder) = make_forwarder();
    // only the cs module is allowed
    let mut dispatcher = attach_management(
        &mut forwarder,
        Box::new(rust_ndnd_daemon::mgmt::ModulePolicyAuthenticator::new([
            "cs".to_string(),
        ])),
    );
    let client = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    let parameters = ControlParameters {
        name: Some(Name::from_string("/app")),
        face_id: Some(0),
        cost: None,
        strategy: None,
    };
    let response = run_command(
        &mut forwarder,
        &mut dispatcher,
        &client,
        &command_interest("fib", "add-nexthop", &parameters),
    );
    assert_eq!(response.code, 403);
}

#[test]
fn fib_list_dataset_is_segmented() {
    let (_runtime, mut forwarder, mut dispatcher) = make_managed_forwarder();
    let client = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);
    let upstream = add_face(&mut forwarder, FaceScope::Local, LinkType::PointToPoint);

    for i in 0..4 {
        forwarder.add_next_hop(
            &Name::from_string(&format!("/listed/{}", i)),
            upstream.id,
            i,
        );
    }

    client.clear();
    let list = Interest::new(Name::from_string("/localhost/nfd/fib/list"))
        .with_lifetime(Duration::from_secs(4));
    deliver_interest(&mut forwarder, &client, &list);
    dispatcher.process_pending(&mut forwarder);

    let responses: Vec<(rust_ndnd_common::LpPacket, Data)> = client.sent_data();
    assert_eq!(responses.len(), 1);
    let segment = &responses[0].1;

    // segment 0 of a dataset, with the final block marked
    let last = segment.name.last().unwrap();
    assert_eq!(parse_segment_component(last), Some(0));
    let final_block = segment.final_block_id.as_ref().unwrap();
    assert!(parse_segment_component(final_block).is_some());
    assert!(!segment.content.is_empty());
}
