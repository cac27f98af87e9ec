//! Link-layer end-to-end tests: fragmentation/reassembly over a bounded
//! MTU and the acknowledgement/retransmission machinery.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use common::make_forwarder;
use rust_ndnd_common::{Interest, LpPacket, Name, NetPacket};
use rust_ndnd_daemon::face::reliability::ReliabilityOptions;
use rust_ndnd_daemon::face::{
    DummyTransport, Face, FaceScope, GenericLinkService, LinkType, LinkServiceOptions,
};
use rust_ndnd_daemon::fw::Forwarder;

fn add_mtu_face(
    forwarder: &mut Forwarder,
    mtu: Option<usize>,
    options: LinkServiceOptions,
) -> (u64, Rc<RefCell<Vec<Bytes>>>) {
    let transport = DummyTransport::new(FaceScope::Local, LinkType::PointToPoint, mtu);
    let sent = transport.sent_blocks();
    let face = Face::new(
        GenericLinkService::new(options, forwarder.runtime().clone()),
        Box::new(transport),
    );
    let face = forwarder.add_face(face);
    let id = face.borrow().id();
    (id, sent)
}

fn long_name() -> Name {
    let mut name = Name::from_string("/frag");
    for i in 0..15 {
        name.push(rust_ndnd_common::NameComponent::new(
            format!("component-number-{:04}", i).into_bytes(),
        ));
    }
    name
}

#[test]
fn fragmentation_round_trip() {
    let (_runtime, mut forwarder) = make_forwarder();

    let sender_options = LinkServiceOptions {
        allow_fragmentation: true,
        ..LinkServiceOptions::default()
    };
    let receiver_options = LinkServiceOptions {
        allow_reassembly: true,
        ..LinkServiceOptions::default()
    };
    let (sender, sent) = add_mtu_face(&mut forwarder, Some(100), sender_options);
    let (receiver, _) = add_mtu_face(&mut forwarder, Some(100), receiver_options);

    // well over one MTU of name components
    let interest = Interest::new(long_name()).with_nonce(42);
    assert!(interest.to_wire().len() > 120);

    forwarder
        .faces()
        .get(sender)
        .unwrap()
        .borrow_mut()
        .send_interest(&interest);

    let blocks: Vec<Bytes> = sent.borrow().clone();
    assert!(blocks.len() > 1, "the Interest must fragment");
    for block in &blocks {
        assert!(block.len() <= 100, "every link packet fits the MTU");
        let lp = LpPacket::decode(block).unwrap();
        assert!(lp.sequence.is_some());
        assert!(lp.frag_index.is_some());
        assert_eq!(lp.frag_count, Some(blocks.len() as u64));
    }

    // the receiver delivers exactly one Interest equal to the original
    let receiver_face = forwarder.faces().get(receiver).unwrap();
    let mut delivered = Vec::new();
    for block in blocks {
        if let Some(packet) = receiver_face.borrow_mut().receive_block(block, 0) {
            delivered.push(packet);
        }
    }
    assert_eq!(delivered.len(), 1);
    match &delivered[0] {
        NetPacket::Interest(received) => {
            assert_eq!(received.name, interest.name);
            assert_eq!(received.nonce, interest.nonce);
        }
        other => panic!("expected an Interest, got {}", other.packet_type()),
    }
}

#[test]
fn out_of_order_fragments_reassemble() {
    let (_runtime, mut forwarder) = make_forwarder();
    let sender_options = LinkServiceOptions {
        allow_fragmentation: true,
        ..LinkServiceOptions::default()
    };
    let receiver_options = LinkServiceOptions {
        allow_reassembly: true,
        ..LinkServiceOptions::default()
    };
    let (sender, sent) = add_mtu_face(&mut forwarder, Some(100), sender_options);
    let (receiver, _) = add_mtu_face(&mut forwarder, None, receiver_options);

    let interest = Interest::new(long_name()).with_nonce(7);
    forwarder
        .faces()
        .get(sender)
        .unwrap()
        .borrow_mut()
        .send_interest(&interest);

    let mut blocks: Vec<Bytes> = sent.borrow().clone();
    blocks.reverse();

    let receiver_face = forwarder.faces().get(receiver).unwrap();
    let mut n_delivered = 0;
    for block in blocks {
        if receiver_face.borrow_mut().receive_block(block, 0).is_some() {
            n_delivered += 1;
        }
    }
    assert_eq!(n_delivered, 1);
}

#[test]
fn reassembly_timeout_drops_partial() {
    let (runtime, mut forwarder) = make_forwarder();
    let sender_options = LinkServiceOptions {
        allow_fragmentation: true,
        ..LinkServiceOptions::default()
    };
    let receiver_options = LinkServiceOptions {
        allow_reassembly: true,
        ..LinkServiceOptions::default()
    };
    let (sender, sent) = add_mtu_face(&mut forwarder, Some(100), sender_options);
    let (receiver, _) = add_mtu_face(&mut forwarder, None, receiver_options);

    let interest = Interest::new(long_name()).with_nonce(9);
    forwarder
        .faces()
        .get(sender)
        .unwrap()
        .borrow_mut()
        .send_interest(&interest);
    let blocks: Vec<Bytes> = sent.borrow().clone();
    assert!(blocks.len() > 1);

    // withhold the last fragment
    {
        let receiver_face = forwarder.faces().get(receiver).unwrap();
        for block in &blocks[..blocks.len() - 1] {
            assert!(receiver_face
                .borrow_mut()
                .receive_block(block.clone(), 0)
                .is_none());
        }
        assert_eq!(receiver_face.borrow().link_service().n_reassembly_partials(), 1);
    }

    // 500 ms later the partial is gone and the timeout is counted
    runtime
        .scheduler()
        .advance(&mut forwarder, Duration::from_millis(600));
    let receiver_face = forwarder.faces().get(receiver).unwrap();
    let face = receiver_face.borrow();
    assert_eq!(face.link_service().n_reassembly_partials(), 0);
    assert_eq!(face.counters().link.n_reassembly_timeouts.value(), 1);

    // the straggler cannot resurrect the packet
    drop(face);
    assert!(receiver_face
        .borrow_mut()
        .receive_block(blocks.last().unwrap().clone(), 0)
        .is_none());
}

fn reliable_options() -> LinkServiceOptions {
    LinkServiceOptions {
        reliability: ReliabilityOptions {
            enabled: true,
            ..ReliabilityOptions::default()
        },
        ..LinkServiceOptions::default()
    }
}

#[test]
fn acks_flow_back_on_idle_timer() {
    let (runtime, mut forwarder) = make_forwarder();
    let (a, a_sent) = add_mtu_face(&mut forwarder, None, reliable_options());
    let (b, b_sent) = add_mtu_face(&mut forwarder, None, reliable_options());

    let interest = Interest::new(Name::from_string("/reliable/1")).with_nonce(1);
    forwarder
        .faces()
        .get(a)
        .unwrap()
        .borrow_mut()
        .send_interest(&interest);

    let block = a_sent.borrow()[0].clone();
    let lp = LpPacket::decode(&block).unwrap();
    let tx_seq = lp.tx_sequence.expect("reliable packets carry TxSequence");

    // B receives the fragment and queues an ack
    forwarder
        .faces()
        .get(b)
        .unwrap()
        .borrow_mut()
        .receive_block(block, 0);

    // nothing else leaves B, so the idle-ack timer emits an IDLE packet
    runtime
        .scheduler()
        .advance(&mut forwarder, Duration::from_millis(10));
    let idle_blocks: Vec<Bytes> = b_sent.borrow().clone();
    assert_eq!(idle_blocks.len(), 1);
    let idle = LpPacket::decode(&idle_blocks[0]).unwrap();
    assert!(idle.is_idle());
    assert_eq!(idle.acks, vec![tx_seq]);

    // the ack releases A's fragment
    forwarder
        .faces()
        .get(a)
        .unwrap()
        .borrow_mut()
        .receive_block(idle_blocks[0].clone(), 0);
    let a_face = forwarder.faces().get(a).unwrap();
    let a_face = a_face.borrow();
    assert_eq!(a_face.link_service().reliability().n_unacked_frags(), 0);
    assert_eq!(
        a_face.link_service().reliability().counters.n_acknowledged.value(),
        1
    );
}

#[test]
fn unacked_fragment_exhausts_retransmissions() {
    let (runtime, mut forwarder) = make_forwarder();
    let (a, a_sent) = add_mtu_face(&mut forwarder, None, reliable_options());

    let interest = Interest::new(Name::from_string("/reliable/2")).with_nonce(2);
    forwarder
        .faces()
        .get(a)
        .unwrap()
        .borrow_mut()
        .send_interest(&interest);
    assert_eq!(a_sent.borrow().len(), 1);

    // never ack: the RTO fires, backs off, and gives up after max_retx
    runtime
        .scheduler()
        .advance(&mut forwarder, Duration::from_secs(60));

    // original transmission plus three retransmissions
    assert_eq!(a_sent.borrow().len(), 4);
    let a_face = forwarder.faces().get(a).unwrap();
    let a_face = a_face.borrow();
    assert_eq!(
        a_face.link_service().reliability().counters.n_retx_exhausted.value(),
        1
    );
    assert_eq!(a_face.link_service().reliability().n_unacked_frags(), 0);

    // each retransmission carries a fresh TxSequence
    let tx_seqs: Vec<u64> = a_sent
        .borrow()
        .iter()
        .map(|block| LpPacket::decode(block).unwrap().tx_sequence.unwrap())
        .collect();
    let mut deduped = tx_seqs.clone();
    deduped.dedup();
    assert_eq!(deduped.len(), 4);
}
