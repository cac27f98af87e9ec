//! Shared helpers for the integration tests: forwarders on a manual clock,
//! recording faces, and wire-level decoding of what they sent.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

use bytes::Bytes;
use rust_ndnd_common::{tlv, Data, Interest, LpPacket, Nack, Name};
use rust_ndnd_daemon::face::{
    DummyTransport, Face, FaceId, FaceScope, GenericLinkService, LinkType, LinkServiceOptions,
};
use rust_ndnd_daemon::fw::strategy::{make_strategy_name, Strategy};
use rust_ndnd_daemon::fw::Forwarder;
use rust_ndnd_daemon::runtime::Runtime;
use rust_ndnd_daemon::tables::pit;

pub fn make_forwarder() -> (Runtime, Forwarder) {
    let _ = env_logger::builder().is_test(true).try_init();
    let runtime = Runtime::new(Instant::now());
    let forwarder = Forwarder::new(runtime.clone());
    (runtime, forwarder)
}

/// Handle on a dummy face: its id plus the blocks its transport sent.
pub struct TestFace {
    pub id: FaceId,
    pub sent: Rc<RefCell<Vec<Bytes>>>,
}

impl TestFace {
    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }

    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }

    /// Decodes every sent block into (link packet, decoded network packet).
    pub fn sent_packets(&self) -> Vec<(LpPacket, SentPacket)> {
        self.sent
            .borrow()
            .iter()
            .map(|block| {
                let lp = LpPacket::decode(block).expect("sent block must parse");
                let packet = decode_sent(&lp);
                (lp, packet)
            })
            .collect()
    }

    pub fn sent_interests(&self) -> Vec<(LpPacket, Interest)> {
        self.sent_packets()
            .into_iter()
            .filter_map(|(lp, packet)| match packet {
                SentPacket::Interest(interest) => Some((lp, interest)),
                _ => None,
            })
            .collect()
    }

    pub fn sent_data(&self) -> Vec<(LpPacket, Data)> {
        self.sent_packets()
            .into_iter()
            .filter_map(|(lp, packet)| match packet {
                SentPacket::Data(data) => Some((lp, data)),
                _ => None,
            })
            .collect()
    }

    pub fn sent_nacks(&self) -> Vec<(LpPacket, Nack)> {
        self.sent_packets()
            .into_iter()
            .filter_map(|(lp, packet)| match packet {
                SentPacket::Nack(nack) => Some((lp, nack)),
                _ => None,
            })
            .collect()
    }
}

pub enum SentPacket {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
    Idle,
}

fn decode_sent(lp: &LpPacket) -> SentPacket {
    let Some(fragment) = &lp.fragment else {
        return SentPacket::Idle;
    };
    match fragment.first() {
        Some(&tlv::TLV_INTEREST) => {
            let interest = Interest::decode(fragment).expect("sent Interest must parse");
            match lp.nack {
                Some(reason) => SentPacket::Nack(Nack::new(reason, interest)),
                None => SentPacket::Interest(interest),
            }
        }
        Some(&tlv::TLV_DATA) => {
            SentPacket::Data(Data::decode(fragment).expect("sent Data must parse"))
        }
        _ => panic!("unrecognized sent packet"),
    }
}

/// Adds a dummy face with local fields enabled so tags are observable on
/// the wire.
pub fn add_face(forwarder: &mut Forwarder, scope: FaceScope, link_type: LinkType) -> TestFace {
    add_face_with_options(
        forwarder,
        scope,
        link_type,
        LinkServiceOptions {
            allow_local_fields: true,
            ..LinkServiceOptions::default()
        },
    )
}

pub fn add_face_with_options(
    forwarder: &mut Forwarder,
    scope: FaceScope,
    link_type: LinkType,
    options: LinkServiceOptions,
) -> TestFace {
    let transport = DummyTransport::new(scope, link_type, None);
    let sent = transport.sent_blocks();
    let face = Face::new(
        GenericLinkService::new(options, forwarder.runtime().clone()),
        Box::new(transport),
    );
    let face = forwarder.add_face(face);
    let id = face.borrow().id();
    TestFace { id, sent }
}

/// Injects a network packet into the forwarder as if it arrived on `face`.
pub fn deliver_interest(forwarder: &mut Forwarder, face: &TestFace, interest: &Interest) {
    forwarder.receive_block(face.id, interest.to_wire(), 0);
}

pub fn deliver_data(forwarder: &mut Forwarder, face: &TestFace, data: &Data) {
    forwarder.receive_block(face.id, data.to_wire(), 0);
}

pub fn deliver_nack(forwarder: &mut Forwarder, face: &TestFace, nack: &Nack) {
    let mut lp = LpPacket::from_fragment(nack.interest.to_wire());
    lp.nack = Some(nack.reason);
    forwarder.receive_block(face.id, lp.to_wire(), 0);
}

/// A strategy that counts its Interest dispatches and optionally forwards
/// to a fixed face.
pub struct CountingStrategy {
    name: Name,
    pub n_dispatched: Rc<Cell<usize>>,
    out_face: Option<FaceId>,
}

impl CountingStrategy {
    pub fn new(keyword: &str, out_face: Option<FaceId>) -> Self {
        Self::with_version(keyword, 1, out_face)
    }

    pub fn with_version(keyword: &str, version: u64, out_face: Option<FaceId>) -> Self {
        Self {
            name: make_strategy_name(keyword, version),
            n_dispatched: Rc::new(Cell::new(0)),
            out_face,
        }
    }
}

impl Strategy for CountingStrategy {
    fn name(&self) -> &Name {
        &self.name
    }

    fn after_receive_interest(
        &self,
        forwarder: &mut Forwarder,
        _ingress: FaceId,
        _interest: &Interest,
        pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
        self.n_dispatched.set(self.n_dispatched.get() + 1);
        if let Some(out_face) = self.out_face {
            forwarder.on_outgoing_interest(pit_entry, out_face, false);
        }
    }
}
