//! Generic link service: the upper half of a face.
//!
//! Translates between network packets and link packets: encodes local
//! fields, fragments to the transport MTU, assigns sequence numbers,
//! reassembles and decodes on receive, and drives the optional reliability
//! engine.

use std::cell::Cell;
use std::rc::Rc;

use bytes::Bytes;
use log::{trace, warn};
use rust_ndnd_common::metrics::Counter;
use rust_ndnd_common::{tlv, Data, Interest, LpPacket, Nack, NetPacket};

use super::fragmenter::{FragmenterOptions, LpFragmenter};
use super::reassembler::{LpReassembler, ReassemblerOptions, ReassemblyKey, ReassemblyResult};
use super::reliability::{LpReliability, ReliabilityOptions};
use super::transport::{EndpointId, Transport};
use super::{FaceId, FaceScope, INVALID_FACE_ID};
use crate::runtime::Runtime;

#[derive(Debug, Clone, Default)]
pub struct LinkServiceOptions {
    /// Accept and emit IncomingFaceId / NextHopFaceId / CachePolicy.
    /// Meaningful only on local-scope faces.
    pub allow_local_fields: bool,
    pub allow_fragmentation: bool,
    pub allow_reassembly: bool,
    pub reliability: ReliabilityOptions,
    pub fragmenter: FragmenterOptions,
    pub reassembler: ReassemblerOptions,
}

#[derive(Debug, Clone, Default)]
pub struct LinkServiceCounters {
    pub n_in_interests: Counter,
    pub n_out_interests: Counter,
    pub n_in_data: Counter,
    pub n_out_data: Counter,
    pub n_in_nacks: Counter,
    pub n_out_nacks: Counter,
    /// Incoming link packets that failed to parse.
    pub n_in_lp_invalid: Counter,
    /// Reassembled packets that failed network-layer rules.
    pub n_in_net_invalid: Counter,
    pub n_frag_errors: Counter,
    pub n_out_over_mtu: Counter,
    pub n_reassembly_timeouts: Counter,
}

pub struct GenericLinkService {
    options: LinkServiceOptions,
    pub counters: LinkServiceCounters,
    runtime: Runtime,
    face_id: FaceId,
    scope: FaceScope,
    fragmenter: LpFragmenter,
    reassembler: LpReassembler,
    reliability: LpReliability,
    seq_counter: Rc<Cell<u64>>,
}

impl GenericLinkService {
    pub fn new(options: LinkServiceOptions, runtime: Runtime) -> Self {
        let seq_counter = Rc::new(Cell::new(0u64));
        let reliability = LpReliability::new(
            options.reliability.clone(),
            runtime.clone(),
            Rc::clone(&seq_counter),
        );
        Self {
            fragmenter: LpFragmenter::new(options.fragmenter.clone()),
            reassembler: LpReassembler::new(options.reassembler.clone()),
            reliability,
            options,
            counters: LinkServiceCounters::default(),
            runtime,
            face_id: INVALID_FACE_ID,
            scope: FaceScope::NonLocal,
            seq_counter,
        }
    }

    pub fn options(&self) -> &LinkServiceOptions {
        &self.options
    }

    pub fn attach(&mut self, face_id: FaceId, scope: FaceScope) {
        self.face_id = face_id;
        self.scope = scope;
        self.reliability.attach(face_id);
    }

    /// Local fields are honored only when enabled and the face is local.
    fn local_fields_allowed(&self) -> bool {
        self.options.allow_local_fields && self.scope == FaceScope::Local
    }

    fn next_sequence(&self) -> u64 {
        let seq = self.seq_counter.get().wrapping_add(1);
        self.seq_counter.set(seq);
        seq
    }

    /* ------------------------------------------------------------ *\
     * Send path
    \* ------------------------------------------------------------ */

    pub fn send_interest(&mut self, interest: &Interest, transport: &mut dyn Transport) {
        self.counters.n_out_interests.increment();
        let mut lp = LpPacket::from_fragment(interest.to_wire());
        if self.local_fields_allowed() {
            lp.incoming_face_id = interest.tags.incoming_face_id;
        }
        self.send_net_packet(lp, transport);
    }

    pub fn send_data(&mut self, data: &Data, transport: &mut dyn Transport) {
        self.counters.n_out_data.increment();
        let mut lp = LpPacket::from_fragment(data.to_wire());
        if self.local_fields_allowed() {
            lp.incoming_face_id = data.tags.incoming_face_id;
            lp.cache_policy = data.tags.cache_policy;
        }
        self.send_net_packet(lp, transport);
    }

    pub fn send_nack(&mut self, nack: &Nack, transport: &mut dyn Transport) {
        self.counters.n_out_nacks.increment();
        let mut lp = LpPacket::from_fragment(nack.interest.to_wire());
        lp.nack = Some(nack.reason);
        if self.local_fields_allowed() {
            lp.incoming_face_id = nack.tags.incoming_face_id;
        }
        self.send_net_packet(lp, transport);
    }

    fn send_net_packet(&mut self, lp: LpPacket, transport: &mut dyn Transport) {
        let mtu = transport.base().mtu();

        let mut frags = if self.options.allow_fragmentation && mtu.is_some() {
            match self.fragmenter.fragment_packet(&lp, mtu.unwrap()) {
                Ok(frags) => frags,
                Err(_) => {
                    self.counters.n_frag_errors.increment();
                    return;
                }
            }
        } else {
            vec![lp]
        };

        let reliable = self.reliability.is_enabled();
        if frags.len() > 1 || reliable {
            // sequence identifies the packet for reassembly and reliability
            for frag in frags.iter_mut() {
                frag.sequence = Some(self.next_sequence());
                if reliable {
                    frag.tx_sequence = frag.sequence;
                }
            }
        }

        if reliable {
            let now = self.runtime.now();
            for frag in frags.iter_mut() {
                self.reliability.piggyback(frag, mtu);
            }
            self.reliability.observe_outgoing(&frags, now);
        }

        for frag in &frags {
            let wire = frag.to_wire();
            if let Some(mtu) = mtu {
                if wire.len() > mtu {
                    self.counters.n_out_over_mtu.increment();
                    warn!("attempt to send packet over MTU limit");
                    continue;
                }
            }
            transport.send(wire);
        }
    }

    /* ------------------------------------------------------------ *\
     * Receive path
    \* ------------------------------------------------------------ */

    /// Processes one block from the transport; returns the decoded network
    /// packet when one completes.
    pub fn receive_packet(
        &mut self,
        block: Bytes,
        endpoint: EndpointId,
        transport: &mut dyn Transport,
    ) -> Option<NetPacket> {
        let pkt = match LpPacket::decode(&block) {
            Ok(pkt) => pkt,
            Err(error) => {
                self.counters.n_in_lp_invalid.increment();
                warn!("packet parse error ({}): DROP", error);
                return None;
            }
        };

        if self.reliability.is_enabled() {
            let now = self.runtime.now();
            self.reliability.process_incoming(&pkt, transport, now);
        }

        if pkt.is_idle() {
            trace!("received IDLE packet");
            return None;
        }

        if pkt.is_fragmented() && !self.options.allow_reassembly {
            warn!("received fragment, but reassembly disabled: DROP");
            return None;
        }

        match self.reassembler.receive_fragment(endpoint, pkt) {
            ReassemblyResult::Complete {
                net_packet,
                first_fragment,
                cancel_timer,
            } => {
                if let Some(timer) = cancel_timer {
                    self.runtime.scheduler().cancel(timer);
                }
                self.decode_net_packet(net_packet, &first_fragment)
            }
            ReassemblyResult::Pending { key, is_new_partial } => {
                if is_new_partial {
                    let face_id = self.face_id;
                    let timer = self.runtime.scheduler().schedule(
                        self.reassembler.options().timeout,
                        Box::new(move |forwarder| forwarder.on_reassembly_timeout(face_id, key)),
                    );
                    self.reassembler.set_timer(key, timer);
                }
                None
            }
            ReassemblyResult::Dropped { cancel_timer } => {
                if let Some(timer) = cancel_timer {
                    self.runtime.scheduler().cancel(timer);
                }
                None
            }
        }
    }

    fn decode_net_packet(&mut self, net_packet: Bytes, first: &LpPacket) -> Option<NetPacket> {
        let packet_type = match net_packet.first() {
            Some(&t) => t,
            None => {
                self.counters.n_in_net_invalid.increment();
                return None;
            }
        };
        match packet_type {
            tlv::TLV_INTEREST if first.nack.is_some() => self.decode_nack(&net_packet, first),
            tlv::TLV_INTEREST => self.decode_interest(&net_packet, first),
            tlv::TLV_DATA => self.decode_data(&net_packet, first),
            other => {
                self.counters.n_in_net_invalid.increment();
                warn!("unrecognized network-layer packet TLV-TYPE {}: DROP", other);
                None
            }
        }
    }

    fn decode_interest(&mut self, wire: &[u8], first: &LpPacket) -> Option<NetPacket> {
        let mut interest = match Interest::decode(wire) {
            Ok(interest) => interest,
            Err(error) => {
                self.counters.n_in_net_invalid.increment();
                warn!("Interest parse error ({}): DROP", error);
                return None;
            }
        };
        if first.cache_policy.is_some() {
            self.counters.n_in_net_invalid.increment();
            warn!("received CachePolicy with Interest: DROP");
            return None;
        }
        if let Some(next_hop) = first.next_hop_face_id {
            if self.local_fields_allowed() {
                interest.tags.next_hop_face_id = Some(next_hop);
            } else {
                warn!("received NextHopFaceId, but local fields disabled: DROP");
                return None;
            }
        }
        if first.incoming_face_id.is_some() {
            trace!("received IncomingFaceId: IGNORE");
        }
        self.counters.n_in_interests.increment();
        Some(NetPacket::Interest(interest))
    }

    fn decode_data(&mut self, wire: &[u8], first: &LpPacket) -> Option<NetPacket> {
        let mut data = match Data::decode(wire) {
            Ok(data) => data,
            Err(error) => {
                self.counters.n_in_net_invalid.increment();
                warn!("Data parse error ({}): DROP", error);
                return None;
            }
        };
        if first.next_hop_face_id.is_some() {
            self.counters.n_in_net_invalid.increment();
            warn!("received NextHopFaceId with Data: DROP");
            return None;
        }
        if let Some(cache_policy) = first.cache_policy {
            if self.local_fields_allowed() {
                data.tags.cache_policy = Some(cache_policy);
            } else {
                trace!("received CachePolicy, but local fields disabled: IGNORE");
            }
        }
        self.counters.n_in_data.increment();
        Some(NetPacket::Data(data))
    }

    fn decode_nack(&mut self, wire: &[u8], first: &LpPacket) -> Option<NetPacket> {
        let interest = match Interest::decode(wire) {
            Ok(interest) => interest,
            Err(error) => {
                self.counters.n_in_net_invalid.increment();
                warn!("Nack parse error ({}): DROP", error);
                return None;
            }
        };
        if first.next_hop_face_id.is_some() || first.cache_policy.is_some() {
            self.counters.n_in_net_invalid.increment();
            warn!("received NextHopFaceId or CachePolicy with Nack: DROP");
            return None;
        }
        let reason = first.nack.expect("checked by caller");
        self.counters.n_in_nacks.increment();
        Some(NetPacket::Nack(Nack::new(reason, interest)))
    }

    /* ------------------------------------------------------------ *\
     * Timer entry points, routed through the owning face
    \* ------------------------------------------------------------ */

    pub fn handle_reassembly_timeout(&mut self, key: ReassemblyKey) {
        if self.reassembler.timeout(key).is_some() {
            self.counters.n_reassembly_timeouts.increment();
        }
    }

    pub fn handle_frag_lost(&mut self, tx_seq: u64, transport: &mut dyn Transport) {
        let now = self.runtime.now();
        self.reliability.on_frag_lost(tx_seq, transport, now);
    }

    pub fn handle_idle_ack_timer(&mut self, transport: &mut dyn Transport) {
        self.reliability.handle_idle_ack_timer(transport);
    }

    pub fn reliability(&self) -> &LpReliability {
        &self.reliability
    }

    pub fn n_reassembly_partials(&self) -> usize {
        self.reassembler.n_partials()
    }
}
