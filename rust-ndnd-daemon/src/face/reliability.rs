//! Link-layer ARQ.
//!
//! Every reliable fragment carries a TxSequence; the receiver acknowledges
//! each TxSequence it sees, piggybacked on whatever it sends next, or on an
//! IDLE packet when nothing leaves within the idle-ack period. A fragment
//! counts as lost when its RTO expires or when enough acks for later
//! TxSequences arrive; a lost fragment is retransmitted under a fresh
//! TxSequence up to a retry limit, after which the whole network packet is
//! abandoned. The RTO comes from a Jacobson/Karels estimator fed only by
//! first-transmission acks.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, trace};
use rust_ndnd_common::metrics::Counter;
use rust_ndnd_common::LpPacket;

use super::transport::Transport;
use super::FaceId;
use crate::runtime::{EventId, Runtime};

/// Encoded size of one Ack field: type + length + 8 octets.
const ACK_OVERHEAD: usize = 10;

#[derive(Debug, Clone)]
pub struct ReliabilityOptions {
    pub enabled: bool,
    pub max_retx: u32,
    pub seq_num_loss_threshold: u32,
    pub idle_ack_timer_period: Duration,
}

impl Default for ReliabilityOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retx: 3,
            seq_num_loss_threshold: 3,
            idle_ack_timer_period: Duration::from_millis(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReliabilityCounters {
    /// Network packets fully acknowledged without any retransmission.
    pub n_acknowledged: Counter,
    /// Network packets fully acknowledged after at least one retransmission.
    pub n_retransmitted: Counter,
    /// Network packets abandoned after the retransmission limit.
    pub n_retx_exhausted: Counter,
}

/* ---------------------------------------------------------------- *\
 * RTT estimation
\* ---------------------------------------------------------------- */

const INITIAL_RTO: Duration = Duration::from_secs(1);
const MIN_RTO: Duration = Duration::from_millis(200);
const MAX_RTO: Duration = Duration::from_secs(20);

pub struct RttEstimator {
    srtt: Option<Duration>,
    rttvar: Duration,
    rto: Duration,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self {
            srtt: None,
            rttvar: Duration::ZERO,
            rto: INITIAL_RTO,
        }
    }
}

impl RttEstimator {
    pub fn add_measurement(&mut self, rtt: Duration) {
        match self.srtt {
            None => {
                self.srtt = Some(rtt);
                self.rttvar = rtt / 2;
            }
            Some(srtt) => {
                let err = if srtt > rtt { srtt - rtt } else { rtt - srtt };
                self.rttvar = (self.rttvar * 3 + err) / 4;
                self.srtt = Some((srtt * 7 + rtt) / 8);
            }
        }
        self.rto = (self.srtt.unwrap() + self.rttvar * 4).clamp(MIN_RTO, MAX_RTO);
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Exponential backoff applied when a fragment times out.
    pub fn backoff(&mut self) {
        self.rto = (self.rto * 2).min(MAX_RTO);
    }
}

/* ---------------------------------------------------------------- *\
 * Reliability engine
\* ---------------------------------------------------------------- */

struct UnackedFrag {
    pkt: LpPacket,
    send_time: Instant,
    retx_count: u32,
    n_greater_seq_acks: u32,
    timed_out_by_seq: bool,
    rto_timer: Option<EventId>,
    net_pkt_id: u64,
}

struct NetPkt {
    unacked_frags: HashSet<u64>,
    did_retx: bool,
}

pub struct LpReliability {
    options: ReliabilityOptions,
    runtime: Runtime,
    face_id: FaceId,
    seq_counter: Rc<Cell<u64>>,
    unacked: BTreeMap<u64, UnackedFrag>,
    net_pkts: HashMap<u64, NetPkt>,
    first_unacked: Option<u64>,
    ack_queue: VecDeque<u64>,
    idle_ack_scheduled: bool,
    rtt: RttEstimator,
    pub counters: ReliabilityCounters,
}

impl LpReliability {
    pub fn new(
        options: ReliabilityOptions,
        runtime: Runtime,
        seq_counter: Rc<Cell<u64>>,
    ) -> Self {
        Self {
            options,
            runtime,
            face_id: super::INVALID_FACE_ID,
            seq_counter,
            unacked: BTreeMap::new(),
            net_pkts: HashMap::new(),
            first_unacked: None,
            ack_queue: VecDeque::new(),
            idle_ack_scheduled: false,
            rtt: RttEstimator::default(),
            counters: ReliabilityCounters::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    pub fn attach(&mut self, face_id: FaceId) {
        self.face_id = face_id;
    }

    pub fn n_unacked_frags(&self) -> usize {
        self.unacked.len()
    }

    pub fn n_queued_acks(&self) -> usize {
        self.ack_queue.len()
    }

    fn next_tx_sequence(&self) -> u64 {
        let seq = self.seq_counter.get().wrapping_add(1);
        self.seq_counter.set(seq);
        seq
    }

    /// Tracks freshly-sent fragments, which must already carry TxSequence.
    /// The first fragment's TxSequence identifies the network packet.
    pub fn observe_outgoing(&mut self, frags: &[LpPacket], now: Instant) {
        debug_assert!(self.options.enabled);
        let Some(first) = frags.first() else {
            return;
        };
        let net_pkt_id = first.tx_sequence.expect("reliable fragment without TxSequence");
        self.net_pkts.entry(net_pkt_id).or_insert_with(|| NetPkt {
            unacked_frags: HashSet::new(),
            did_retx: false,
        });

        for frag in frags {
            let tx_seq = frag.tx_sequence.expect("reliable fragment without TxSequence");
            let rto_timer = self.schedule_rto(tx_seq);
            self.net_pkts
                .get_mut(&net_pkt_id)
                .unwrap()
                .unacked_frags
                .insert(tx_seq);
            self.unacked.insert(
                tx_seq,
                UnackedFrag {
                    pkt: frag.clone(),
                    send_time: now,
                    retx_count: 0,
                    n_greater_seq_acks: 0,
                    timed_out_by_seq: false,
                    rto_timer: Some(rto_timer),
                    net_pkt_id,
                },
            );
            if self.first_unacked.is_none() {
                self.first_unacked = Some(tx_seq);
            }
        }
    }

    fn schedule_rto(&self, tx_seq: u64) -> EventId {
        let face_id = self.face_id;
        self.runtime.scheduler().schedule(
            self.rtt.rto(),
            Box::new(move |forwarder| forwarder.on_lp_frag_lost(face_id, tx_seq)),
        )
    }

    /// Handles the reliability fields of one incoming link packet: releases
    /// acknowledged fragments, detects losses by ack reordering, retransmits
    /// through `transport`, and queues an ack for the packet itself.
    pub fn process_incoming(
        &mut self,
        pkt: &LpPacket,
        transport: &mut dyn Transport,
        now: Instant,
    ) {
        debug_assert!(self.options.enabled);

        let acks: Vec<u64> = pkt.acks.clone();
        for ack in acks {
            let Some(frag) = self.unacked.get(&ack) else {
                continue; // ack for an unknown TxSequence
            };
            if let Some(timer) = frag.rto_timer {
                self.runtime.scheduler().cancel(timer);
            }
            if frag.retx_count == 0 {
                self.rtt.add_measurement(now - frag.send_time);
            }
            let lost = self.find_lost_frags(ack);
            self.on_frag_acknowledged(ack);
            for tx_seq in lost {
                self.on_frag_lost(tx_seq, transport, now);
            }
        }

        // every received reliable fragment gets acknowledged
        if pkt.fragment.is_some() {
            if let Some(tx_seq) = pkt.tx_sequence {
                self.ack_queue.push_back(tx_seq);
                self.start_idle_ack_timer();
            }
        }
    }

    /// Attaches up to ⌊(mtu − encoded-size) / ack-size⌋ queued acks.
    pub fn piggyback(&mut self, pkt: &mut LpPacket, mtu: Option<usize>) {
        debug_assert!(self.options.enabled);
        let mut budget = match mtu {
            Some(mtu) => mtu.saturating_sub(pkt.encoded_len()) / ACK_OVERHEAD,
            None => usize::MAX,
        };
        while budget > 0 {
            match self.ack_queue.pop_front() {
                Some(ack) => {
                    pkt.acks.push(ack);
                    budget -= 1;
                }
                None => break,
            }
        }
    }

    fn start_idle_ack_timer(&mut self) {
        if self.idle_ack_scheduled || self.ack_queue.is_empty() {
            return;
        }
        self.idle_ack_scheduled = true;
        let face_id = self.face_id;
        self.runtime.scheduler().schedule(
            self.options.idle_ack_timer_period,
            Box::new(move |forwarder| forwarder.on_idle_ack_timer(face_id)),
        );
    }

    /// Idle-ack expiry: flushes queued acks in IDLE packets since no
    /// outgoing packet carried them in time.
    pub fn handle_idle_ack_timer(&mut self, transport: &mut dyn Transport) {
        self.idle_ack_scheduled = false;
        let mtu = transport.base().mtu();
        while !self.ack_queue.is_empty() {
            let mut idle = LpPacket::default();
            self.piggyback(&mut idle, mtu);
            if idle.acks.is_empty() {
                break; // MTU cannot carry a single ack
            }
            trace!("reliability: sending IDLE packet with {} acks", idle.acks.len());
            transport.send(idle.to_wire());
        }
    }

    /// Fragments before `ack` in the send window that crossed the
    /// loss-by-reordering threshold with this ack.
    fn find_lost_frags(&mut self, ack: u64) -> Vec<u64> {
        let Some(start) = self.first_unacked else {
            return Vec::new();
        };
        let window: Vec<u64> = if start <= ack {
            self.unacked.range(start..ack).map(|(&seq, _)| seq).collect()
        } else {
            // TxSequence wrapped inside the window
            self.unacked
                .range(start..)
                .chain(self.unacked.range(..ack))
                .map(|(&seq, _)| seq)
                .collect()
        };

        let mut lost = Vec::new();
        for seq in window {
            let frag = self.unacked.get_mut(&seq).unwrap();
            frag.n_greater_seq_acks += 1;
            if frag.n_greater_seq_acks >= self.options.seq_num_loss_threshold
                && !frag.timed_out_by_seq
            {
                frag.timed_out_by_seq = true;
                lost.push(seq);
            }
        }
        lost
    }

    fn on_frag_acknowledged(&mut self, tx_seq: u64) {
        let Some(frag) = self.unacked.remove(&tx_seq) else {
            return;
        };
        self.advance_window_past(tx_seq);

        if let Some(net_pkt) = self.net_pkts.get_mut(&frag.net_pkt_id) {
            net_pkt.unacked_frags.remove(&tx_seq);
            if net_pkt.unacked_frags.is_empty() {
                if net_pkt.did_retx {
                    self.counters.n_retransmitted.increment();
                } else {
                    self.counters.n_acknowledged.increment();
                }
                self.net_pkts.remove(&frag.net_pkt_id);
            }
        }
    }

    fn advance_window_past(&mut self, removed: u64) {
        if self.first_unacked == Some(removed) {
            self.first_unacked = self
                .unacked
                .range(removed..)
                .next()
                .or_else(|| self.unacked.iter().next())
                .map(|(&seq, _)| seq);
        }
    }

    /// A fragment is lost (RTO expiry or ack reordering): retransmit it
    /// under a fresh TxSequence, or abandon its network packet once the
    /// retransmission limit is reached.
    pub fn on_frag_lost(&mut self, tx_seq: u64, transport: &mut dyn Transport, now: Instant) {
        let Some(frag) = self.unacked.get(&tx_seq) else {
            return; // already acknowledged or abandoned
        };
        let net_pkt_id = frag.net_pkt_id;
        self.rtt.backoff();

        if frag.retx_count >= self.options.max_retx {
            debug!("reliability: retx exhausted for net packet {}", net_pkt_id);
            if let Some(net_pkt) = self.net_pkts.remove(&net_pkt_id) {
                for seq in net_pkt.unacked_frags {
                    if let Some(dead) = self.unacked.remove(&seq) {
                        if let Some(timer) = dead.rto_timer {
                            self.runtime.scheduler().cancel(timer);
                        }
                        self.advance_window_past(seq);
                    }
                }
            }
            self.counters.n_retx_exhausted.increment();
            return;
        }

        let mut frag = self.unacked.remove(&tx_seq).unwrap();
        self.advance_window_past(tx_seq);
        if let Some(timer) = frag.rto_timer {
            self.runtime.scheduler().cancel(timer);
        }

        let new_tx_seq = self.next_tx_sequence();
        frag.pkt.tx_sequence = Some(new_tx_seq);
        frag.retx_count += 1;
        frag.n_greater_seq_acks = 0;
        frag.timed_out_by_seq = false;
        frag.send_time = now;
        frag.rto_timer = Some(self.schedule_rto(new_tx_seq));

        if let Some(net_pkt) = self.net_pkts.get_mut(&net_pkt_id) {
            net_pkt.unacked_frags.remove(&tx_seq);
            net_pkt.unacked_frags.insert(new_tx_seq);
            net_pkt.did_retx = true;
        }

        trace!(
            "reliability: retransmit txseq {} as {} (retx {})",
            tx_seq,
            new_tx_seq,
            frag.retx_count
        );
        transport.send(frag.pkt.to_wire());
        self.unacked.insert(new_tx_seq, frag);
        if self.first_unacked.is_none() {
            self.first_unacked = Some(new_tx_seq);
        }
    }
}
