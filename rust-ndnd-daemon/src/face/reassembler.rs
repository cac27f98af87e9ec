//! Link packet reassembly.
//!
//! Partial packets are keyed by (remote endpoint, sequence − fragment
//! index), so every fragment of one network packet maps to the same key
//! even across sequence wrap-around. A partial that misbehaves in any way
//! is dropped whole; a partial that never completes is dropped by a timer
//! the link service runs.

use bytes::{Bytes, BytesMut};
use log::{trace, warn};
use rust_ndnd_common::LpPacket;
use std::collections::HashMap;

use super::transport::EndpointId;
use crate::runtime::EventId;
use crate::signal::Signal;

pub type ReassemblyKey = (EndpointId, u64);

#[derive(Debug, Clone)]
pub struct ReassemblerOptions {
    pub n_max_fragments: u64,
    pub timeout: std::time::Duration,
}

impl Default for ReassemblerOptions {
    fn default() -> Self {
        Self {
            n_max_fragments: 400,
            timeout: std::time::Duration::from_millis(500),
        }
    }
}

struct PartialPacket {
    frag_count: u64,
    n_received: u64,
    fragments: Vec<Option<LpPacket>>,
    drop_timer: Option<EventId>,
}

pub enum ReassemblyResult {
    /// A whole network packet: its bytes plus the first fragment's headers.
    Complete {
        net_packet: Bytes,
        first_fragment: Box<LpPacket>,
        cancel_timer: Option<EventId>,
    },
    /// Fragment accepted; more are needed. On a new partial the link
    /// service must start the drop timer and register it with
    /// [`LpReassembler::set_timer`].
    Pending {
        key: ReassemblyKey,
        is_new_partial: bool,
    },
    /// Fragment rejected; any partial under the same key was dropped too.
    Dropped { cancel_timer: Option<EventId> },
}

pub struct LpReassembler {
    options: ReassemblerOptions,
    partials: HashMap<ReassemblyKey, PartialPacket>,
    /// Fires on drop-timer expiry with (endpoint, fragments received).
    pub before_timeout: Signal<(EndpointId, u64)>,
}

impl LpReassembler {
    pub fn new(options: ReassemblerOptions) -> Self {
        Self {
            options,
            partials: HashMap::new(),
            before_timeout: Signal::new(),
        }
    }

    pub fn options(&self) -> &ReassemblerOptions {
        &self.options
    }

    pub fn n_partials(&self) -> usize {
        self.partials.len()
    }

    pub fn receive_fragment(
        &mut self,
        endpoint: EndpointId,
        packet: LpPacket,
    ) -> ReassemblyResult {
        debug_assert!(packet.fragment.is_some());

        let frag_index = packet.frag_index.unwrap_or(0);
        let frag_count = packet.frag_count.unwrap_or(1);

        // fast path: a whole packet in one fragment
        if frag_index == 0 && frag_count == 1 {
            let net_packet = packet.fragment.clone().unwrap();
            return ReassemblyResult::Complete {
                net_packet,
                first_fragment: Box::new(packet),
                cancel_timer: None,
            };
        }

        if frag_index >= frag_count {
            warn!("reassembly error, FragIndex >= FragCount: DROP");
            return self.drop_by_packet(endpoint, &packet);
        }
        if frag_count > self.options.n_max_fragments {
            warn!("reassembly error, FragCount over limit: DROP");
            return self.drop_by_packet(endpoint, &packet);
        }
        let Some(sequence) = packet.sequence else {
            warn!("reassembly error, Sequence missing: DROP");
            return ReassemblyResult::Dropped { cancel_timer: None };
        };

        let key = (endpoint, sequence.wrapping_sub(frag_index));
        let is_new_partial = !self.partials.contains_key(&key);
        let partial = self.partials.entry(key).or_insert_with(|| PartialPacket {
            frag_count,
            n_received: 0,
            fragments: vec![None; frag_count as usize],
            drop_timer: None,
        });

        if frag_count != partial.frag_count {
            warn!("reassembly error, FragCount changed: DROP");
            return self.drop_partial(key);
        }
        if partial.fragments[frag_index as usize].is_some() {
            trace!("fragment already received: DROP");
            return self.drop_partial(key);
        }

        partial.fragments[frag_index as usize] = Some(packet);
        partial.n_received += 1;

        if partial.n_received == partial.frag_count {
            let partial = self.partials.remove(&key).unwrap();
            let mut payload = BytesMut::new();
            for fragment in partial.fragments.iter() {
                let fragment = fragment.as_ref().unwrap();
                payload.extend_from_slice(fragment.fragment.as_ref().unwrap());
            }
            let first_fragment = partial.fragments.into_iter().next().unwrap().unwrap();
            return ReassemblyResult::Complete {
                net_packet: payload.freeze(),
                first_fragment: Box::new(first_fragment),
                cancel_timer: partial.drop_timer,
            };
        }

        ReassemblyResult::Pending { key, is_new_partial }
    }

    /// Registers the drop timer the link service scheduled for `key`.
    pub fn set_timer(&mut self, key: ReassemblyKey, timer: EventId) {
        if let Some(partial) = self.partials.get_mut(&key) {
            partial.drop_timer = Some(timer);
        }
    }

    /// Drop-timer expiry: discards the partial and emits the timeout signal.
    /// Returns how many fragments had arrived, if the partial still existed.
    pub fn timeout(&mut self, key: ReassemblyKey) -> Option<u64> {
        let partial = self.partials.remove(&key)?;
        trace!(
            "reassembly timeout after {} fragments: DROP",
            partial.n_received
        );
        self.before_timeout.emit(&(key.0, partial.n_received));
        Some(partial.n_received)
    }

    fn drop_by_packet(&mut self, endpoint: EndpointId, packet: &LpPacket) -> ReassemblyResult {
        match packet.sequence {
            Some(sequence) => {
                let key = (
                    endpoint,
                    sequence.wrapping_sub(packet.frag_index.unwrap_or(0)),
                );
                self.drop_partial(key)
            }
            None => ReassemblyResult::Dropped { cancel_timer: None },
        }
    }

    fn drop_partial(&mut self, key: ReassemblyKey) -> ReassemblyResult {
        let cancel_timer = self
            .partials
            .remove(&key)
            .and_then(|partial| partial.drop_timer);
        ReassemblyResult::Dropped { cancel_timer }
    }
}
