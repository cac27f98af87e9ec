//! Best-route strategy: lowest-cost eligible upstream, retransmissions to
//! an alternate upstream, Nack aggregation.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;
use rust_ndnd_common::{Interest, Nack, NackReason, Name};

use crate::face::FaceId;
use crate::tables::fib::NextHop;
use crate::tables::pit;

use super::strategy::{less_severe, make_strategy_name, Strategy};
use super::Forwarder;

pub struct BestRouteStrategy {
    name: Name,
}

impl BestRouteStrategy {
    pub const VERSION: u64 = 4;

    pub fn static_name() -> Name {
        make_strategy_name("best-route", Self::VERSION)
    }

    pub fn new() -> Self {
        Self {
            name: Self::static_name(),
        }
    }

    fn eligible_next_hops(
        forwarder: &Forwarder,
        entry: &Rc<RefCell<pit::Entry>>,
    ) -> Vec<NextHop> {
        let entry = entry.borrow();
        let Some(fib_entry) = forwarder.lookup_fib(&entry) else {
            return Vec::new();
        };
        let next_hops = fib_entry.borrow().next_hops().to_vec();
        next_hops
            .into_iter()
            .filter(|nh| forwarder.can_forward_to(&entry, nh.face))
            .collect()
    }
}

impl Default for BestRouteStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for BestRouteStrategy {
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
        let candidates = Self::eligible_next_hops(forwarder, pit_entry);
        if candidates.is_empty() {
            trace!("best-route: no eligible nexthop for {}", pit_entry.borrow().name());
            forwarder.send_nacks(pit_entry, NackReason::NoRoute, &[]);
            forwarder.on_interest_reject(pit_entry);
            return;
        }

        let is_retransmission = !pit_entry.borrow().out_records().is_empty();
        if !is_retransmission {
            forwarder.on_outgoing_interest(pit_entry, candidates[0].face, false);
            return;
        }

        // a retransmission goes to an upstream not yet tried, falling back
        // to the best one with a fresh nonce
        let now = forwarder.runtime().now();
        let untried = candidates.iter().find(|nh| {
            pit_entry
                .borrow()
                .out_record_for(nh.face)
                .map(|r| r.expiry <= now)
                .unwrap_or(true)
        });
        let egress = untried.unwrap_or(&candidates[0]).face;
        forwarder.on_outgoing_interest(pit_entry, egress, true);
    }

    fn after_receive_nack(
        &self,
        forwarder: &mut Forwarder,
        _ingress: FaceId,
        _nack: &Nack,
        pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
        // only once every upstream has answered with a Nack is the entry
        // hopeless; relay the least severe reason downstream
        let reason = {
            let entry = pit_entry.borrow();
            let mut reason = None;
            for record in entry.out_records() {
                match &record.incoming_nack {
                    Some(nack) => {
                        reason = Some(match reason {
                            None => nack.reason,
                            Some(current) => less_severe(current, nack.reason),
                        })
                    }
                    None => return, // an upstream may still answer with Data
                }
            }
            match reason {
                Some(reason) => reason,
                None => return,
            }
        };
        forwarder.send_nacks(pit_entry, reason, &[]);
        forwarder.on_interest_reject(pit_entry);
    }

    fn after_new_next_hop(
        &self,
        forwarder: &mut Forwarder,
        next_hop: &NextHop,
        pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
        let eligible = forwarder.can_forward_to(&pit_entry.borrow(), next_hop.face);
        if eligible {
            forwarder.on_outgoing_interest(pit_entry, next_hop.face, false);
        }
    }
}
