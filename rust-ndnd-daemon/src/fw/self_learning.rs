//! Self-learning strategy: Interests with a known route are unicast;
//! Interests without one become discovery Interests broadcast to every
//! face, and the prefix announcement on the first returning Data installs
//! a route toward its sender.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, trace};
use rust_ndnd_common::packet::CONTENT_TYPE_PREFIX_ANNOUNCEMENT;
use rust_ndnd_common::tlv::TlvElement;
use rust_ndnd_common::{Data, Interest, Name, NackReason};

use crate::face::FaceId;
use crate::tables::pit;

use super::strategy::{make_strategy_name, Strategy};
use super::Forwarder;

/// Cost assigned to self-learned routes.
const LEARNED_ROUTE_COST: u64 = 0;

/// PIT scratch marking a discovery Interest.
struct DiscoveryInfo {
    is_discovery: bool,
}

pub struct SelfLearningStrategy {
    name: Name,
}

impl SelfLearningStrategy {
    pub const VERSION: u64 = 1;

    pub fn static_name() -> Name {
        make_strategy_name("self-learning", Self::VERSION)
    }

    pub fn new() -> Self {
        Self {
            name: Self::static_name(),
        }
    }

    /// Broadcasts a discovery Interest to every face except the
    /// downstream.
    fn broadcast(
        forwarder: &mut Forwarder,
        pit_entry: &Rc<RefCell<pit::Entry>>,
        ingress: FaceId,
    ) -> usize {
        let candidates: Vec<FaceId> = {
            let entry = pit_entry.borrow();
            forwarder
                .faces()
                .ids()
                .into_iter()
                .filter(|&face| face > crate::face::RESERVED_FACE_ID_MAX)
                .filter(|&face| face != ingress)
                .filter(|&face| forwarder.can_forward_to(&entry, face))
                .collect()
        };
        let mut n_sent = 0;
        for face in candidates {
            if forwarder.on_outgoing_interest(pit_entry, face, false) {
                n_sent += 1;
            }
        }
        n_sent
    }
}

impl Default for SelfLearningStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for SelfLearningStrategy {
    fn name(&self) -> &Name {
        &self.name
    }

    fn after_receive_interest(
        &self,
        forwarder: &mut Forwarder,
        ingress: FaceId,
        interest: &Interest,
        pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
        let candidates: Vec<FaceId> = {
            let entry = pit_entry.borrow();
            match forwarder.lookup_fib(&entry) {
                Some(fib_entry) => fib_entry
                    .borrow()
                    .next_hops()
                    .iter()
                    .filter(|nh| forwarder.can_forward_to(&entry, nh.face))
                    .map(|nh| nh.face)
                    .collect(),
                None => Vec::new(),
            }
        };

        if let Some(&face) = candidates.first() {
            pit_entry
                .borrow_mut()
                .strategy_info
                .insert(DiscoveryInfo {
                    is_discovery: false,
                });
            forwarder.on_outgoing_interest(pit_entry, face, false);
            return;
        }

        debug!("self-learning: discovery for {}", interest.name);
        pit_entry
            .borrow_mut()
            .strategy_info
            .insert(DiscoveryInfo { is_discovery: true });
        if Self::broadcast(forwarder, pit_entry, ingress) == 0 {
            forwarder.send_nacks(pit_entry, NackReason::NoRoute, &[]);
            forwarder.on_interest_reject(pit_entry);
        }
    }

    fn before_satisfy_interest(
        &self,
        forwarder: &mut Forwarder,
        pit_entry: &Rc<RefCell<pit::Entry>>,
        ingress: FaceId,
        data: &Data,
    ) {
        let is_discovery = pit_entry
            .borrow()
            .strategy_info
            .get::<DiscoveryInfo>()
            .map(|info| info.is_discovery)
            .unwrap_or(false);
        if !is_discovery {
            return;
        }
        // the first Data of a discovery carries a prefix announcement;
        // install the route toward whoever served it
        if data.content_type != CONTENT_TYPE_PREFIX_ANNOUNCEMENT {
            trace!("self-learning: discovery data without announcement");
            return;
        }
        let mut content = data.content.clone();
        let Ok(element) = TlvElement::decode(&mut content) else {
            return;
        };
        let Ok(prefix) = Name::from_tlv(&element) else {
            return;
        };
        debug!(
            "self-learning: learned route {} -> face {}",
            prefix, ingress
        );
        forwarder.add_next_hop(&prefix, ingress, LEARNED_ROUTE_COST);
    }
}
