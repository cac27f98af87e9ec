//! Multicast strategy: forward each Interest to every eligible upstream.

use std::cell::RefCell;
use std::rc::Rc;

use rust_ndnd_common::{Interest, Name, NackReason};

use crate::face::FaceId;
use crate::tables::pit;

use super::strategy::{make_strategy_name, Strategy};
use super::Forwarder;

pub struct MulticastStrategy {
    name: Name,
}

impl MulticastStrategy {
    pub const VERSION: u64 = 3;

    pub fn static_name() -> Name {
        make_strategy_name("multicast", Self::VERSION)
    }

    pub fn new() -> Self {
        Self {
            name: Self::static_name(),
        }
    }
}

impl Default for MulticastStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MulticastStrategy {
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

        let mut n_sent = 0;
        for face in candidates {
            if forwarder.on_outgoing_interest(pit_entry, face, false) {
                n_sent += 1;
            }
        }
        if n_sent == 0 {
            forwarder.send_nacks(pit_entry, NackReason::NoRoute, &[]);
            forwarder.on_interest_reject(pit_entry);
        }
    }
}
