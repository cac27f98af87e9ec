//! Access strategy for ad-hoc edge networks: remember which upstream last
//! served each namespace and try it first, falling back to multicast.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rust_ndnd_common::{Data, Interest, Name, NackReason};

use crate::face::FaceId;
use crate::tables::pit;

use super::strategy::{make_strategy_name, Strategy};
use super::Forwarder;

/// How long a learned last-working upstream stays relevant.
const MEASUREMENTS_LIFETIME: Duration = Duration::from_secs(8);

/// Per-namespace scratch: the upstream that last returned Data.
struct AccessInfo {
    last_next_hop: FaceId,
}

pub struct AccessStrategy {
    name: Name,
}

impl AccessStrategy {
    pub const VERSION: u64 = 1;

    pub fn static_name() -> Name {
        make_strategy_name("access", Self::VERSION)
    }

    pub fn new() -> Self {
        Self {
            name: Self::static_name(),
        }
    }

    fn last_next_hop(&self, forwarder: &Forwarder, name: &Name) -> Option<FaceId> {
        let accessor = forwarder.strategy_measurements(&self.name);
        let entry = accessor.find_longest_prefix_match(name, |entry| {
            entry.strategy_info.get::<AccessInfo>().is_some()
        })?;
        let entry = entry.borrow();
        entry
            .strategy_info
            .get::<AccessInfo>()
            .map(|info| info.last_next_hop)
    }

    fn multicast(
        &self,
        forwarder: &mut Forwarder,
        pit_entry: &Rc<RefCell<pit::Entry>>,
        except: Option<FaceId>,
    ) -> usize {
        let candidates: Vec<FaceId> = {
            let entry = pit_entry.borrow();
            match forwarder.lookup_fib(&entry) {
                Some(fib_entry) => fib_entry
                    .borrow()
                    .next_hops()
                    .iter()
                    .filter(|nh| Some(nh.face) != except)
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
        n_sent
    }
}

impl Default for AccessStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for AccessStrategy {
    fn name(&self) -> &Name {
        &self.name
    }

    fn after_receive_interest(
        &self,
        forwarder: &mut Forwarder,
        _ingress: FaceId,
        interest: &Interest,
        pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
        // unicast to the last-working upstream when one is known
        if let Some(face) = self.last_next_hop(forwarder, &interest.name) {
            let eligible = forwarder.can_forward_to(&pit_entry.borrow(), face);
            if eligible && forwarder.on_outgoing_interest(pit_entry, face, false) {
                return;
            }
        }

        if self.multicast(forwarder, pit_entry, None) == 0 {
            forwarder.send_nacks(pit_entry, NackReason::NoRoute, &[]);
            forwarder.on_interest_reject(pit_entry);
        }
    }

    fn before_satisfy_interest(
        &self,
        forwarder: &mut Forwarder,
        pit_entry: &Rc<RefCell<pit::Entry>>,
        ingress: FaceId,
        _data: &Data,
    ) {
        // remember the upstream that answered, keyed one component up
        let prefix = pit_entry.borrow().name().parent();
        let now = forwarder.runtime().now();
        let accessor = forwarder.strategy_measurements(&self.name);
        if let Some(entry) = accessor.get(&prefix, now) {
            entry.borrow_mut().strategy_info.insert(AccessInfo {
                last_next_hop: ingress,
            });
            accessor.extend_lifetime(&entry, MEASUREMENTS_LIFETIME, now);
        }
    }
}
