//! The forwarder: owns every table and threads packets through the
//! pipelines.
//!
//! Pipelines are plain methods invoked from the event loop or from timer
//! events. Scope enforcement and loop detection run once per pipeline;
//! strategies are dispatched by longest-prefix match on the StrategyChoice
//! table and act back on the forwarder through the action methods.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, trace};
use rand::Rng;
use rust_ndnd_common::metrics::Counter;
use rust_ndnd_common::packet::CachePolicy;
use rust_ndnd_common::{Data, Interest, Nack, NackReason, Name, NetPacket};

use crate::face::reassembler::ReassemblyKey;
use crate::face::{
    EndpointId, Face, FaceId, FaceScope, FaceTable, LinkType, CONTENT_STORE_FACE_ID,
};
use crate::runtime::Runtime;
use crate::tables::fib::NextHop;
use crate::tables::measurements::MeasurementsAccessor;
use crate::tables::pit::{self, find_duplicate_nonce};
use crate::tables::{Cs, DeadNonceList, Fib, Measurements, NameTree, Pit, StrategyChoice};

use super::strategy::{make_unversioned_strategy_name, StrategyRegistry};
use super::unsolicited_data_policy::{DropAllPolicy, UnsolicitedDataPolicy};

fn localhost_prefix() -> &'static Name {
    static PREFIX: OnceLock<Name> = OnceLock::new();
    PREFIX.get_or_init(|| Name::from_string("/localhost"))
}

fn localhop_prefix() -> &'static Name {
    static PREFIX: OnceLock<Name> = OnceLock::new();
    PREFIX.get_or_init(|| Name::from_string("/localhop"))
}

#[derive(Debug, Clone, Default)]
pub struct ForwarderCounters {
    pub n_in_interests: Counter,
    pub n_out_interests: Counter,
    pub n_in_data: Counter,
    pub n_out_data: Counter,
    pub n_in_nacks: Counter,
    pub n_out_nacks: Counter,
    pub n_cs_hits: Counter,
    pub n_cs_misses: Counter,
    pub n_satisfied: Counter,
    pub n_unsatisfied: Counter,
    pub n_scope_violations: Counter,
    pub n_unsolicited_data: Counter,
}

pub struct Forwarder {
    runtime: Runtime,
    faces: FaceTable,
    name_tree: NameTree,
    fib: Fib,
    pit: Pit,
    cs: Cs,
    measurements: Measurements,
    strategy_choice: StrategyChoice,
    dead_nonce_list: DeadNonceList,
    unsolicited_data_policy: Box<dyn UnsolicitedDataPolicy>,
    pub counters: ForwarderCounters,
}

impl Forwarder {
    pub fn new(runtime: Runtime) -> Self {
        Self::with_registry(runtime, StrategyRegistry::with_builtins())
    }

    pub fn with_registry(runtime: Runtime, registry: StrategyRegistry) -> Self {
        let name_tree = NameTree::new();
        let mut forwarder = Self {
            fib: Fib::new(name_tree.clone()),
            pit: Pit::new(name_tree.clone()),
            cs: Cs::new(crate::tables::cs::DEFAULT_CAPACITY),
            measurements: Measurements::new(name_tree.clone()),
            strategy_choice: StrategyChoice::new(name_tree.clone()),
            dead_nonce_list: DeadNonceList::new(
                crate::tables::dead_nonce_list::DEFAULT_LIFETIME,
            ),
            unsolicited_data_policy: Box::new(DropAllPolicy),
            faces: FaceTable::new(),
            name_tree,
            counters: ForwarderCounters::default(),
            runtime: runtime.clone(),
        };
        for strategy in registry.create_all(&runtime) {
            forwarder.strategy_choice.install(strategy);
        }
        forwarder
            .strategy_choice
            .insert(&Name::new(), &make_unversioned_strategy_name("best-route"))
            .expect("the default strategy must be installed");

        // the null face swallows whatever is routed to it
        let null_face = Face::new(
            crate::face::GenericLinkService::new(Default::default(), runtime.clone()),
            Box::new(crate::face::NullTransport::new()),
        );
        forwarder.add_reserved_face(null_face, crate::face::NULL_FACE_ID);

        Self::schedule_housekeeping(&runtime, forwarder.dead_nonce_list.mark_interval());
        forwarder
    }

    fn schedule_housekeeping(runtime: &Runtime, interval: Duration) {
        let next_runtime = runtime.clone();
        runtime.scheduler().schedule(
            interval,
            Box::new(move |forwarder| {
                forwarder.dead_nonce_list.mark();
                let now = forwarder.runtime.now();
                forwarder.measurements.cleanup_expired(now);
                forwarder.close_expired_faces(now);
                let interval = forwarder.dead_nonce_list.mark_interval();
                Self::schedule_housekeeping(&next_runtime, interval);
            }),
        );
    }

    /* ------------------------------------------------------------ *\
     * Accessors
    \* ------------------------------------------------------------ */

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
    pub fn faces(&self) -> &FaceTable {
        &self.faces
    }
    pub fn name_tree(&self) -> &NameTree {
        &self.name_tree
    }
    pub fn fib(&self) -> &Fib {
        &self.fib
    }
    pub fn pit(&self) -> &Pit {
        &self.pit
    }
    pub fn cs(&self) -> &Cs {
        &self.cs
    }
    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }
    pub fn strategy_choice(&self) -> &StrategyChoice {
        &self.strategy_choice
    }
    pub fn dead_nonce_list(&self) -> &DeadNonceList {
        &self.dead_nonce_list
    }
    pub fn dead_nonce_list_mut(&mut self) -> &mut DeadNonceList {
        &mut self.dead_nonce_list
    }

    pub fn set_unsolicited_data_policy(&mut self, policy: Box<dyn UnsolicitedDataPolicy>) {
        self.unsolicited_data_policy = policy;
    }

    /// A strategy's filtered window onto the Measurements table.
    pub fn strategy_measurements(&self, strategy_name: &Name) -> MeasurementsAccessor {
        MeasurementsAccessor::new(
            self.measurements.clone(),
            self.strategy_choice.clone(),
            strategy_name.clone(),
        )
    }

    /* ------------------------------------------------------------ *\
     * Face lifecycle
    \* ------------------------------------------------------------ */

    pub fn add_face(&mut self, face: Face) -> Rc<RefCell<Face>> {
        self.faces.add(face)
    }

    pub fn add_reserved_face(&mut self, face: Face, id: FaceId) -> Rc<RefCell<Face>> {
        self.faces.add_reserved(face, id)
    }

    /// Closes on-demand faces whose expiration time has passed.
    fn close_expired_faces(&mut self, now: std::time::Instant) {
        let expired: Vec<FaceId> = self
            .faces
            .iter()
            .filter(|(_, face)| {
                let face = face.borrow();
                face.persistency() == crate::face::FacePersistency::OnDemand
                    && face.expiration_time().map(|t| t <= now).unwrap_or(false)
            })
            .map(|(id, _)| id)
            .collect();
        for id in expired {
            debug!("face {} expired: CLOSE", id);
            self.remove_face(id);
        }
    }

    /// Removes a face and purges every reference to it from the tables.
    pub fn remove_face(&mut self, id: FaceId) {
        self.faces.remove(id);
        self.fib.remove_next_hop_from_all_entries(id);
        for entry in self.pit.entries() {
            let mut entry = entry.borrow_mut();
            entry.delete_in_record(id);
            entry.delete_out_record(id);
        }
    }

    /// Feeds one raw block from a face's transport through its link service
    /// and on into the pipelines.
    pub fn receive_block(&mut self, face_id: FaceId, block: Bytes, endpoint: EndpointId) {
        let Some(face) = self.faces.get(face_id) else {
            return;
        };
        let packet = face.borrow_mut().receive_block(block, endpoint);
        if let Some(packet) = packet {
            self.process_packet(face_id, packet);
        }
    }

    pub fn process_packet(&mut self, ingress: FaceId, packet: NetPacket) {
        match packet {
            NetPacket::Interest(interest) => self.on_incoming_interest(ingress, interest),
            NetPacket::Data(data) => self.on_incoming_data(ingress, data),
            NetPacket::Nack(nack) => self.on_incoming_nack(ingress, nack),
        }
    }

    fn face_scope(&self, id: FaceId) -> Option<FaceScope> {
        self.faces.get(id).map(|face| face.borrow().scope())
    }

    fn face_link_type(&self, id: FaceId) -> Option<LinkType> {
        self.faces.get(id).map(|face| face.borrow().link_type())
    }

    /* ------------------------------------------------------------ *\
     * Interest pipelines
    \* ------------------------------------------------------------ */

    pub fn on_incoming_interest(&mut self, ingress: FaceId, mut interest: Interest) {
        self.counters.n_in_interests.increment();
        trace!("incoming interest {} face={}", interest.name, ingress);

        // /localhost is reachable from local faces only
        if localhost_prefix().is_prefix_of(&interest.name)
            && self.face_scope(ingress) == Some(FaceScope::NonLocal)
        {
            debug!("interest {} violates /localhost scope: DROP", interest.name);
            self.counters.n_scope_violations.increment();
            return;
        }

        interest.tags.incoming_face_id = Some(ingress);

        if self
            .dead_nonce_list
            .has(&interest.name, interest.nonce)
        {
            self.on_interest_loop(ingress, interest);
            return;
        }

        let (entry, is_new) = self.pit.insert(&interest);

        let duplicate = find_duplicate_nonce(&entry.borrow(), interest.nonce, ingress);
        if duplicate.is_loop() {
            self.on_interest_loop(ingress, interest);
            return;
        }

        let now = self.runtime.now();
        entry
            .borrow_mut()
            .insert_or_update_in_record(ingress, &interest, now);
        let expiry = entry.borrow().last_in_record_expiry().unwrap_or(now);
        self.set_expiry_timer(&entry, expiry.saturating_duration_since(now));

        if is_new {
            let cs = self.cs.clone();
            let mut hit = None;
            cs.find(&interest, now, |_, data| hit = Some(data), |_| {});
            match hit {
                Some(data) => self.on_content_store_hit(ingress, &entry, data),
                None => self.on_content_store_miss(ingress, &entry, &interest),
            }
        } else {
            // already pending: the store was consulted when the entry was
            // created
            self.on_content_store_miss(ingress, &entry, &interest);
        }
    }

    /// A looped Interest is nacked on point-to-point and ad-hoc links;
    /// multi-access receivers must suppress independently, so it is dropped.
    fn on_interest_loop(&mut self, ingress: FaceId, interest: Interest) {
        debug!("interest loop {} nonce={}", interest.name, interest.nonce);
        let Some(face) = self.faces.get(ingress) else {
            return;
        };
        if face.borrow().link_type() == LinkType::MultiAccess {
            trace!("loop on multi-access face: DROP");
            return;
        }
        let nack = Nack::new(NackReason::Duplicate, interest);
        face.borrow_mut().send_nack(&nack);
        self.counters.n_out_nacks.increment();
    }

    fn on_content_store_hit(
        &mut self,
        ingress: FaceId,
        entry: &Rc<RefCell<pit::Entry>>,
        mut data: Data,
    ) {
        self.counters.n_cs_hits.increment();
        trace!("content store hit {}", data.name);
        data.tags.incoming_face_id = Some(CONTENT_STORE_FACE_ID);
        {
            let mut entry = entry.borrow_mut();
            entry.satisfied = true;
            entry.data_freshness = Some(data.freshness_period);
        }
        let strategy = self.strategy_choice.find_effective_strategy(&data.name);
        strategy.after_content_store_hit(self, ingress, entry, &data);
        self.set_expiry_timer(entry, Duration::ZERO);
    }

    fn on_content_store_miss(
        &mut self,
        ingress: FaceId,
        entry: &Rc<RefCell<pit::Entry>>,
        interest: &Interest,
    ) {
        self.counters.n_cs_misses.increment();

        // a local client may pin the upstream outright
        if let Some(next_hop) = interest.tags.next_hop_face_id {
            if self.faces.get(next_hop).is_some() {
                self.on_outgoing_interest(entry, next_hop, false);
            } else {
                debug!("NextHopFaceId {} unknown: DROP", next_hop);
            }
            return;
        }

        let name = entry.borrow().name().clone();
        let strategy = self.strategy_choice.find_effective_strategy(&name);
        strategy.after_receive_interest(self, ingress, interest, entry);
    }

    /// Sends the entry's Interest toward `egress`. Returns false when the
    /// send is blocked by scope, reverse-path, or a dead face.
    pub fn on_outgoing_interest(
        &mut self,
        entry: &Rc<RefCell<pit::Entry>>,
        egress: FaceId,
        want_new_nonce: bool,
    ) -> bool {
        let Some(face) = self.faces.get(egress) else {
            return false;
        };
        if !face.borrow().is_alive() {
            trace!("send on dead face {}: IGNORE", egress);
            return false;
        }

        let now = self.runtime.now();
        let (mut interest, nonce, lifetime) = {
            let entry = entry.borrow();

            if self.is_violating_scope(&entry, face.borrow().scope()) {
                self.counters.n_scope_violations.increment();
                return false;
            }
            // reverse-path prevention: never bounce an Interest back out its
            // only downstream unless the link is ad-hoc
            let records = entry.in_records();
            if !records.is_empty()
                && records.iter().all(|r| r.face == egress)
                && face.borrow().link_type() != LinkType::AdHoc
            {
                trace!("interest would return to its sole downstream: DROP");
                return false;
            }

            // nonce source: newest in-record not from egress, else any
            let pick = records
                .iter()
                .filter(|r| r.face != egress)
                .max_by_key(|r| r.expiry)
                .or_else(|| records.iter().max_by_key(|r| r.expiry));
            match pick {
                Some(record) => (
                    record.interest.clone(),
                    if want_new_nonce {
                        rand::thread_rng().gen()
                    } else {
                        record.nonce
                    },
                    record.interest.lifetime,
                ),
                // probing without a downstream always uses a fresh nonce
                None => {
                    let interest = entry.interest().clone();
                    let lifetime = interest.lifetime;
                    (interest, rand::thread_rng().gen(), lifetime)
                }
            }
        };
        interest.nonce = nonce;

        entry
            .borrow_mut()
            .insert_or_update_out_record(egress, nonce, lifetime, now);

        face.borrow_mut().send_interest(&interest);
        self.counters.n_out_interests.increment();
        true
    }

    /// Scope enforcement for outbound packets (§ scope matrix): /localhost
    /// never leaves through a non-local face; /localhop leaves a non-local
    /// face only when some downstream is local.
    fn is_violating_scope(&self, entry: &pit::Entry, egress_scope: FaceScope) -> bool {
        if egress_scope == FaceScope::Local {
            return false;
        }
        let name = entry.name();
        if localhost_prefix().is_prefix_of(name) {
            return true;
        }
        if localhop_prefix().is_prefix_of(name) {
            let has_local_downstream = entry
                .in_records()
                .iter()
                .any(|r| self.face_scope(r.face) == Some(FaceScope::Local));
            return !has_local_downstream;
        }
        false
    }

    /// Strategy action: the entry cannot be forwarded; let it expire now.
    pub fn on_interest_reject(&mut self, entry: &Rc<RefCell<pit::Entry>>) {
        trace!("reject pending interest {}", entry.borrow().name());
        self.set_expiry_timer(entry, Duration::ZERO);
    }

    /// (Re)arms the entry's expiry timer.
    pub fn set_expiry_timer(&mut self, entry: &Rc<RefCell<pit::Entry>>, after: Duration) {
        let previous = entry.borrow_mut().expiry_timer.take();
        if let Some(previous) = previous {
            self.runtime.scheduler().cancel(previous);
        }
        let weak = Rc::downgrade(entry);
        let timer = self.runtime.scheduler().schedule(
            after,
            Box::new(move |forwarder| {
                if let Some(entry) = weak.upgrade() {
                    forwarder.on_interest_finalize(&entry);
                }
            }),
        );
        entry.borrow_mut().expiry_timer = Some(timer);
    }

    /// End of a PIT entry's life: strategy expiry trigger for unsatisfied
    /// entries, dead-nonce insertion for every retired out-record, erase.
    fn on_interest_finalize(&mut self, entry: &Rc<RefCell<pit::Entry>>) {
        let satisfied = entry.borrow().satisfied;
        if satisfied {
            self.counters.n_satisfied.increment();
        } else {
            self.counters.n_unsatisfied.increment();
            let name = entry.borrow().name().clone();
            let strategy = self.strategy_choice.find_effective_strategy(&name);
            strategy.before_expire_pending_interest(self, entry);
        }

        // a nonce can still loop back unless the store will answer the
        // duplicate for the rest of the dead-nonce window
        let needs_dead_nonce = {
            let entry = entry.borrow();
            !entry.satisfied
                || entry
                    .data_freshness
                    .map(|freshness| freshness < self.dead_nonce_list.lifetime())
                    .unwrap_or(true)
        };
        if needs_dead_nonce {
            let (name, nonces): (Name, Vec<u32>) = {
                let entry = entry.borrow();
                (
                    entry.name().clone(),
                    entry.out_records().iter().map(|r| r.nonce).collect(),
                )
            };
            for nonce in nonces {
                self.dead_nonce_list.add(&name, nonce);
            }
        }

        let timer = entry.borrow_mut().expiry_timer.take();
        if let Some(timer) = timer {
            self.runtime.scheduler().cancel(timer);
        }
        self.pit.erase(entry);
    }

    /* ------------------------------------------------------------ *\
     * Data pipelines
    \* ------------------------------------------------------------ */

    pub fn on_incoming_data(&mut self, ingress: FaceId, mut data: Data) {
        self.counters.n_in_data.increment();
        trace!("incoming data {} face={}", data.name, ingress);

        if localhost_prefix().is_prefix_of(&data.name)
            && self.face_scope(ingress) == Some(FaceScope::NonLocal)
        {
            debug!("data {} violates /localhost scope: DROP", data.name);
            self.counters.n_scope_violations.increment();
            return;
        }

        data.tags.incoming_face_id = Some(ingress);

        let matches = self.pit.data_matches(&data);
        if matches.is_empty() {
            self.on_data_unsolicited(ingress, data);
            return;
        }

        let now = self.runtime.now();
        if data.tags.cache_policy != Some(CachePolicy::NoCache) {
            self.cs.insert(data.clone(), false, now);
        }

        for entry in matches {
            let name = entry.borrow().name().clone();
            let strategy = self.strategy_choice.find_effective_strategy(&name);

            // satisfy-first, data-after: beforeSatisfyInterest always runs
            // before any downstream delivery
            strategy.before_satisfy_interest(self, &entry, ingress, &data);
            {
                let mut entry = entry.borrow_mut();
                entry.satisfied = true;
                entry.data_freshness = Some(data.freshness_period);
            }

            if strategy.wants_after_receive_data() {
                strategy.after_receive_data(self, &entry, ingress, &data);
            } else {
                self.send_data_to_all(&entry, ingress, &data);
            }

            // satisfied entries retire immediately so later Data is
            // unsolicited
            self.set_expiry_timer(&entry, Duration::ZERO);
        }
    }

    fn on_data_unsolicited(&mut self, ingress: FaceId, data: Data) {
        self.counters.n_unsolicited_data.increment();
        let Some(scope) = self.face_scope(ingress) else {
            return;
        };
        if self.unsolicited_data_policy.admit(scope) {
            debug!("unsolicited data {}: CACHE", data.name);
            let now = self.runtime.now();
            self.cs.insert(data, true, now);
        } else {
            trace!("unsolicited data {}: DROP", data.name);
        }
    }

    /// Sends `data` out of `egress`, subject to scope enforcement.
    pub fn on_outgoing_data(&mut self, data: &Data, egress: FaceId) -> bool {
        let Some(face) = self.faces.get(egress) else {
            return false;
        };
        if !face.borrow().is_alive() {
            trace!("send on dead face {}: IGNORE", egress);
            return false;
        }
        if face.borrow().scope() == FaceScope::NonLocal
            && localhost_prefix().is_prefix_of(&data.name)
        {
            debug!("data {} violates /localhost scope: DROP", data.name);
            self.counters.n_scope_violations.increment();
            return false;
        }
        face.borrow_mut().send_data(data);
        self.counters.n_out_data.increment();
        true
    }

    /// Strategy action: deliver `data` to `egress`, consuming its in-record.
    pub fn send_data(&mut self, entry: &Rc<RefCell<pit::Entry>>, data: &Data, egress: FaceId) {
        entry.borrow_mut().delete_in_record(egress);
        self.on_outgoing_data(data, egress);
    }

    /// Strategy action: deliver `data` to every downstream except `ingress`.
    pub fn send_data_to_all(
        &mut self,
        entry: &Rc<RefCell<pit::Entry>>,
        ingress: FaceId,
        data: &Data,
    ) {
        let downstreams: Vec<FaceId> = entry
            .borrow()
            .in_records()
            .iter()
            .filter(|r| r.face != ingress)
            .map(|r| r.face)
            .collect();
        for face in downstreams {
            self.send_data(entry, data, face);
        }
    }

    /* ------------------------------------------------------------ *\
     * Nack pipelines
    \* ------------------------------------------------------------ */

    pub fn on_incoming_nack(&mut self, ingress: FaceId, nack: Nack) {
        self.counters.n_in_nacks.increment();

        // a Nack on a shared medium is ambiguous
        if self.face_link_type(ingress) != Some(LinkType::PointToPoint) {
            debug!("nack on non-point-to-point face {}: DROP", ingress);
            return;
        }

        let Some(entry) = self.pit.nack_matches(&nack) else {
            trace!("nack {} without PIT entry: DROP", nack.name());
            return;
        };
        {
            let mut entry = entry.borrow_mut();
            let Some(out_record) = entry.out_record_for_mut(ingress) else {
                trace!("nack {} without out-record: DROP", nack.name());
                return;
            };
            if out_record.nonce != nack.interest.nonce {
                trace!("nack {} nonce mismatch: DROP", nack.name());
                return;
            }
            out_record.incoming_nack = Some(nack.clone());
        }

        let name = entry.borrow().name().clone();
        let strategy = self.strategy_choice.find_effective_strategy(&name);
        strategy.after_receive_nack(self, ingress, &nack, &entry);
    }

    /// Strategy action: nack the downstream `egress`, consuming its
    /// in-record.
    pub fn on_outgoing_nack(
        &mut self,
        entry: &Rc<RefCell<pit::Entry>>,
        egress: FaceId,
        reason: NackReason,
    ) -> bool {
        let Some(face) = self.faces.get(egress) else {
            return false;
        };
        if face.borrow().link_type() != LinkType::PointToPoint {
            debug!("nack to non-point-to-point face {}: DROP", egress);
            return false;
        }
        let interest = match entry.borrow().in_record_for(egress) {
            Some(record) => record.interest.clone(),
            None => {
                trace!("nack to face {} without in-record: DROP", egress);
                return false;
            }
        };
        entry.borrow_mut().delete_in_record(egress);

        let nack = Nack::new(reason, interest);
        face.borrow_mut().send_nack(&nack);
        self.counters.n_out_nacks.increment();
        true
    }

    /// Strategy helper: nack every downstream except `except`.
    pub fn send_nacks(
        &mut self,
        entry: &Rc<RefCell<pit::Entry>>,
        reason: NackReason,
        except: &[FaceId],
    ) {
        let downstreams: Vec<FaceId> = entry
            .borrow()
            .in_records()
            .iter()
            .map(|r| r.face)
            .filter(|face| !except.contains(face))
            .collect();
        for face in downstreams {
            self.on_outgoing_nack(entry, face, reason);
        }
    }

    /* ------------------------------------------------------------ *\
     * FIB mutation and new-nexthop dispatch
    \* ------------------------------------------------------------ */

    /// Installs a nexthop and lets strategies retry pending Interests
    /// toward it.
    pub fn add_next_hop(&mut self, prefix: &Name, face: FaceId, cost: u64) -> bool {
        let is_new = self.fib.add_or_update_next_hop(prefix, face, cost);
        if is_new {
            self.on_new_next_hop(prefix, NextHop { face, cost });
        }
        is_new
    }

    fn on_new_next_hop(&mut self, prefix: &Name, next_hop: NextHop) {
        for entry in self.pit.entries_under(prefix) {
            if entry.borrow().satisfied {
                continue;
            }
            let name = entry.borrow().name().clone();
            let strategy = self.strategy_choice.find_effective_strategy(&name);
            strategy.after_new_next_hop(self, &next_hop, &entry);
        }
    }

    /// Strategy helper: the FIB entry governing the entry's name.
    pub fn lookup_fib(
        &self,
        entry: &pit::Entry,
    ) -> Option<Rc<RefCell<crate::tables::fib::Entry>>> {
        self.fib.find_longest_prefix_match(entry.name())
    }

    /// Strategy helper: whether an Interest from this entry may be sent to
    /// `egress` at all.
    pub fn can_forward_to(&self, entry: &pit::Entry, egress: FaceId) -> bool {
        let Some(face) = self.faces.get(egress) else {
            return false;
        };
        let face = face.borrow();
        if !face.is_alive() {
            return false;
        }
        let records = entry.in_records();
        if !records.is_empty()
            && records.iter().all(|r| r.face == egress)
            && face.link_type() != LinkType::AdHoc
        {
            return false;
        }
        !self.is_violating_scope(entry, face.scope())
    }

    /* ------------------------------------------------------------ *\
     * Link-layer timer entry points
    \* ------------------------------------------------------------ */

    pub fn on_reassembly_timeout(&mut self, face_id: FaceId, key: ReassemblyKey) {
        if let Some(face) = self.faces.get(face_id) {
            face.borrow_mut().handle_reassembly_timeout(key);
        }
    }

    pub fn on_lp_frag_lost(&mut self, face_id: FaceId, tx_seq: u64) {
        if let Some(face) = self.faces.get(face_id) {
            face.borrow_mut().handle_frag_lost(tx_seq);
        }
    }

    pub fn on_idle_ack_timer(&mut self, face_id: FaceId) {
        if let Some(face) = self.faces.get(face_id) {
            face.borrow_mut().handle_idle_ack_timer();
        }
    }
}
