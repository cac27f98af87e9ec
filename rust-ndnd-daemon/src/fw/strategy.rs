//! Forwarding strategy interface and registry.
//!
//! A strategy decides whether and where to forward each Interest under the
//! namespaces it governs. Triggers are invoked by the forwarder pipelines;
//! actions go back through the forwarder. Strategies must not retain strong
//! references to PIT entries across trigger boundaries; weak references are
//! fine.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rust_ndnd_common::name::NameComponent;
use rust_ndnd_common::{Data, Interest, Nack, NackReason, Name};

use crate::face::FaceId;
use crate::runtime::Runtime;
use crate::tables::fib::NextHop;
use crate::tables::pit;

use super::Forwarder;

/// Prefix under which strategy instance names live.
pub const STRATEGY_NAME_PREFIX: &str = "/localhost/nfd/strategy";

/// Builds the versioned instance name for a strategy keyword, e.g.
/// `/localhost/nfd/strategy/best-route/<version>`.
pub fn make_strategy_name(keyword: &str, version: u64) -> Name {
    make_unversioned_strategy_name(keyword).appended(NameComponent::from_version(version))
}

/// The instance name without its version component; resolves to the highest
/// installed version.
pub fn make_unversioned_strategy_name(keyword: &str) -> Name {
    let mut name = Name::from_string(STRATEGY_NAME_PREFIX);
    name.push(NameComponent::new(keyword.as_bytes().to_vec()));
    name
}

pub trait Strategy {
    /// Versioned name identifying this strategy instance.
    fn name(&self) -> &Name;

    /// The Interest passed scope, loop, and content-store checks and is
    /// under this strategy's namespace. Decide where to send it, or reject
    /// the pending Interest.
    fn after_receive_interest(
        &self,
        forwarder: &mut Forwarder,
        ingress: FaceId,
        interest: &Interest,
        pit_entry: &Rc<RefCell<pit::Entry>>,
    );

    /// The content store answered the Interest. The default returns the
    /// Data toward the requester.
    fn after_content_store_hit(
        &self,
        forwarder: &mut Forwarder,
        ingress: FaceId,
        pit_entry: &Rc<RefCell<pit::Entry>>,
        data: &Data,
    ) {
        forwarder.send_data(pit_entry, data, ingress);
    }

    /// Incoming Data is about to satisfy the PIT entry. Runs before any
    /// downstream delivery.
    fn before_satisfy_interest(
        &self,
        _forwarder: &mut Forwarder,
        _pit_entry: &Rc<RefCell<pit::Entry>>,
        _ingress: FaceId,
        _data: &Data,
    ) {
    }

    /// Opt in to intercept the multi-downstream Data send; when false the
    /// pipeline delivers to all downstreams itself.
    fn wants_after_receive_data(&self) -> bool {
        false
    }

    /// Runs instead of the pipeline's own downstream delivery for
    /// strategies that opted in. The default matches the pipeline.
    fn after_receive_data(
        &self,
        forwarder: &mut Forwarder,
        pit_entry: &Rc<RefCell<pit::Entry>>,
        ingress: FaceId,
        data: &Data,
    ) {
        forwarder.send_data_to_all(pit_entry, ingress, data);
    }

    /// A Nack matched an out-record of the entry and has been recorded on
    /// it.
    fn after_receive_nack(
        &self,
        _forwarder: &mut Forwarder,
        _ingress: FaceId,
        _nack: &Nack,
        _pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
    }

    /// A new FIB nexthop appeared while the entry is still pending.
    fn after_new_next_hop(
        &self,
        _forwarder: &mut Forwarder,
        _next_hop: &NextHop,
        _pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
    }

    /// The entry expired unsatisfied and is about to be erased.
    fn before_expire_pending_interest(
        &self,
        _forwarder: &mut Forwarder,
        _pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
    }
}

/// Least severe of two Nack reasons; used when aggregating upstream Nacks
/// for the downstream.
pub fn less_severe(a: NackReason, b: NackReason) -> NackReason {
    if a == NackReason::None {
        return b;
    }
    if b == NackReason::None {
        return a;
    }
    if a.to_code() <= b.to_code() {
        a
    } else {
        b
    }
}

type StrategyFactory = Rc<dyn Fn(&Runtime) -> Rc<dyn Strategy>>;

/// Maps strategy instance names to factories. Registration happens at
/// startup; the forwarder instantiates and installs every registered
/// strategy.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<Name, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: Name,
        factory: impl Fn(&Runtime) -> Rc<dyn Strategy> + 'static,
    ) {
        self.factories.insert(name, Rc::new(factory));
    }

    /// Registry with every built-in strategy.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(super::best_route::BestRouteStrategy::static_name(), |_| {
            Rc::new(super::best_route::BestRouteStrategy::new())
        });
        registry.register(super::multicast::MulticastStrategy::static_name(), |_| {
            Rc::new(super::multicast::MulticastStrategy::new())
        });
        registry.register(super::access::AccessStrategy::static_name(), |_| {
            Rc::new(super::access::AccessStrategy::new())
        });
        registry.register(
            super::self_learning::SelfLearningStrategy::static_name(),
            |_| Rc::new(super::self_learning::SelfLearningStrategy::new()),
        );
        registry.register(super::asf::AsfStrategy::static_name(), |runtime| {
            Rc::new(super::asf::AsfStrategy::new(runtime.clone()))
        });
        registry
    }

    pub fn names(&self) -> Vec<Name> {
        self.factories.keys().cloned().collect()
    }

    pub fn create_all(&self, runtime: &Runtime) -> Vec<Rc<dyn Strategy>> {
        self.factories
            .values()
            .map(|factory| factory(runtime))
            .collect()
    }
}
