//! Transport: the lower half of a face.
//!
//! A transport moves opaque TLV blocks to and from one peer. Concrete
//! socket transports live outside the core; the implementations here are
//! the in-process ones the daemon itself needs, plus the recording
//! transport used by tests. Concrete implementations override the narrow
//! `do_send` / `do_close` surface and share state via [`TransportBase`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bytes::Bytes;
use log::trace;
use rust_ndnd_common::metrics::Counter;
use rust_ndnd_common::Error;

use super::{FacePersistency, FaceScope, FaceState, LinkType};
use crate::signal::Signal;

/// Identifies the remote endpoint on a multi-peer transport; in-process
/// transports use 0.
pub type EndpointId = u64;

#[derive(Debug, Clone, Default)]
pub struct TransportCounters {
    pub n_in_packets: Counter,
    pub n_out_packets: Counter,
    pub n_in_bytes: Counter,
    pub n_out_bytes: Counter,
}

/// State shared by every transport implementation.
pub struct TransportBase {
    local_uri: String,
    remote_uri: String,
    scope: FaceScope,
    persistency: FacePersistency,
    link_type: LinkType,
    mtu: Option<usize>,
    state: FaceState,
    pub counters: TransportCounters,
    pub after_state_change: Signal<(FaceState, FaceState)>,
}

impl TransportBase {
    pub fn new(
        local_uri: impl Into<String>,
        remote_uri: impl Into<String>,
        scope: FaceScope,
        persistency: FacePersistency,
        link_type: LinkType,
        mtu: Option<usize>,
    ) -> Self {
        Self {
            local_uri: local_uri.into(),
            remote_uri: remote_uri.into(),
            scope,
            persistency,
            link_type,
            mtu,
            state: FaceState::Up,
            counters: TransportCounters::default(),
            after_state_change: Signal::new(),
        }
    }

    pub fn local_uri(&self) -> &str {
        &self.local_uri
    }
    pub fn remote_uri(&self) -> &str {
        &self.remote_uri
    }
    pub fn scope(&self) -> FaceScope {
        self.scope
    }
    pub fn persistency(&self) -> FacePersistency {
        self.persistency
    }
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }
    /// `None` means unlimited. Applies to the encoded LP packet, envelope
    /// included.
    pub fn mtu(&self) -> Option<usize> {
        self.mtu
    }
    pub fn state(&self) -> FaceState {
        self.state
    }

    /// Performs a state transition. Only the legal set is accepted; any
    /// other transition is a hard error.
    pub fn set_state(&mut self, new_state: FaceState) -> Result<(), Error> {
        use FaceState::*;
        let old_state = self.state;
        if old_state == new_state {
            return Ok(());
        }
        let valid = matches!(
            (old_state, new_state),
            (Up, Down)
                | (Down, Up)
                | (Up, Closing)
                | (Up, Failed)
                | (Down, Closing)
                | (Down, Failed)
                | (Closing, Closed)
                | (Failed, Closed)
        );
        if !valid {
            return Err(Error::InvalidStateTransition(format!(
                "{:?} -> {:?}",
                old_state, new_state
            )));
        }
        self.state = new_state;
        self.after_state_change.emit(&(old_state, new_state));
        Ok(())
    }

    fn set_persistency(&mut self, persistency: FacePersistency) {
        self.persistency = persistency;
    }
}

pub trait Transport {
    fn base(&self) -> &TransportBase;
    fn base_mut(&mut self) -> &mut TransportBase;

    /// Hands one encoded block to the underlying channel.
    fn do_send(&mut self, block: Bytes);

    /// Starts shutting the underlying channel down.
    fn do_close(&mut self);

    /// Whether this implementation supports the requested persistency.
    fn can_change_persistency_to_impl(&self, _new_persistency: FacePersistency) -> bool {
        true
    }

    fn send_queue_capacity(&self) -> Option<usize> {
        None
    }

    fn send_queue_length(&self) -> usize {
        0
    }

    /// Sends `block` unless the transport is shutting down. Sends in a
    /// non-UP/DOWN state are silently ignored.
    fn send(&mut self, block: Bytes) {
        match self.base().state() {
            FaceState::Up | FaceState::Down => {
                self.base().counters.n_out_packets.increment();
                self.base().counters.n_out_bytes.add(block.len() as u64);
                self.do_send(block);
            }
            state => trace!("transport send ignored in state {:?}", state),
        }
    }

    fn change_persistency(&mut self, new_persistency: FacePersistency) -> Result<(), Error> {
        if self.base().persistency() == new_persistency {
            return Ok(());
        }
        if !self.can_change_persistency_to_impl(new_persistency) {
            return Err(Error::Face(format!(
                "cannot change persistency to {:?}",
                new_persistency
            )));
        }
        self.base_mut().set_persistency(new_persistency);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        match self.base().state() {
            FaceState::Up | FaceState::Down => {
                self.base_mut().set_state(FaceState::Closing)?;
                self.do_close();
                self.base_mut().set_state(FaceState::Closed)
            }
            _ => Ok(()),
        }
    }

    /// Counts one received block. Invoked by whoever feeds bytes in.
    fn count_received(&self, block: &Bytes) {
        self.base().counters.n_in_packets.increment();
        self.base().counters.n_in_bytes.add(block.len() as u64);
    }
}

/* ---------------------------------------------------------------- *\
 * NullTransport
\* ---------------------------------------------------------------- */

/// Permanently-up transport that discards everything; backs the null face.
pub struct NullTransport {
    base: TransportBase,
}

impl NullTransport {
    pub fn new() -> Self {
        Self {
            base: TransportBase::new(
                "null://",
                "null://",
                FaceScope::NonLocal,
                FacePersistency::Permanent,
                LinkType::PointToPoint,
                None,
            ),
        }
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for NullTransport {
    fn base(&self) -> &TransportBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut TransportBase {
        &mut self.base
    }
    fn do_send(&mut self, _block: Bytes) {}
    fn do_close(&mut self) {}
    fn can_change_persistency_to_impl(&self, new_persistency: FacePersistency) -> bool {
        new_persistency == FacePersistency::Permanent
    }
}

/* ---------------------------------------------------------------- *\
 * InternalTransport
\* ---------------------------------------------------------------- */

/// Forwarder-side half of the in-process pair used by the management
/// dispatcher. Sent blocks land in a queue the client side drains; the
/// client injects blocks through [`super::Face::receive_block`].
pub struct InternalTransport {
    base: TransportBase,
    outbox: Rc<RefCell<VecDeque<Bytes>>>,
}

impl InternalTransport {
    pub fn new() -> Self {
        Self {
            base: TransportBase::new(
                "internal://",
                "internal://",
                FaceScope::Local,
                FacePersistency::Permanent,
                LinkType::PointToPoint,
                None,
            ),
            outbox: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Queue of blocks the forwarder has sent toward the client side.
    pub fn outbox(&self) -> Rc<RefCell<VecDeque<Bytes>>> {
        Rc::clone(&self.outbox)
    }
}

impl Default for InternalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for InternalTransport {
    fn base(&self) -> &TransportBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut TransportBase {
        &mut self.base
    }
    fn do_send(&mut self, block: Bytes) {
        self.outbox.borrow_mut().push_back(block);
    }
    fn do_close(&mut self) {
        self.outbox.borrow_mut().clear();
    }
    fn send_queue_length(&self) -> usize {
        self.outbox.borrow().len()
    }
}

/* ---------------------------------------------------------------- *\
 * DummyTransport
\* ---------------------------------------------------------------- */

/// Records every sent block; tests inspect the log and inject received
/// blocks through the owning face.
pub struct DummyTransport {
    base: TransportBase,
    sent_blocks: Rc<RefCell<Vec<Bytes>>>,
}

impl DummyTransport {
    pub fn new(scope: FaceScope, link_type: LinkType, mtu: Option<usize>) -> Self {
        Self {
            base: TransportBase::new(
                "dummy://",
                "dummy://",
                scope,
                FacePersistency::Persistent,
                link_type,
                mtu,
            ),
            sent_blocks: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn sent_blocks(&self) -> Rc<RefCell<Vec<Bytes>>> {
        Rc::clone(&self.sent_blocks)
    }
}

impl Transport for DummyTransport {
    fn base(&self) -> &TransportBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut TransportBase {
        &mut self.base
    }
    fn do_send(&mut self, block: Bytes) {
        self.sent_blocks.borrow_mut().push(block);
    }
    fn do_close(&mut self) {}
}
