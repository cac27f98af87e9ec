//! Faces: logical communication endpoints.
//!
//! A face binds one [`GenericLinkService`] to one [`Transport`] and owns
//! both exclusively. Everything else refers to a face by id through the
//! [`FaceTable`]; dereferencing a dead id yields `None`.

pub mod face_table;
pub mod fragmenter;
pub mod link_service;
pub mod reassembler;
pub mod reliability;
pub mod transport;

pub use face_table::FaceTable;
pub use link_service::{GenericLinkService, LinkServiceCounters, LinkServiceOptions};
pub use transport::{
    DummyTransport, EndpointId, InternalTransport, NullTransport, Transport, TransportCounters,
};

use std::time::Instant;

use bytes::Bytes;
use rust_ndnd_common::{Data, Interest, Nack, NetPacket};

pub type FaceId = u64;

pub const INVALID_FACE_ID: FaceId = 0;
/// The internal management face.
pub const INTERNAL_FACE_ID: FaceId = 1;
/// Marker for Data served from the content store.
pub const CONTENT_STORE_FACE_ID: FaceId = 254;
/// The null face.
pub const NULL_FACE_ID: FaceId = 255;
/// Ids at or below this are reserved; allocation starts above.
pub const RESERVED_FACE_ID_MAX: FaceId = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceState {
    Up,
    Down,
    Closing,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceScope {
    Local,
    NonLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacePersistency {
    OnDemand,
    Persistent,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    PointToPoint,
    MultiAccess,
    AdHoc,
}

/// Combined view over a face's link-service and transport counters.
#[derive(Debug, Clone)]
pub struct FaceCounters {
    pub link: LinkServiceCounters,
    pub transport: TransportCounters,
}

pub struct Face {
    id: FaceId,
    link_service: GenericLinkService,
    transport: Box<dyn Transport>,
    expiration_time: Option<Instant>,
}

impl Face {
    pub fn new(link_service: GenericLinkService, transport: Box<dyn Transport>) -> Self {
        Self {
            id: INVALID_FACE_ID,
            link_service,
            transport,
            expiration_time: None,
        }
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    /// Assigned by the face table; wires the id into the link service.
    pub(crate) fn set_id(&mut self, id: FaceId) {
        self.id = id;
        let scope = self.transport.base().scope();
        self.link_service.attach(id, scope);
    }

    pub fn local_uri(&self) -> String {
        self.transport.base().local_uri().to_string()
    }

    pub fn remote_uri(&self) -> String {
        self.transport.base().remote_uri().to_string()
    }

    pub fn scope(&self) -> FaceScope {
        self.transport.base().scope()
    }

    pub fn persistency(&self) -> FacePersistency {
        self.transport.base().persistency()
    }

    pub fn link_type(&self) -> LinkType {
        self.transport.base().link_type()
    }

    pub fn mtu(&self) -> Option<usize> {
        self.transport.base().mtu()
    }

    pub fn state(&self) -> FaceState {
        self.transport.base().state()
    }

    /// When set, an on-demand face past this instant is closed by the
    /// housekeeping timer.
    pub fn expiration_time(&self) -> Option<Instant> {
        self.expiration_time
    }

    pub fn set_expiration_time(&mut self, expiration_time: Option<Instant>) {
        self.expiration_time = expiration_time;
    }

    /// A face can carry traffic while Up or Down (a Down face may recover).
    pub fn is_alive(&self) -> bool {
        matches!(self.state(), FaceState::Up | FaceState::Down)
    }

    pub fn counters(&self) -> FaceCounters {
        FaceCounters {
            link: self.link_service.counters.clone(),
            transport: self.transport.base().counters.clone(),
        }
    }

    pub fn link_service(&self) -> &GenericLinkService {
        &self.link_service
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    /* ------------------------------------------------------------ *\
     * Traffic
    \* ------------------------------------------------------------ */

    pub fn send_interest(&mut self, interest: &Interest) {
        self.link_service
            .send_interest(interest, self.transport.as_mut());
    }

    pub fn send_data(&mut self, data: &Data) {
        self.link_service.send_data(data, self.transport.as_mut());
    }

    pub fn send_nack(&mut self, nack: &Nack) {
        self.link_service.send_nack(nack, self.transport.as_mut());
    }

    /// Feeds one received block through the link service; returns the
    /// decoded network packet when one completes.
    pub fn receive_block(&mut self, block: Bytes, endpoint: EndpointId) -> Option<NetPacket> {
        self.transport.count_received(&block);
        self.link_service
            .receive_packet(block, endpoint, self.transport.as_mut())
    }

    pub fn close(&mut self) {
        let _ = self.transport.close();
    }

    /* ------------------------------------------------------------ *\
     * Timer entry points
    \* ------------------------------------------------------------ */

    pub fn handle_reassembly_timeout(&mut self, key: reassembler::ReassemblyKey) {
        self.link_service.handle_reassembly_timeout(key);
    }

    pub fn handle_frag_lost(&mut self, tx_seq: u64) {
        self.link_service
            .handle_frag_lost(tx_seq, self.transport.as_mut());
    }

    pub fn handle_idle_ack_timer(&mut self) {
        self.link_service
            .handle_idle_ack_timer(self.transport.as_mut());
    }
}
