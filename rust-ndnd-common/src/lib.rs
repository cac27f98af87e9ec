//! Common wire types and utilities for the ndnd forwarding daemon.
//!
//! This crate holds everything shared between the daemon core and tooling:
//! the TLV codec, hierarchical names, the three network packet kinds, the
//! NDNLP link-layer envelope, error types, and counter primitives.

pub mod error;
pub mod lp;
pub mod metrics;
pub mod name;
pub mod packet;
pub mod tlv;

pub use error::Error;
pub use lp::LpPacket;
pub use name::{Name, NameComponent};
pub use packet::{
    CachePolicy, Data, Interest, Nack, NackReason, NetPacket, PacketTags, Selectors,
    MAX_NDN_PACKET_SIZE,
};
