//! Network-layer packet types: Interest, Data, and Nack.
//!
//! These are the three packet kinds exchanged by the forwarding pipeline.
//! A Nack is a wrapper around the nacked Interest plus a reason carried in
//! the link-layer envelope.

use crate::error::Error;
use crate::name::{Name, NameComponent};
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Maximum size of an NDN packet.
pub const MAX_NDN_PACKET_SIZE: usize = 8800;

/// Default InterestLifetime when the field is absent.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_millis(4000);

/// ContentType of a Data whose content announces a routable prefix.
pub const CONTENT_TYPE_PREFIX_ANNOUNCEMENT: u64 = 5;

/* ---------------------------------------------------------------- *\
 * Tags
\* ---------------------------------------------------------------- */

/// Data caching directive carried in the link-layer envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    NoCache,
}

impl CachePolicy {
    pub fn to_code(self) -> u64 {
        match self {
            CachePolicy::NoCache => 1,
        }
    }

    pub fn from_code(code: u64) -> Result<Self, Error> {
        match code {
            1 => Ok(CachePolicy::NoCache),
            other => Err(Error::LinkProtocol(format!(
                "Unknown cache policy type {}",
                other
            ))),
        }
    }
}

/// Side-channel fields attached to a packet while it traverses the daemon.
/// They are carried on the wire only inside the link-layer envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketTags {
    pub incoming_face_id: Option<u64>,
    pub next_hop_face_id: Option<u64>,
    pub cache_policy: Option<CachePolicy>,
}

/* ---------------------------------------------------------------- *\
 * Interest
\* ---------------------------------------------------------------- */

/// Selector fields that participate in PIT entry identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selectors {
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interest {
    pub name: Name,
    pub nonce: u32,
    pub lifetime: Duration,
    pub hop_limit: Option<u8>,
    pub selectors: Selectors,
    pub tags: PacketTags,
}

impl Interest {
    /// A new Interest matches any Data under its name; restrict with
    /// `with_can_be_prefix(false)` to request one exact packet.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            nonce: rand::thread_rng().gen(),
            lifetime: DEFAULT_INTEREST_LIFETIME,
            hop_limit: None,
            selectors: Selectors {
                can_be_prefix: true,
                must_be_fresh: false,
            },
            tags: PacketTags::default(),
        }
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.selectors.can_be_prefix = can_be_prefix;
        self
    }
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.selectors.must_be_fresh = must_be_fresh;
        self
    }

    /// Whether `data` satisfies this Interest, freshness aside. An Interest
    /// naming the Data's implicit digest is matched by the caller against
    /// the full name, which this function does not know.
    pub fn matches_data_name(&self, data_name: &Name) -> bool {
        if self.selectors.can_be_prefix {
            self.name.is_prefix_of(data_name)
        } else {
            self.name == *data_name
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);

        if self.selectors.can_be_prefix {
            TlvElement::new(tlv::TLV_CAN_BE_PREFIX, Bytes::new()).encode(&mut inner);
        }
        if self.selectors.must_be_fresh {
            TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()).encode(&mut inner);
        }

        let mut nonce = BytesMut::with_capacity(4);
        nonce.extend_from_slice(&self.nonce.to_be_bytes());
        TlvElement::new(tlv::TLV_NONCE, nonce.freeze()).encode(&mut inner);

        TlvElement::from_nonneg_integer(tlv::TLV_INTEREST_LIFETIME, self.lifetime.as_millis() as u64)
            .encode(&mut inner);

        if let Some(hop_limit) = self.hop_limit {
            TlvElement::new(tlv::TLV_HOP_LIMIT, vec![hop_limit]).encode(&mut inner);
        }

        TlvElement::new(tlv::TLV_INTEREST, inner.freeze()).encode(buf);
    }

    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::Packet(format!(
                "Expected Interest TLV type, got {}",
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut nonce = None;
        let mut lifetime = DEFAULT_INTEREST_LIFETIME;
        let mut hop_limit = None;
        let mut selectors = Selectors::default();

        for element in outer.decode_nested()? {
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_CAN_BE_PREFIX => selectors.can_be_prefix = true,
                tlv::TLV_MUST_BE_FRESH => selectors.must_be_fresh = true,
                tlv::TLV_NONCE => {
                    if element.value.len() != 4 {
                        return Err(Error::Packet("Nonce must be 4 octets".into()));
                    }
                    let mut bytes = [0u8; 4];
                    bytes.copy_from_slice(&element.value);
                    nonce = Some(u32::from_be_bytes(bytes));
                }
                tlv::TLV_INTEREST_LIFETIME => {
                    lifetime = Duration::from_millis(element.as_nonneg_integer()?);
                }
                tlv::TLV_HOP_LIMIT => {
                    if element.value.len() == 1 {
                        hop_limit = Some(element.value[0]);
                    }
                }
                _ => {} // unrecognized non-critical fields are skipped
            }
        }

        let name = name.ok_or_else(|| Error::Packet("Interest without Name".into()))?;
        if name.is_empty() {
            return Err(Error::Packet("Interest Name must be non-empty".into()));
        }
        Ok(Self {
            name,
            nonce: nonce.ok_or_else(|| Error::Packet("Interest without Nonce".into()))?,
            lifetime,
            hop_limit,
            selectors,
            tags: PacketTags::default(),
        })
    }
}

/* ---------------------------------------------------------------- *\
 * Data
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub name: Name,
    pub content: Bytes,
    pub content_type: u64,
    pub freshness_period: Duration,
    pub final_block_id: Option<NameComponent>,
    /// Opaque signature bytes; validation is a consumer-provided capability.
    pub signature: Bytes,
    pub tags: PacketTags,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content: content.into(),
            content_type: 0,
            freshness_period: Duration::ZERO,
            final_block_id: None,
            signature: Bytes::new(),
            tags: PacketTags::default(),
        }
    }

    pub fn with_freshness_period(mut self, freshness_period: Duration) -> Self {
        self.freshness_period = freshness_period;
        self
    }
    pub fn with_final_block_id(mut self, component: NameComponent) -> Self {
        self.final_block_id = Some(component);
        self
    }

    /// SHA-256 over the wire encoding; forms the implicit last name component.
    pub fn implicit_digest(&self) -> NameComponent {
        let digest = Sha256::digest(self.to_wire());
        NameComponent::new(digest.to_vec())
    }

    /// The Data name with the implicit digest component appended.
    pub fn full_name(&self) -> Name {
        self.name.appended(self.implicit_digest())
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);

        let mut meta = BytesMut::new();
        if self.content_type != 0 {
            TlvElement::from_nonneg_integer(tlv::TLV_CONTENT_TYPE, self.content_type)
                .encode(&mut meta);
        }
        if !self.freshness_period.is_zero() {
            TlvElement::from_nonneg_integer(
                tlv::TLV_FRESHNESS_PERIOD,
                self.freshness_period.as_millis() as u64,
            )
            .encode(&mut meta);
        }
        if let Some(final_block_id) = &self.final_block_id {
            let mut fbi = BytesMut::new();
            final_block_id.to_tlv().encode(&mut fbi);
            TlvElement::new(tlv::TLV_FINAL_BLOCK_ID, fbi.freeze()).encode(&mut meta);
        }
        if !meta.is_empty() {
            TlvElement::new(tlv::TLV_META_INFO, meta.freeze()).encode(&mut inner);
        }

        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut inner);
        TlvElement::new(tlv::TLV_SIGNATURE_VALUE, self.signature.clone()).encode(&mut inner);

        TlvElement::new(tlv::TLV_DATA, inner.freeze()).encode(buf);
    }

    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_DATA {
            return Err(Error::Packet(format!(
                "Expected Data TLV type, got {}",
                outer.tlv_type
            )));
        }

        let mut name = None;
        let mut content = Bytes::new();
        let mut content_type = 0;
        let mut freshness_period = Duration::ZERO;
        let mut final_block_id = None;
        let mut signature = Bytes::new();

        for element in outer.decode_nested()? {
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_META_INFO => {
                    for meta in element.decode_nested()? {
                        match meta.tlv_type {
                            tlv::TLV_CONTENT_TYPE => {
                                content_type = meta.as_nonneg_integer()?;
                            }
                            tlv::TLV_FRESHNESS_PERIOD => {
                                freshness_period =
                                    Duration::from_millis(meta.as_nonneg_integer()?);
                            }
                            tlv::TLV_FINAL_BLOCK_ID => {
                                let mut inner = meta.value.clone();
                                if inner.has_remaining() {
                                    let comp = TlvElement::decode(&mut inner)?;
                                    final_block_id = Some(NameComponent::from_tlv(&comp)?);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                tlv::TLV_CONTENT => content = element.value.clone(),
                tlv::TLV_SIGNATURE_VALUE => signature = element.value.clone(),
                tlv::TLV_SIGNATURE_INFO => {} // opaque to the forwarder
                _ => {}
            }
        }

        Ok(Self {
            name: name.ok_or_else(|| Error::Packet("Data without Name".into()))?,
            content,
            content_type,
            freshness_period,
            final_block_id,
            signature,
            tags: PacketTags::default(),
        })
    }
}

/* ---------------------------------------------------------------- *\
 * Nack
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    None,
    Congestion,
    Duplicate,
    NoRoute,
    NoSupport,
}

impl NackReason {
    pub fn to_code(self) -> u64 {
        match self {
            NackReason::None => 0,
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
            NackReason::NoSupport => 200,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            50 => NackReason::Congestion,
            100 => NackReason::Duplicate,
            150 => NackReason::NoRoute,
            200 => NackReason::NoSupport,
            _ => NackReason::None,
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NackReason::None => "None",
            NackReason::Congestion => "Congestion",
            NackReason::Duplicate => "Duplicate",
            NackReason::NoRoute => "NoRoute",
            NackReason::NoSupport => "NoSupport",
        };
        write!(f, "{}", s)
    }
}

/// Negative acknowledgement: the nacked Interest plus a reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Nack {
    pub reason: NackReason,
    pub interest: Interest,
    pub tags: PacketTags,
}

impl Nack {
    pub fn new(reason: NackReason, interest: Interest) -> Self {
        Self {
            reason,
            interest,
            tags: PacketTags::default(),
        }
    }

    pub fn name(&self) -> &Name {
        &self.interest.name
    }
}

/// Any network-layer packet flowing through a face.
#[derive(Debug, Clone)]
pub enum NetPacket {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
}

impl NetPacket {
    pub fn name(&self) -> &Name {
        match self {
            NetPacket::Interest(interest) => &interest.name,
            NetPacket::Data(data) => &data.name,
            NetPacket::Nack(nack) => nack.name(),
        }
    }

    pub fn packet_type(&self) -> &'static str {
        match self {
            NetPacket::Interest(_) => "Interest",
            NetPacket::Data(_) => "Data",
            NetPacket::Nack(_) => "Nack",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_round_trip() {
        let interest = Interest::new(Name::from_string("/test/interest"))
            .with_nonce(42)
            .with_lifetime(Duration::from_secs(4))
            .with_can_be_prefix(true)
            .with_must_be_fresh(true);

        let wire = interest.to_wire();
        let parsed = Interest::decode(&wire).unwrap();
        assert_eq!(parsed.name, interest.name);
        assert_eq!(parsed.nonce, 42);
        assert_eq!(parsed.lifetime, Duration::from_secs(4));
        assert!(parsed.selectors.can_be_prefix);
        assert!(parsed.selectors.must_be_fresh);
    }

    #[test]
    fn data_round_trip() {
        let data = Data::new(Name::from_string("/test/data"), &b"Hello, NDN!"[..])
            .with_freshness_period(Duration::from_secs(10));

        let wire = data.to_wire();
        let parsed = Data::decode(&wire).unwrap();
        assert_eq!(parsed.name, data.name);
        assert_eq!(parsed.content, data.content);
        assert_eq!(parsed.freshness_period, Duration::from_secs(10));
    }

    #[test]
    fn data_matching() {
        let exact = Interest::new(Name::from_string("/A/B"))
            .with_nonce(1)
            .with_can_be_prefix(false);
        assert!(exact.matches_data_name(&Name::from_string("/A/B")));
        assert!(!exact.matches_data_name(&Name::from_string("/A/B/C")));

        // the default requests anything under the name
        let prefix = Interest::new(Name::from_string("/A")).with_nonce(2);
        assert!(prefix.matches_data_name(&Name::from_string("/A")));
        assert!(prefix.matches_data_name(&Name::from_string("/A/B/C")));
        assert!(!prefix.matches_data_name(&Name::from_string("/B")));
    }

    #[test]
    fn full_name_carries_digest() {
        let data = Data::new(Name::from_string("/A"), &b"payload"[..]);
        let full = data.full_name();
        assert_eq!(full.len(), data.name.len() + 1);
        assert_eq!(full.last().unwrap().as_bytes().len(), 32);
        assert!(data.name.is_prefix_of(&full));
    }

    #[test]
    fn malformed_interest_rejected() {
        assert!(Interest::decode(b"").is_err());
        assert!(Interest::decode(&[0x05, 0x00]).is_err()); // no Name
        let data_wire = Data::new(Name::from_string("/x"), Bytes::new()).to_wire();
        assert!(Interest::decode(&data_wire).is_err());
    }
}
