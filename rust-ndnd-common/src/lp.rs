//! NDNLP link-layer envelope.
//!
//! A link packet ("LP") wraps a whole network packet or a fragment of one,
//! and carries the side-channel fields used by fragmentation, reliability,
//! and local-field tagging. An LP packet without a Fragment field is an
//! IDLE packet: it exists only to carry acknowledgements.

use crate::error::Error;
use crate::packet::{CachePolicy, NackReason};
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LpPacket {
    pub fragment: Option<Bytes>,
    pub sequence: Option<u64>,
    pub frag_index: Option<u64>,
    pub frag_count: Option<u64>,
    pub tx_sequence: Option<u64>,
    pub acks: Vec<u64>,
    pub nack: Option<NackReason>,
    pub incoming_face_id: Option<u64>,
    pub next_hop_face_id: Option<u64>,
    pub cache_policy: Option<CachePolicy>,
}

impl LpPacket {
    /// Wraps an encoded network packet without any headers.
    pub fn from_fragment(fragment: Bytes) -> Self {
        Self {
            fragment: Some(fragment),
            ..Self::default()
        }
    }

    /// An LP packet with no fragment carries acks only.
    pub fn is_idle(&self) -> bool {
        self.fragment.is_none()
    }

    pub fn is_fragmented(&self) -> bool {
        self.frag_index.is_some() || self.frag_count.is_some()
    }

    /// Returns a copy with the fragmentation fields and payload removed,
    /// keeping every other header. Used to build per-fragment envelopes.
    pub fn headers_only(&self) -> Self {
        Self {
            fragment: None,
            frag_index: None,
            frag_count: None,
            ..self.clone()
        }
    }

    /// Exact size of the encoded header fields, excluding the Fragment TLV
    /// and the outer LpPacket TLV.
    pub fn headers_len(&self) -> usize {
        let mut len = 0;
        if let Some(reason) = self.nack {
            len += self.nack_header_len(reason);
        }
        if let Some(id) = self.incoming_face_id {
            len += 1 + 1 + tlv::nonneg_integer_size(id);
        }
        if let Some(id) = self.next_hop_face_id {
            len += 1 + 1 + tlv::nonneg_integer_size(id);
        }
        if let Some(policy) = self.cache_policy {
            let inner = 1 + 1 + tlv::nonneg_integer_size(policy.to_code());
            len += 1 + 1 + inner;
        }
        for &ack in &self.acks {
            len += 1 + 1 + tlv::nonneg_integer_size(ack);
        }
        if let Some(seq) = self.tx_sequence {
            len += 1 + 1 + tlv::nonneg_integer_size(seq);
        }
        if let Some(seq) = self.sequence {
            len += 1 + 1 + tlv::nonneg_integer_size(seq);
        }
        if let Some(index) = self.frag_index {
            len += 1 + 1 + tlv::nonneg_integer_size(index);
        }
        if let Some(count) = self.frag_count {
            len += 1 + 1 + tlv::nonneg_integer_size(count);
        }
        len
    }

    fn nack_header_len(&self, reason: NackReason) -> usize {
        let inner = if reason == NackReason::None {
            0
        } else {
            1 + 1 + tlv::nonneg_integer_size(reason.to_code())
        };
        1 + tlv::tlv_length_size(inner) + inner
    }

    /// Exact size of the full encoding, envelope included.
    pub fn encoded_len(&self) -> usize {
        let mut inner = self.headers_len();
        if let Some(fragment) = &self.fragment {
            inner += 1 + tlv::tlv_length_size(fragment.len()) + fragment.len();
        }
        1 + tlv::tlv_length_size(inner) + inner
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let mut inner = BytesMut::new();

        if let Some(reason) = self.nack {
            let mut nack = BytesMut::new();
            if reason != NackReason::None {
                TlvElement::from_nonneg_integer(tlv::TLV_LP_NACK_REASON, reason.to_code())
                    .encode(&mut nack);
            }
            TlvElement::new(tlv::TLV_LP_NACK, nack.freeze()).encode(&mut inner);
        }
        if let Some(id) = self.incoming_face_id {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_INCOMING_FACE_ID, id).encode(&mut inner);
        }
        if let Some(id) = self.next_hop_face_id {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_NEXT_HOP_FACE_ID, id).encode(&mut inner);
        }
        if let Some(policy) = self.cache_policy {
            let mut cp = BytesMut::new();
            TlvElement::from_nonneg_integer(tlv::TLV_LP_CACHE_POLICY_TYPE, policy.to_code())
                .encode(&mut cp);
            TlvElement::new(tlv::TLV_LP_CACHE_POLICY, cp.freeze()).encode(&mut inner);
        }
        for &ack in &self.acks {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_ACK, ack).encode(&mut inner);
        }
        if let Some(seq) = self.tx_sequence {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_TX_SEQUENCE, seq).encode(&mut inner);
        }
        if let Some(seq) = self.sequence {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_SEQUENCE, seq).encode(&mut inner);
        }
        if let Some(index) = self.frag_index {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_FRAG_INDEX, index).encode(&mut inner);
        }
        if let Some(count) = self.frag_count {
            TlvElement::from_nonneg_integer(tlv::TLV_LP_FRAG_COUNT, count).encode(&mut inner);
        }
        if let Some(fragment) = &self.fragment {
            TlvElement::new(tlv::TLV_LP_FRAGMENT, fragment.clone()).encode(&mut inner);
        }

        TlvElement::new(tlv::TLV_LP_PACKET, inner.freeze()).encode(buf);
    }

    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;

        // a bare network packet is a valid link packet with no headers
        if outer.tlv_type == tlv::TLV_INTEREST || outer.tlv_type == tlv::TLV_DATA {
            return Ok(Self::from_fragment(Bytes::copy_from_slice(wire)));
        }
        if outer.tlv_type != tlv::TLV_LP_PACKET {
            return Err(Error::LinkProtocol(format!(
                "Unrecognized link packet TLV type {}",
                outer.tlv_type
            )));
        }

        let mut packet = Self::default();
        for element in outer.decode_nested()? {
            match element.tlv_type {
                tlv::TLV_LP_FRAGMENT => packet.fragment = Some(element.value.clone()),
                tlv::TLV_LP_SEQUENCE => packet.sequence = Some(element.as_nonneg_integer()?),
                tlv::TLV_LP_FRAG_INDEX => packet.frag_index = Some(element.as_nonneg_integer()?),
                tlv::TLV_LP_FRAG_COUNT => packet.frag_count = Some(element.as_nonneg_integer()?),
                tlv::TLV_LP_TX_SEQUENCE => {
                    packet.tx_sequence = Some(element.as_nonneg_integer()?)
                }
                tlv::TLV_LP_ACK => packet.acks.push(element.as_nonneg_integer()?),
                tlv::TLV_LP_NACK => {
                    let mut reason = NackReason::None;
                    for nested in element.decode_nested()? {
                        if nested.tlv_type == tlv::TLV_LP_NACK_REASON {
                            reason = NackReason::from_code(nested.as_nonneg_integer()?);
                        }
                    }
                    packet.nack = Some(reason);
                }
                tlv::TLV_LP_INCOMING_FACE_ID => {
                    packet.incoming_face_id = Some(element.as_nonneg_integer()?)
                }
                tlv::TLV_LP_NEXT_HOP_FACE_ID => {
                    packet.next_hop_face_id = Some(element.as_nonneg_integer()?)
                }
                tlv::TLV_LP_CACHE_POLICY => {
                    for nested in element.decode_nested()? {
                        if nested.tlv_type == tlv::TLV_LP_CACHE_POLICY_TYPE {
                            packet.cache_policy =
                                Some(CachePolicy::from_code(nested.as_nonneg_integer()?)?);
                        }
                    }
                }
                _ => {} // unrecognized fields are ignorable
            }
        }

        if buf.has_remaining() {
            return Err(Error::LinkProtocol(
                "Trailing bytes after link packet".into(),
            ));
        }
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_fields() {
        let packet = LpPacket {
            fragment: Some(Bytes::from_static(b"payload")),
            sequence: Some(1000),
            frag_index: Some(1),
            frag_count: Some(3),
            tx_sequence: Some(2001),
            acks: vec![7, 8, u64::MAX],
            nack: Some(NackReason::Duplicate),
            incoming_face_id: Some(256),
            next_hop_face_id: Some(300),
            cache_policy: Some(CachePolicy::NoCache),
        };

        let wire = packet.to_wire();
        assert_eq!(wire.len(), packet.encoded_len());
        let decoded = LpPacket::decode(&wire).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn idle_packet() {
        let packet = LpPacket {
            acks: vec![1, 2, 3],
            ..LpPacket::default()
        };
        assert!(packet.is_idle());
        let decoded = LpPacket::decode(&packet.to_wire()).unwrap();
        assert!(decoded.is_idle());
        assert_eq!(decoded.acks, vec![1, 2, 3]);
    }

    #[test]
    fn bare_network_packet_accepted() {
        let wire = crate::packet::Interest::new(crate::name::Name::from_string("/A"))
            .with_nonce(9)
            .to_wire();
        let decoded = LpPacket::decode(&wire).unwrap();
        assert_eq!(decoded.fragment.as_deref(), Some(&wire[..]));
        assert!(decoded.sequence.is_none());
    }

    #[test]
    fn encoded_len_matches_wire() {
        let mut packet = LpPacket::from_fragment(Bytes::from(vec![0u8; 300]));
        packet.sequence = Some(u64::MAX);
        assert_eq!(packet.to_wire().len(), packet.encoded_len());
    }
}
