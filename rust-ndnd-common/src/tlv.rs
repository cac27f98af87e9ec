//! TLV (Type-Length-Value) encoding and decoding utilities.
//!
//! This module provides functions for encoding and decoding NDN TLV packets
//! and the NDNLP link-layer envelope. All TLV types fit in one octet;
//! lengths use the NDN variable-length encoding.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Network-layer TLV packet types
pub const TLV_INTEREST: u8 = 0x05;
pub const TLV_DATA: u8 = 0x06;
pub const TLV_NAME: u8 = 0x07;
pub const TLV_COMPONENT: u8 = 0x08;
pub const TLV_DIGEST_COMPONENT: u8 = 0x01;
pub const TLV_NONCE: u8 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u8 = 0x0C;
pub const TLV_SELECTORS: u8 = 0x09;
pub const TLV_CAN_BE_PREFIX: u8 = 0x21;
pub const TLV_MUST_BE_FRESH: u8 = 0x12;
pub const TLV_HOP_LIMIT: u8 = 0x22;
pub const TLV_META_INFO: u8 = 0x14;
pub const TLV_CONTENT_TYPE: u8 = 0x18;
pub const TLV_FRESHNESS_PERIOD: u8 = 0x19;
pub const TLV_FINAL_BLOCK_ID: u8 = 0x1A;
pub const TLV_CONTENT: u8 = 0x15;
pub const TLV_SIGNATURE_INFO: u8 = 0x16;
pub const TLV_SIGNATURE_VALUE: u8 = 0x17;

/// Management TLV types
pub const TLV_CONTROL_RESPONSE: u8 = 0x65;
pub const TLV_STATUS_CODE: u8 = 0x66;
pub const TLV_STATUS_TEXT: u8 = 0x67;
pub const TLV_CONTROL_PARAMETERS: u8 = 0x68;
pub const TLV_FACE_ID: u8 = 0x69;
pub const TLV_COST: u8 = 0x6A;
pub const TLV_STRATEGY: u8 = 0x6B;
pub const TLV_FIB_ENTRY: u8 = 0x80;
pub const TLV_NEXT_HOP_RECORD: u8 = 0x81;
pub const TLV_STRATEGY_CHOICE_ENTRY: u8 = 0x82;
pub const TLV_FACE_STATUS: u8 = 0x83;
pub const TLV_LOCAL_URI: u8 = 0x84;
pub const TLV_REMOTE_URI: u8 = 0x85;
pub const TLV_CS_INFO: u8 = 0x86;
pub const TLV_CS_CAPACITY: u8 = 0x87;
pub const TLV_CS_ENTRY_COUNT: u8 = 0x88;
pub const TLV_CS_HITS: u8 = 0x89;
pub const TLV_CS_MISSES: u8 = 0x8A;

/// Link-layer (NDNLP) envelope TLV types
pub const TLV_LP_PACKET: u8 = 0x64;
pub const TLV_LP_FRAGMENT: u8 = 0x50;
pub const TLV_LP_SEQUENCE: u8 = 0x51;
pub const TLV_LP_FRAG_INDEX: u8 = 0x52;
pub const TLV_LP_FRAG_COUNT: u8 = 0x53;
pub const TLV_LP_NACK: u8 = 0x20;
pub const TLV_LP_NACK_REASON: u8 = 0x2A;
pub const TLV_LP_ACK: u8 = 0x2C;
pub const TLV_LP_TX_SEQUENCE: u8 = 0x2E;
pub const TLV_LP_NEXT_HOP_FACE_ID: u8 = 0x30;
pub const TLV_LP_INCOMING_FACE_ID: u8 = 0x31;
pub const TLV_LP_CACHE_POLICY: u8 = 0x34;
pub const TLV_LP_CACHE_POLICY_TYPE: u8 = 0x35;

/// Encodes a TLV type field.
///
/// Only single-byte TLV types (0-255) are supported.
pub fn encode_tlv_type(tlv_type: u8, buf: &mut BytesMut) {
    buf.put_u8(tlv_type);
}

/// Encodes a TLV length field.
///
/// Supports variable-length encoding:
/// - If length < 253, uses 1 byte
/// - If length <= 65535, uses 3 bytes (253 + 2 bytes)
/// - If length > 65535, uses 5 bytes (254 + 4 bytes)
pub fn encode_tlv_length(length: usize, buf: &mut BytesMut) {
    if length < 253 {
        buf.put_u8(length as u8);
    } else if length <= 65535 {
        buf.put_u8(253);
        buf.put_u16(length as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(length as u32);
    }
}

/// Decodes a TLV type field.
pub fn decode_tlv_type(buf: &mut impl Buf) -> Result<u8, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding TLV type".into()));
    }
    Ok(buf.get_u8())
}

/// Decodes a TLV length field.
///
/// Handles variable-length encoding as per NDN packet format.
pub fn decode_tlv_length(buf: &mut impl Buf) -> Result<usize, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding TLV length".into()));
    }

    let first_byte = buf.get_u8();

    match first_byte {
        // Small length (< 253)
        0..=252 => Ok(first_byte as usize),

        // Medium length (16 bits)
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv(
                    "Buffer underflow when decoding 16-bit TLV length".into(),
                ));
            }
            Ok(buf.get_u16() as usize)
        }

        // Large length (32 bits)
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv(
                    "Buffer underflow when decoding 32-bit TLV length".into(),
                ));
            }
            Ok(buf.get_u32() as usize)
        }

        // 64-bit lengths exceed the maximum packet size by far
        255 => Err(Error::Tlv("64-bit TLV lengths not supported".into())),
    }
}

/// Returns the number of bytes needed to encode the given length.
pub fn tlv_length_size(length: usize) -> usize {
    if length < 253 {
        1
    } else if length <= 65535 {
        3
    } else {
        5
    }
}

/// Encodes a nonnegative integer in the shortest of 1, 2, 4, or 8 bytes.
pub fn encode_nonneg_integer(value: u64, buf: &mut BytesMut) {
    if value <= 0xFF {
        buf.put_u8(value as u8);
    } else if value <= 0xFFFF {
        buf.put_u16(value as u16);
    } else if value <= 0xFFFF_FFFF {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
}

/// Returns the encoded size of a nonnegative integer.
pub fn nonneg_integer_size(value: u64) -> usize {
    if value <= 0xFF {
        1
    } else if value <= 0xFFFF {
        2
    } else if value <= 0xFFFF_FFFF {
        4
    } else {
        8
    }
}

/// Decodes a nonnegative integer of 1, 2, 4, or 8 bytes.
pub fn decode_nonneg_integer(value: &[u8]) -> Result<u64, Error> {
    match value.len() {
        1 => Ok(value[0] as u64),
        2 => Ok(u16::from_be_bytes([value[0], value[1]]) as u64),
        4 => Ok(u32::from_be_bytes([value[0], value[1], value[2], value[3]]) as u64),
        8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(value);
            Ok(u64::from_be_bytes(bytes))
        }
        n => Err(Error::Tlv(format!(
            "Invalid nonnegative integer length {}",
            n
        ))),
    }
}

/// A generic TLV element consisting of a type, length, and value.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    /// Creates a new TLV element.
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Creates a TLV element holding a nonnegative integer.
    pub fn from_nonneg_integer(tlv_type: u8, value: u64) -> Self {
        let mut buf = BytesMut::with_capacity(8);
        encode_nonneg_integer(value, &mut buf);
        Self::new(tlv_type, buf.freeze())
    }

    /// Interprets the value as a nonnegative integer.
    pub fn as_nonneg_integer(&self) -> Result<u64, Error> {
        decode_nonneg_integer(&self.value)
    }

    /// Returns the total length of this TLV element when encoded.
    pub fn len(&self) -> usize {
        let value_len = self.value.len();
        // Type (1 byte) + Length (variable) + Value
        1 + tlv_length_size(value_len) + value_len
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Encodes this TLV element into the provided buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_tlv_type(self.tlv_type, buf);
        encode_tlv_length(self.value.len(), buf);
        buf.extend_from_slice(&self.value);
    }

    /// Decodes a TLV element from the provided buffer.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(Error::Tlv("Buffer too small for TLV".into()));
        }

        let tlv_type = decode_tlv_type(buf)?;
        let length = decode_tlv_length(buf)?;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "Buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        Ok(Self {
            tlv_type,
            value: buf.copy_to_bytes(length),
        })
    }

    /// Decodes the inner elements of a container TLV.
    pub fn decode_nested(&self) -> Result<Vec<TlvElement>, Error> {
        let mut elements = Vec::new();
        let mut buf = self.value.clone();
        while buf.has_remaining() {
            elements.push(TlvElement::decode(&mut buf)?);
        }
        Ok(elements)
    }
}
