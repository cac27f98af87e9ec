//! `cs` management module: info, erase.

use bytes::BytesMut;
use rust_ndnd_common::tlv::{self, TlvElement};

use super::control::{ControlParameters, ControlResponse};
use crate::fw::Forwarder;

/// A single CsInfo record: capacity, entry count, hit and miss counters.
pub fn info(forwarder: &Forwarder) -> Vec<u8> {
    let mut inner = BytesMut::new();
    TlvElement::from_nonneg_integer(tlv::TLV_CS_CAPACITY, forwarder.cs().capacity() as u64)
        .encode(&mut inner);
    TlvElement::from_nonneg_integer(tlv::TLV_CS_ENTRY_COUNT, forwarder.cs().size() as u64)
        .encode(&mut inner);
    TlvElement::from_nonneg_integer(tlv::TLV_CS_HITS, forwarder.counters.n_cs_hits.value())
        .encode(&mut inner);
    TlvElement::from_nonneg_integer(tlv::TLV_CS_MISSES, forwarder.counters.n_cs_misses.value())
        .encode(&mut inner);

    let mut records = BytesMut::new();
    TlvElement::new(tlv::TLV_CS_INFO, inner.freeze()).encode(&mut records);
    records.to_vec()
}

pub fn erase(forwarder: &mut Forwarder, parameters: &ControlParameters) -> ControlResponse {
    let Some(name) = &parameters.name else {
        return ControlResponse::new(400, "missing name");
    };
    let n_erased = forwarder.cs().erase_under(name);
    ControlResponse::new(200, format!("erased {} entries", n_erased))
}
