//! `fib` management module: add-nexthop, remove-nexthop, list.

use bytes::BytesMut;
use rust_ndnd_common::tlv::{self, TlvElement};
use rust_ndnd_common::Interest;

use super::control::{ControlParameters, ControlResponse};
use super::resolve_target_face;
use crate::fw::Forwarder;

pub fn add_next_hop(
    forwarder: &mut Forwarder,
    interest: &Interest,
    parameters: &ControlParameters,
) -> ControlResponse {
    let Some(name) = &parameters.name else {
        return ControlResponse::new(400, "missing name");
    };
    let Some(face_id) = resolve_target_face(interest, parameters) else {
        return ControlResponse::new(400, "missing face id");
    };
    if forwarder.faces().get(face_id).is_none() {
        return ControlResponse::new(404, "face not found");
    }
    let cost = parameters.cost.unwrap_or(0);
    forwarder.add_next_hop(name, face_id, cost);

    let echo = ControlParameters {
        name: Some(name.clone()),
        face_id: Some(face_id),
        cost: Some(cost),
        strategy: None,
    };
    ControlResponse::ok().with_body(echo.encode())
}

pub fn remove_next_hop(
    forwarder: &mut Forwarder,
    interest: &Interest,
    parameters: &ControlParameters,
) -> ControlResponse {
    let Some(name) = &parameters.name else {
        return ControlResponse::new(400, "missing name");
    };
    let Some(face_id) = resolve_target_face(interest, parameters) else {
        return ControlResponse::new(400, "missing face id");
    };
    forwarder.fib().remove_next_hop(name, face_id);

    let echo = ControlParameters {
        name: Some(name.clone()),
        face_id: Some(face_id),
        cost: None,
        strategy: None,
    };
    ControlResponse::ok().with_body(echo.encode())
}

/// One FibEntry record per entry: prefix plus its cost-ordered nexthops.
pub fn list(forwarder: &Forwarder) -> Vec<u8> {
    let mut records = BytesMut::new();
    for entry in forwarder.fib().entries() {
        let entry = entry.borrow();
        let mut inner = BytesMut::new();
        entry.name().to_tlv().encode(&mut inner);
        for next_hop in entry.next_hops() {
            let mut record = BytesMut::new();
            TlvElement::from_nonneg_integer(tlv::TLV_FACE_ID, next_hop.face).encode(&mut record);
            TlvElement::from_nonneg_integer(tlv::TLV_COST, next_hop.cost).encode(&mut record);
            TlvElement::new(tlv::TLV_NEXT_HOP_RECORD, record.freeze()).encode(&mut inner);
        }
        TlvElement::new(tlv::TLV_FIB_ENTRY, inner.freeze()).encode(&mut records);
    }
    records.to_vec()
}
