//! `strategy-choice` management module: set, unset, list.

use bytes::BytesMut;
use rust_ndnd_common::tlv::{self, TlvElement};

use super::control::{ControlParameters, ControlResponse};
use crate::fw::Forwarder;

pub fn set(forwarder: &mut Forwarder, parameters: &ControlParameters) -> ControlResponse {
    let Some(name) = &parameters.name else {
        return ControlResponse::new(400, "missing name");
    };
    let Some(strategy) = &parameters.strategy else {
        return ControlResponse::new(400, "missing strategy");
    };
    if forwarder.strategy_choice().insert(name, strategy).is_err() {
        return ControlResponse::new(504, "unsupported strategy");
    }

    let chosen = forwarder
        .strategy_choice()
        .get(name)
        .expect("just inserted");
    let echo = ControlParameters {
        name: Some(name.clone()),
        face_id: None,
        cost: None,
        strategy: Some(chosen),
    };
    ControlResponse::ok().with_body(echo.encode())
}

pub fn unset(forwarder: &mut Forwarder, parameters: &ControlParameters) -> ControlResponse {
    let Some(name) = &parameters.name else {
        return ControlResponse::new(400, "missing name");
    };
    if name.is_empty() {
        // the root choice is mandatory
        return ControlResponse::new(403, "cannot unset root strategy");
    }
    if forwarder.strategy_choice().erase(name).is_err() {
        return ControlResponse::new(403, "cannot unset root strategy");
    }
    let echo = ControlParameters {
        name: Some(name.clone()),
        face_id: None,
        cost: None,
        strategy: None,
    };
    ControlResponse::ok().with_body(echo.encode())
}

/// One StrategyChoiceEntry record per choice: prefix plus strategy name.
pub fn list(forwarder: &Forwarder) -> Vec<u8> {
    let mut records = BytesMut::new();
    for (prefix, strategy) in forwarder.strategy_choice().entries() {
        let mut inner = BytesMut::new();
        prefix.to_tlv().encode(&mut inner);
        let mut wrapped = BytesMut::new();
        strategy.to_tlv().encode(&mut wrapped);
        TlvElement::new(tlv::TLV_STRATEGY, wrapped.freeze()).encode(&mut inner);
        TlvElement::new(tlv::TLV_STRATEGY_CHOICE_ENTRY, inner.freeze()).encode(&mut records);
    }
    records.to_vec()
}
