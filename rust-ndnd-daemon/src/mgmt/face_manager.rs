//! `faces` management module: list.

use bytes::{Bytes, BytesMut};
use rust_ndnd_common::tlv::{self, TlvElement};

use crate::fw::Forwarder;

/// One FaceStatus record per face: id plus both URIs.
pub fn list(forwarder: &Forwarder) -> Vec<u8> {
    let mut records = BytesMut::new();
    for (id, face) in forwarder.faces().iter() {
        let face = face.borrow();
        let mut inner = BytesMut::new();
        TlvElement::from_nonneg_integer(tlv::TLV_FACE_ID, id).encode(&mut inner);
        TlvElement::new(
            tlv::TLV_LOCAL_URI,
            Bytes::from(face.local_uri().into_bytes()),
        )
        .encode(&mut inner);
        TlvElement::new(
            tlv::TLV_REMOTE_URI,
            Bytes::from(face.remote_uri().into_bytes()),
        )
        .encode(&mut inner);
        TlvElement::new(tlv::TLV_FACE_STATUS, inner.freeze()).encode(&mut records);
    }
    records.to_vec()
}
