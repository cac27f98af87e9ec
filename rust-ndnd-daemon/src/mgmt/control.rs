//! Control command parameter and response encodings.

use bytes::{Bytes, BytesMut};
use rust_ndnd_common::name::NameComponent;
use rust_ndnd_common::tlv::{self, TlvElement};
use rust_ndnd_common::{Error, Name};

/// Marker octet prefixing a segment-number component.
const SEGMENT_MARKER: u8 = 0x00;

/// Builds the name component for dataset segment `number`.
pub fn make_segment_component(number: u64) -> NameComponent {
    let mut buf = BytesMut::with_capacity(9);
    buf.extend_from_slice(&[SEGMENT_MARKER]);
    tlv::encode_nonneg_integer(number, &mut buf);
    NameComponent::new(buf.freeze())
}

/// Parses a segment-number component.
pub fn parse_segment_component(component: &NameComponent) -> Option<u64> {
    let bytes = component.as_bytes();
    if bytes.len() < 2 || bytes[0] != SEGMENT_MARKER {
        return None;
    }
    tlv::decode_nonneg_integer(&bytes[1..]).ok()
}

/// Parameters of a control command, carried as a TLV inside one name
/// component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlParameters {
    pub name: Option<Name>,
    pub face_id: Option<u64>,
    pub cost: Option<u64>,
    pub strategy: Option<Name>,
}

impl ControlParameters {
    pub fn encode(&self) -> Bytes {
        let mut inner = BytesMut::new();
        if let Some(name) = &self.name {
            name.to_tlv().encode(&mut inner);
        }
        if let Some(face_id) = self.face_id {
            TlvElement::from_nonneg_integer(tlv::TLV_FACE_ID, face_id).encode(&mut inner);
        }
        if let Some(cost) = self.cost {
            TlvElement::from_nonneg_integer(tlv::TLV_COST, cost).encode(&mut inner);
        }
        if let Some(strategy) = &self.strategy {
            let mut wrapped = BytesMut::new();
            strategy.to_tlv().encode(&mut wrapped);
            TlvElement::new(tlv::TLV_STRATEGY, wrapped.freeze()).encode(&mut inner);
        }
        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_CONTROL_PARAMETERS, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_CONTROL_PARAMETERS {
            return Err(Error::Management(format!(
                "Expected ControlParameters TLV, got {}",
                outer.tlv_type
            )));
        }
        let mut parameters = Self::default();
        for element in outer.decode_nested()? {
            match element.tlv_type {
                tlv::TLV_NAME => parameters.name = Some(Name::from_tlv(&element)?),
                tlv::TLV_FACE_ID => parameters.face_id = Some(element.as_nonneg_integer()?),
                tlv::TLV_COST => parameters.cost = Some(element.as_nonneg_integer()?),
                tlv::TLV_STRATEGY => {
                    let mut inner = element.value.clone();
                    let name = TlvElement::decode(&mut inner)?;
                    parameters.strategy = Some(Name::from_tlv(&name)?);
                }
                _ => {}
            }
        }
        Ok(parameters)
    }
}

/// Status reply to a control command.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlResponse {
    pub code: u64,
    pub text: String,
    pub body: Bytes,
}

impl ControlResponse {
    pub fn new(code: u64, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut inner = BytesMut::new();
        TlvElement::from_nonneg_integer(tlv::TLV_STATUS_CODE, self.code).encode(&mut inner);
        TlvElement::new(tlv::TLV_STATUS_TEXT, Bytes::from(self.text.clone().into_bytes()))
            .encode(&mut inner);
        inner.extend_from_slice(&self.body);
        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_CONTROL_RESPONSE, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_CONTROL_RESPONSE {
            return Err(Error::Management(format!(
                "Expected ControlResponse TLV, got {}",
                outer.tlv_type
            )));
        }
        let mut code = None;
        let mut text = String::new();
        let mut body = BytesMut::new();
        for element in outer.decode_nested()? {
            match element.tlv_type {
                tlv::TLV_STATUS_CODE => code = Some(element.as_nonneg_integer()?),
                tlv::TLV_STATUS_TEXT => {
                    text = String::from_utf8_lossy(&element.value).into_owned()
                }
                _ => element.encode(&mut body),
            }
        }
        Ok(Self {
            code: code.ok_or_else(|| Error::Management("ControlResponse without code".into()))?,
            text,
            body: body.freeze(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_round_trip() {
        let parameters = ControlParameters {
            name: Some(Name::from_string("/A")),
            face_id: Some(300),
            cost: Some(10),
            strategy: Some(Name::from_string("/localhost/nfd/strategy/multicast")),
        };
        let decoded = ControlParameters::decode(&parameters.encode()).unwrap();
        assert_eq!(decoded, parameters);
    }

    #[test]
    fn response_round_trip() {
        let response = ControlResponse::new(403, "unauthorized");
        let decoded = ControlResponse::decode(&response.encode()).unwrap();
        assert_eq!(decoded.code, 403);
        assert_eq!(decoded.text, "unauthorized");
    }

    #[test]
    fn segment_component_round_trip() {
        for number in [0u64, 1, 255, 65536] {
            let component = make_segment_component(number);
            assert_eq!(parse_segment_component(&component), Some(number));
        }
    }
}
