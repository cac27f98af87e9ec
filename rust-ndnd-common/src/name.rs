//! Hierarchical NDN names.
//!
//! A [`Name`] is an ordered sequence of opaque components supporting prefix
//! relations and the canonical NDN component ordering (shorter before longer,
//! then lexicographic).

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Maximum number of components in an NDN name.
pub const MAX_NAME_COMPONENTS: usize = 64;

/// Marker octet prefixing a version component value.
const VERSION_MARKER: u8 = 0xFD;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Creates a version component: marker octet followed by the encoded integer.
    pub fn from_version(version: u64) -> Self {
        let mut buf = BytesMut::with_capacity(9);
        buf.extend_from_slice(&[VERSION_MARKER]);
        tlv::encode_nonneg_integer(version, &mut buf);
        Self(buf.freeze())
    }

    /// Interprets this component as a version number, if it is one.
    pub fn to_version(&self) -> Option<u64> {
        if self.0.len() < 2 || self.0[0] != VERSION_MARKER {
            return None;
        }
        tlv::decode_nonneg_integer(&self.0[1..]).ok()
    }

    pub fn is_version(&self) -> bool {
        self.to_version().is_some()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_COMPONENT && element.tlv_type != tlv::TLV_DIGEST_COMPONENT
        {
            return Err(Error::Packet(format!(
                "Expected name component TLV type, got {}",
                element.tlv_type
            )));
        }
        Ok(Self(element.value.clone()))
    }
}

impl PartialOrd for NameComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NameComponent {
    /// Canonical NDN order: shorter component first, then lexicographic.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a URI-style name. Percent-encoded octets are decoded.
    pub fn from_string(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(|comp| NameComponent::new(percent_decode(comp)))
            .collect();
        Self { components }
    }

    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Returns a copy of this name with `component` appended.
    pub fn appended(&self, component: NameComponent) -> Self {
        let mut name = self.clone();
        name.push(component);
        name
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// Returns the last component, if any.
    pub fn last(&self) -> Option<&NameComponent> {
        self.components.last()
    }

    /// Returns the prefix consisting of the first `len` components.
    pub fn get_prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// Returns the name without its last component; the root name stays root.
    pub fn parent(&self) -> Self {
        self.get_prefix(self.len().saturating_sub(1))
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::Packet(format!(
                "Expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();
        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf)?;
            components.push(NameComponent::from_tlv(&e)?);
        }
        if components.len() > MAX_NAME_COMPONENTS {
            return Err(Error::Packet(format!(
                "Name has {} components, exceeding the limit of {}",
                components.len(),
                MAX_NAME_COMPONENTS
            )));
        }
        Ok(Self { components })
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::from_string(s)
    }
}

fn percent_decode(component: &str) -> Vec<u8> {
    let bytes = component.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 3 <= bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(b) = u8::from_str_radix(hex, 16) {
                    out.push(b);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_creation() {
        let name = Name::from_string("/test/data/1");
        assert_eq!(name.len(), 3);
        assert_eq!(name.get(0).unwrap().as_bytes(), b"test");
        assert_eq!(name.get(1).unwrap().as_bytes(), b"data");
        assert_eq!(name.get(2).unwrap().as_bytes(), b"1");
        assert_eq!(name.to_string(), "/test/data/1");
    }

    #[test]
    fn name_compare() {
        let name1 = Name::from_string("/a/b/c");
        let name2 = Name::from_string("/a/b/c");
        let name3 = Name::from_string("/a/b/d");
        let name4 = Name::from_string("/a/b");

        assert_eq!(name1, name2);
        assert_ne!(name1, name3);
        assert_ne!(name1, name4);

        assert!(name4.is_prefix_of(&name1));
        assert!(!name1.is_prefix_of(&name4));
        assert!(!name3.is_prefix_of(&name1));
        assert!(Name::new().is_prefix_of(&name1));
        assert!(name4 < name1);
    }

    #[test]
    fn canonical_component_order() {
        // shorter component sorts first regardless of byte values
        let a = NameComponent::new(&b"zz"[..]);
        let b = NameComponent::new(&b"aaa"[..]);
        assert!(a < b);
    }

    #[test]
    fn name_tlv_round_trip() {
        let name = Name::from_string("/A/B/C");
        let decoded = Name::from_tlv(&name.to_tlv()).unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn version_component() {
        let comp = NameComponent::from_version(5);
        assert_eq!(comp.to_version(), Some(5));
        assert!(comp.is_version());
        assert!(!NameComponent::new(&b"best-route"[..]).is_version());

        let name = Name::from_string("/strategy/best-route").appended(NameComponent::from_version(4));
        assert_eq!(name.last().unwrap().to_version(), Some(4));
        assert_eq!(name.parent(), Name::from_string("/strategy/best-route"));
    }

    #[test]
    fn percent_escaping_round_trips() {
        let comp = NameComponent::from_version(1);
        let printed = format!("{}", comp);
        assert!(printed.starts_with("%FD"));
        let reparsed = Name::from_string(&format!("/{}", printed));
        assert_eq!(reparsed.get(0).unwrap(), &comp);
    }
}
