//! Link packet fragmentation.
//!
//! Splits a network packet's bytes into link packets that fit the transport
//! MTU. Non-fragmentation LP headers ride on the first fragment only. The
//! fast path (packet fits with room for a sequence number) returns the
//! input unchanged; a sequence number is reserved even then because other
//! link features need one.

use bytes::Bytes;
use log::warn;
use rust_ndnd_common::{Error, LpPacket};

/// Worst-case cost of adding a Sequence field: type + length + 8 octets.
const SEQUENCE_OVERHEAD: usize = 10;

/// Worst-case growth of the envelope when a Sequence (and a TxSequence) is
/// added to an already-encoded packet, length-field expansion included.
const MAX_SINGLE_FRAG_EXTRA: usize = 2 * SEQUENCE_OVERHEAD + 4;

/// Worst-case per-fragment envelope overhead: LpPacket type+length,
/// Sequence, TxSequence, FragIndex, FragCount, Fragment type+length.
const MAX_FRAG_OVERHEAD: usize = 4 + 4 * SEQUENCE_OVERHEAD + 4;

#[derive(Debug, Clone)]
pub struct FragmenterOptions {
    /// Maximum number of fragments one network packet may produce.
    pub n_max_fragments: usize,
}

impl Default for FragmenterOptions {
    fn default() -> Self {
        Self {
            n_max_fragments: 400,
        }
    }
}

pub struct LpFragmenter {
    options: FragmenterOptions,
}

impl LpFragmenter {
    pub fn new(options: FragmenterOptions) -> Self {
        Self { options }
    }

    /// Splits `packet` (which must carry a whole network packet and no
    /// fragmentation fields yet) into fragments that each fit `mtu`.
    pub fn fragment_packet(&self, packet: &LpPacket, mtu: usize) -> Result<Vec<LpPacket>, Error> {
        debug_assert!(packet.fragment.is_some());
        debug_assert!(!packet.is_fragmented());

        if packet.encoded_len() + MAX_SINGLE_FRAG_EXTRA <= mtu {
            // fast path: fits as a single fragment
            return Ok(vec![packet.clone()]);
        }

        let payload = packet
            .fragment
            .clone()
            .ok_or_else(|| Error::LinkProtocol("cannot fragment an IDLE packet".into()))?;

        // non-fragmentation headers ride on the first fragment
        let first_header_size = packet.headers_len();
        if MAX_FRAG_OVERHEAD + first_header_size + 1 > mtu {
            warn!("fragmentation error, MTU too small for first fragment: DROP");
            return Err(Error::LinkProtocol("MTU too small for first fragment".into()));
        }

        let payload_size = mtu - MAX_FRAG_OVERHEAD;
        let first_payload_size = payload.len().min(payload_size - first_header_size);
        let rest = payload.len() - first_payload_size;
        let frag_count = 1 + rest / payload_size + usize::from(rest % payload_size != 0);

        if frag_count > self.options.n_max_fragments {
            warn!(
                "fragmentation error, FragCount {} over limit {}: DROP",
                frag_count, self.options.n_max_fragments
            );
            return Err(Error::LinkProtocol("fragment count over limit".into()));
        }

        let mut fragments = Vec::with_capacity(frag_count);
        let mut offset = 0usize;
        for index in 0..frag_count {
            let take = if index == 0 {
                first_payload_size
            } else {
                payload_size.min(payload.len() - offset)
            };
            let slice: Bytes = payload.slice(offset..offset + take);
            offset += take;

            let mut fragment = if index == 0 {
                packet.headers_only()
            } else {
                LpPacket::default()
            };
            fragment.frag_index = Some(index as u64);
            fragment.frag_count = Some(frag_count as u64);
            fragment.fragment = Some(slice);
            debug_assert!(fragment.encoded_len() + 2 * SEQUENCE_OVERHEAD <= mtu);
            fragments.push(fragment);
        }
        debug_assert_eq!(offset, payload.len());

        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_of(len: usize) -> LpPacket {
        LpPacket::from_fragment(Bytes::from(vec![0xAB; len]))
    }

    #[test]
    fn small_packet_is_not_fragmented() {
        let fragmenter = LpFragmenter::new(FragmenterOptions::default());
        let packet = packet_of(40);
        let fragments = fragmenter.fragment_packet(&packet, 100).unwrap();
        assert_eq!(fragments.len(), 1);
        assert!(!fragments[0].is_fragmented());
    }

    #[test]
    fn large_packet_fragments_and_fits_mtu() {
        let fragmenter = LpFragmenter::new(FragmenterOptions::default());
        let packet = packet_of(250);
        let fragments = fragmenter.fragment_packet(&packet, 100).unwrap();
        assert!(fragments.len() > 1);

        let mut total = 0;
        for (index, fragment) in fragments.iter().enumerate() {
            assert_eq!(fragment.frag_index, Some(index as u64));
            assert_eq!(fragment.frag_count, Some(fragments.len() as u64));
            assert!(fragment.encoded_len() + 2 * SEQUENCE_OVERHEAD <= 100);
            total += fragment.fragment.as_ref().unwrap().len();
        }
        assert_eq!(total, 250);
    }

    #[test]
    fn fragment_count_limit_is_enforced() {
        let fragmenter = LpFragmenter::new(FragmenterOptions { n_max_fragments: 2 });
        let packet = packet_of(1000);
        assert!(fragmenter.fragment_packet(&packet, 100).is_err());
    }

    #[test]
    fn headers_ride_on_first_fragment_only() {
        let fragmenter = LpFragmenter::new(FragmenterOptions::default());
        let mut packet = packet_of(250);
        packet.incoming_face_id = Some(256);
        let fragments = fragmenter.fragment_packet(&packet, 100).unwrap();
        assert_eq!(fragments[0].incoming_face_id, Some(256));
        for fragment in &fragments[1..] {
            assert_eq!(fragment.incoming_face_id, None);
        }
    }
}
