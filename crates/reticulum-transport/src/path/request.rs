//! Path request construction and parsing.
//!
//! Path requests are broadcast DATA packets sent to the well-known PLAIN
//! destination `rnstransport.path.request`. Nodes that know a path answer
//! with the announce backing it.

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};
use reticulum_core::constants::TRUNCATED_HASHLENGTH;
use reticulum_core::types::{DestinationHash, IdentityHash};

use super::constants::PATH_REQUEST_MI;

/// Result of parsing path request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Processed(ParsedPathRequest),
    /// Shorter than a destination hash.
    TooShort,
    /// A destination but no tag; such requests are ignored.
    Tagless,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPathRequest {
    pub destination_hash: DestinationHash,
    /// Present when the requester runs transport.
    pub requesting_transport_id: Option<IdentityHash>,
    /// At most 16 bytes.
    pub tag: Bytes,
}

impl ParsedPathRequest {
    /// `destination_hash || tag`, the key for duplicate suppression.
    pub fn unique_tag(&self) -> Vec<u8> {
        let mut unique = Vec::with_capacity(TRUNCATED_HASHLENGTH + self.tag.len());
        unique.extend_from_slice(self.destination_hash.as_ref());
        unique.extend_from_slice(&self.tag);
        unique
    }
}

fn hash16(bytes: &[u8]) -> [u8; TRUNCATED_HASHLENGTH] {
    let mut out = [0u8; TRUNCATED_HASHLENGTH];
    out.copy_from_slice(&bytes[..TRUNCATED_HASHLENGTH]);
    out
}

/// Parse a path request payload:
/// `destination(16) [+ transport_id(16)] + tag(1..16)`.
///
/// The transport id is present iff the payload is longer than 32 bytes.
/// Tags longer than 16 bytes are truncated.
#[must_use]
pub fn parse_path_request_data(data: &Bytes) -> ParseResult {
    const DST: usize = TRUNCATED_HASHLENGTH;
    if data.len() < DST {
        return ParseResult::TooShort;
    }
    let destination_hash = DestinationHash::new(hash16(data));

    let (requesting_transport_id, tag_start) = if data.len() > DST * 2 {
        (Some(IdentityHash::new(hash16(&data[DST..]))), DST * 2)
    } else {
        (None, DST)
    };

    if data.len() <= tag_start {
        return ParseResult::Tagless;
    }
    let tag_end = data.len().min(tag_start + TRUNCATED_HASHLENGTH);

    ParseResult::Processed(ParsedPathRequest {
        destination_hash,
        requesting_transport_id,
        tag: data.slice(tag_start..tag_end),
    })
}

/// Build a path request payload.
#[must_use]
pub fn build_path_request_data(
    target: &DestinationHash,
    transport_id: Option<&IdentityHash>,
    tag: &[u8],
) -> Bytes {
    let tag = &tag[..tag.len().min(TRUNCATED_HASHLENGTH)];
    let mut data = BytesMut::with_capacity(TRUNCATED_HASHLENGTH * 2 + tag.len());
    data.put_slice(target.as_ref());
    if let Some(tid) = transport_id {
        data.put_slice(tid.as_ref());
    }
    data.put_slice(tag);
    data.freeze()
}

/// Per-destination throttle for automatically issued path requests.
#[derive(Debug, Default)]
pub struct PathRequestTracker {
    requests: HashMap<DestinationHash, f64>,
}

impl PathRequestTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a request was sent now.
    pub fn record(&mut self, dest: DestinationHash, now: f64) {
        self.requests.insert(dest, now);
    }

    pub fn last_request(&self, dest: &DestinationHash) -> Option<f64> {
        self.requests.get(dest).copied()
    }

    /// Whether the minimum interval has passed since the last request.
    pub fn allows(&self, dest: &DestinationHash, now: f64) -> bool {
        self.last_request(dest)
            .is_none_or(|last| now - last >= PATH_REQUEST_MI)
    }

    /// Drop requests whose interval has passed. Returns how many went.
    pub fn cull(&mut self, now: f64) -> usize {
        let before = self.requests.len();
        self.requests.retain(|_, last| now - *last < PATH_REQUEST_MI);
        before - self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> DestinationHash {
        DestinationHash::new([0xD0; 16])
    }

    #[test]
    fn parses_tag_without_transport_id() {
        let data = build_path_request_data(&dest(), None, &[7u8; 16]);
        assert_eq!(data.len(), 32);
        let ParseResult::Processed(req) = parse_path_request_data(&data) else {
            panic!("expected processed");
        };
        assert_eq!(req.destination_hash, dest());
        assert!(req.requesting_transport_id.is_none());
        assert_eq!(&req.tag[..], &[7u8; 16]);
        assert_eq!(req.unique_tag().len(), 32);
    }

    #[test]
    fn parses_transport_id_when_longer_than_32() {
        let tid = IdentityHash::new([0x77; 16]);
        let data = build_path_request_data(&dest(), Some(&tid), &[1, 2, 3]);
        assert_eq!(data.len(), 35);
        let ParseResult::Processed(req) = parse_path_request_data(&data) else {
            panic!("expected processed");
        };
        assert_eq!(req.requesting_transport_id, Some(tid));
        assert_eq!(&req.tag[..], &[1, 2, 3]);
    }

    #[test]
    fn long_tag_is_truncated() {
        let mut raw = dest().to_bytes().to_vec();
        raw.extend_from_slice(&[0x11; 16]);
        raw.extend_from_slice(&[0x22; 20]);
        let ParseResult::Processed(req) = parse_path_request_data(&Bytes::from(raw)) else {
            panic!("expected processed");
        };
        assert_eq!(req.tag.len(), 16);
    }

    #[test]
    fn tagless_and_short_requests() {
        let data = Bytes::copy_from_slice(dest().as_ref());
        assert_eq!(parse_path_request_data(&data), ParseResult::Tagless);
        assert_eq!(
            parse_path_request_data(&Bytes::from_static(&[1, 2, 3])),
            ParseResult::TooShort
        );
    }

    #[test]
    fn tracker_enforces_minimum_interval() {
        let mut tracker = PathRequestTracker::new();
        assert!(tracker.allows(&dest(), 100.0));
        tracker.record(dest(), 100.0);
        assert!(!tracker.allows(&dest(), 119.9));
        assert!(tracker.allows(&dest(), 120.0));
    }

    #[test]
    fn tracker_cull_keeps_only_throttled_destinations() {
        let mut tracker = PathRequestTracker::new();
        tracker.record(dest(), 100.0);
        tracker.record(DestinationHash::new([0xD1; 16]), 110.0);
        assert_eq!(tracker.cull(125.0), 1);
        assert!(tracker.last_request(&dest()).is_none());
        assert_eq!(tracker.last_request(&DestinationHash::new([0xD1; 16])), Some(110.0));
        assert_eq!(tracker.cull(125.0), 0);
    }
}
