//! Application callbacks.
//!
//! Handlers run on the node task after the engine call that produced the
//! event has returned, so a handler never observes a table mid-update. They
//! must not block; hand heavy work to another task.

use std::sync::Arc;

use bytes::Bytes;

use reticulum_core::identity::Identity;
use reticulum_core::packet::context::ContextType;
use reticulum_core::packet::wire::RawPacket;
use reticulum_core::types::{DestinationHash, LinkId, NameHash, PacketHash};
use reticulum_transport::InterfaceId;
use reticulum_transport::receipt::ReceiptStatus;

/// A packet delivered to a registered destination.
#[derive(Debug, Clone)]
pub struct DeliveredPacket {
    pub destination: DestinationHash,
    pub packet_hash: PacketHash,
    pub context: ContextType,
    pub data: Bytes,
    pub interface: InterfaceId,
}

/// Receives traffic for one registered destination.
pub trait DestinationHandler: Send {
    fn on_packet(&mut self, packet: &DeliveredPacket);

    /// Asked for each packet to a destination whose proof strategy is
    /// `App`. Returning `true` sends a proof back.
    fn proof_requested(&mut self, _packet: &DeliveredPacket) -> bool {
        false
    }
}

/// A valid announce that updated the path table.
#[derive(Debug, Clone)]
pub struct ReceivedAnnounce {
    pub destination: DestinationHash,
    pub identity: Arc<dyn Identity>,
    pub name_hash: NameHash,
    pub app_data: Option<Bytes>,
    pub hops: u8,
    pub interface: InterfaceId,
    pub path_response: bool,
}

/// Observes announces heard from the network.
pub trait AnnounceHandler: Send {
    /// Only announces for this name hash are passed on. `None` sees all.
    fn aspect_filter(&self) -> Option<NameHash> {
        None
    }

    /// Whether announces sent in answer to path requests are wanted.
    fn receive_path_responses(&self) -> bool {
        false
    }

    fn on_announce(&mut self, announce: &ReceivedAnnounce);
}

/// Whether `handler` wants `announce`.
pub(crate) fn announce_matches(handler: &dyn AnnounceHandler, announce: &ReceivedAnnounce) -> bool {
    if announce.path_response && !handler.receive_path_responses() {
        return false;
    }
    handler
        .aspect_filter()
        .is_none_or(|name_hash| name_hash == announce.name_hash)
}

/// Told once how a sent packet's receipt concluded.
pub trait ReceiptHandler: Send {
    fn on_delivered(&mut self, _packet_hash: &PacketHash) {}

    fn on_failed(&mut self, _packet_hash: &PacketHash, _status: ReceiptStatus) {}
}

/// Link traffic, for the link layer sitting above the node.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    Request {
        destination: DestinationHash,
        link_id: LinkId,
        packet: RawPacket,
        interface: InterfaceId,
    },
    Traffic {
        link_id: LinkId,
        packet: RawPacket,
        interface: InterfaceId,
    },
    Proof {
        link_id: LinkId,
        packet: RawPacket,
        interface: InterfaceId,
    },
}

pub trait LinkHandler: Send {
    fn on_link_event(&mut self, event: LinkEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use reticulum_core::testing::TestIdentity;

    struct Filtered {
        filter: Option<NameHash>,
        path_responses: bool,
    }

    impl AnnounceHandler for Filtered {
        fn aspect_filter(&self) -> Option<NameHash> {
            self.filter
        }

        fn receive_path_responses(&self) -> bool {
            self.path_responses
        }

        fn on_announce(&mut self, _announce: &ReceivedAnnounce) {}
    }

    fn announce(name_hash: NameHash, path_response: bool) -> ReceivedAnnounce {
        ReceivedAnnounce {
            destination: DestinationHash::new([1; 16]),
            identity: Arc::new(TestIdentity::from_seed(1)),
            name_hash,
            app_data: None,
            hops: 1,
            interface: InterfaceId(0),
            path_response,
        }
    }

    #[test]
    fn unfiltered_handler_sees_every_announce() {
        let handler = Filtered {
            filter: None,
            path_responses: false,
        };
        assert!(announce_matches(&handler, &announce(NameHash::new([1; 10]), false)));
        assert!(announce_matches(&handler, &announce(NameHash::new([2; 10]), false)));
    }

    #[test]
    fn aspect_filter_matches_name_hash() {
        let handler = Filtered {
            filter: Some(NameHash::new([1; 10])),
            path_responses: false,
        };
        assert!(announce_matches(&handler, &announce(NameHash::new([1; 10]), false)));
        assert!(!announce_matches(&handler, &announce(NameHash::new([2; 10]), false)));
    }

    #[test]
    fn path_responses_need_opt_in() {
        let quiet = Filtered {
            filter: None,
            path_responses: false,
        };
        let eager = Filtered {
            filter: None,
            path_responses: true,
        };
        let response = announce(NameHash::new([1; 10]), true);
        assert!(!announce_matches(&quiet, &response));
        assert!(announce_matches(&eager, &response));
    }
}
