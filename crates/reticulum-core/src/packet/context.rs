//! Packet context byte.
//!
//! The context tells the receiver what the payload is for, and decides
//! whether the payload is carried in the clear.

use crate::error::PacketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContextType {
    None = 0,
    Resource = 1,
    ResourceAdv = 2,
    ResourceReq = 3,
    ResourceHmu = 4,
    ResourcePrf = 5,
    ResourceIcl = 6,
    ResourceRcl = 7,
    CacheRequest = 8,
    Request = 9,
    Response = 10,
    PathResponse = 11,
    Command = 12,
    CommandStatus = 13,
    Channel = 14,
    Keepalive = 250,
    LinkIdentify = 251,
    LinkClose = 252,
    LinkProof = 253,
    Lrrtt = 254,
    Lrproof = 255,
}

impl TryFrom<u8> for ContextType {
    type Error = PacketError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let ctx = match byte {
            0 => ContextType::None,
            1 => ContextType::Resource,
            2 => ContextType::ResourceAdv,
            3 => ContextType::ResourceReq,
            4 => ContextType::ResourceHmu,
            5 => ContextType::ResourcePrf,
            6 => ContextType::ResourceIcl,
            7 => ContextType::ResourceRcl,
            8 => ContextType::CacheRequest,
            9 => ContextType::Request,
            10 => ContextType::Response,
            11 => ContextType::PathResponse,
            12 => ContextType::Command,
            13 => ContextType::CommandStatus,
            14 => ContextType::Channel,
            250 => ContextType::Keepalive,
            251 => ContextType::LinkIdentify,
            252 => ContextType::LinkClose,
            253 => ContextType::LinkProof,
            254 => ContextType::Lrrtt,
            255 => ContextType::Lrproof,
            _ => return Err(PacketError::InvalidContextType(byte)),
        };
        Ok(ctx)
    }
}

impl ContextType {
    #[must_use = "returns the encoded byte without side effects"]
    pub const fn to_byte(&self) -> u8 {
        *self as u8
    }

    /// Contexts internal to an established link (keepalive through link proof).
    pub const fn is_link_internal(&self) -> bool {
        self.to_byte() >= ContextType::Keepalive.to_byte()
    }

    /// Contexts belonging to the resource transfer protocol.
    pub const fn is_resource_internal(&self) -> bool {
        let b = self.to_byte();
        b >= ContextType::Resource.to_byte() && b <= ContextType::ResourceRcl.to_byte()
    }

    /// Contexts that pass the inbound filter even when their hash was seen.
    pub const fn bypasses_dedup(&self) -> bool {
        matches!(
            self,
            ContextType::Keepalive
                | ContextType::ResourceReq
                | ContextType::ResourcePrf
                | ContextType::Resource
                | ContextType::CacheRequest
                | ContextType::Channel
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_21_context_bytes_are_valid() {
        let mut valid = 0;
        for byte in 0..=255u8 {
            match ContextType::try_from(byte) {
                Ok(ctx) => {
                    assert_eq!(ctx.to_byte(), byte);
                    valid += 1;
                }
                Err(PacketError::InvalidContextType(v)) => assert_eq!(v, byte),
                Err(other) => panic!("unexpected error for {byte}: {other}"),
            }
        }
        assert_eq!(valid, 21);
    }

    #[test]
    fn test_link_and_resource_ranges() {
        assert!(ContextType::Keepalive.is_link_internal());
        assert!(ContextType::Lrproof.is_link_internal());
        assert!(!ContextType::Channel.is_link_internal());
        assert!(ContextType::Resource.is_resource_internal());
        assert!(ContextType::ResourceRcl.is_resource_internal());
        assert!(!ContextType::None.is_resource_internal());
        assert!(!ContextType::CacheRequest.is_resource_internal());
    }

    #[test]
    fn dedup_bypass_set() {
        assert!(ContextType::Keepalive.bypasses_dedup());
        assert!(ContextType::Channel.bypasses_dedup());
        assert!(!ContextType::None.bypasses_dedup());
        assert!(!ContextType::PathResponse.bypasses_dedup());
    }
}
