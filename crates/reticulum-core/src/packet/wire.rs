//! Wire framing: bytes to [`RawPacket`] and back, plus packet identity.
//!
//! Parsing only recovers framing. Payloads stay exactly as they arrived,
//! ciphertext included; decryption belongs to the destination.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{
    CONTEXT_SIZE, HEADER_1_SIZE, HEADER_2_SIZE, HeaderType, KEYSIZE, TRUNCATED_HASHLENGTH,
};
use crate::error::PacketError;
use crate::hash::{full_hash_parts, truncated_hash};
use crate::packet::context::ContextType;
use crate::packet::flags::{HASHED_FLAGS_MASK, PacketFlags};
use crate::types::{DestinationHash, IdentityHash, LinkId, PacketHash};

/// A framed packet. `data` shares the receive buffer when parsed from [`Bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub flags: PacketFlags,
    pub hops: u8,
    pub transport_id: Option<IdentityHash>,
    pub destination: DestinationHash,
    pub context: ContextType,
    pub data: Bytes,
}

fn address(raw: &[u8], at: usize) -> [u8; TRUNCATED_HASHLENGTH] {
    let mut out = [0u8; TRUNCATED_HASHLENGTH];
    out.copy_from_slice(&raw[at..at + TRUNCATED_HASHLENGTH]);
    out
}

impl RawPacket {
    /// Parse a packet from a borrowed slice, copying it once.
    pub fn parse(raw: &[u8]) -> Result<Self, PacketError> {
        Self::parse_bytes(Bytes::copy_from_slice(raw))
    }

    /// Parse a packet that already lives in a shared buffer.
    pub fn parse_bytes(raw: Bytes) -> Result<Self, PacketError> {
        let min = HEADER_1_SIZE + CONTEXT_SIZE;
        if raw.len() < min {
            return Err(PacketError::TooShort {
                min,
                actual: raw.len(),
            });
        }

        let flags = PacketFlags::from_byte(raw[0])?;
        let hops = raw[1];

        let (transport_id, dest_at) = match flags.header_type {
            HeaderType::Header1 => (None, 2),
            HeaderType::Header2 => {
                let min = HEADER_2_SIZE + CONTEXT_SIZE;
                if raw.len() < min {
                    return Err(PacketError::TooShort {
                        min,
                        actual: raw.len(),
                    });
                }
                (Some(IdentityHash::new(address(&raw, 2))), 18)
            }
        };

        let destination = DestinationHash::new(address(&raw, dest_at));
        let context_at = dest_at + TRUNCATED_HASHLENGTH;
        let context = ContextType::try_from(raw[context_at])?;
        let data = raw.slice(context_at + CONTEXT_SIZE..);

        Ok(RawPacket {
            flags,
            hops,
            transport_id,
            destination,
            context,
            data,
        })
    }

    pub fn header_size(&self) -> usize {
        self.flags.header_type.size() + CONTEXT_SIZE
    }

    /// Size of the frame on the wire.
    pub fn wire_len(&self) -> usize {
        self.header_size() + self.data.len()
    }

    /// Serialize back to wire format.
    ///
    /// A header-2 packet without a transport id serializes its destination
    /// in both address slots; use the builder to catch that at pack time.
    pub fn serialize(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.wire_len());
        out.put_u8(self.flags.to_byte());
        out.put_u8(self.hops);
        if self.flags.header_type == HeaderType::Header2 {
            let tid = self
                .transport_id
                .map(|t| t.to_bytes())
                .unwrap_or_else(|| self.destination.to_bytes());
            out.put_slice(&tid);
        }
        out.put_slice(self.destination.as_ref());
        out.put_u8(self.context.to_byte());
        out.put_slice(&self.data);
        out.freeze()
    }

    /// Masked flags, destination, context and payload. Hops and transport
    /// id are left out so relaying never changes identity.
    pub fn hashable_part(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(1 + TRUNCATED_HASHLENGTH + 1 + self.data.len());
        out.put_u8(self.flags.to_byte() & HASHED_FLAGS_MASK);
        out.put_slice(self.destination.as_ref());
        out.put_u8(self.context.to_byte());
        out.put_slice(&self.data);
        out
    }

    pub fn packet_hash(&self) -> PacketHash {
        let flags = [self.flags.to_byte() & HASHED_FLAGS_MASK];
        let context = [self.context.to_byte()];
        full_hash_parts(&[&flags, self.destination.as_ref(), &context, &self.data]).into()
    }

    pub fn truncated_hash(&self) -> crate::types::TruncatedHash {
        self.packet_hash().truncated()
    }

    /// Link id of a link request: its truncated hash, ignoring any
    /// signalling bytes appended after the two public keys.
    pub fn link_id(&self) -> LinkId {
        let mut hashable = self.hashable_part();
        if self.data.len() > KEYSIZE {
            let excess = self.data.len() - KEYSIZE;
            hashable.truncate(hashable.len() - excess);
        }
        truncated_hash(&hashable).into()
    }
}
