//! Delivery receipts for sent packets.
//!
//! A receipt waits for a proof addressed to the truncated hash of the
//! packet it watches. Proofs come in two forms:
//!
//! ```text
//! explicit: packet_hash(32) + signature(64)
//! implicit: signature(64)
//! ```
//!
//! Either way the signature is over the full packet hash and is checked
//! against the identity of the destination the packet was sent to.

use std::collections::VecDeque;

use reticulum_core::constants::{HASHLENGTH, SIGLENGTH};
use reticulum_core::identity::Identity;
use reticulum_core::types::{DestinationHash, PacketHash, Signature, TruncatedHash};

/// Receipts kept before the oldest is culled.
pub const MAX_RECEIPTS: usize = 1024;

pub const EXPLICIT_PROOF_LENGTH: usize = HASHLENGTH + SIGLENGTH;
pub const IMPLICIT_PROOF_LENGTH: usize = SIGLENGTH;

/// Base receipt timeout, plus the same again per hop.
pub const DEFAULT_PER_HOP_TIMEOUT: f64 = 6.0;
pub const TIMEOUT_PER_HOP: f64 = 6.0;

/// How often receipts are checked for timeouts.
pub const RECEIPTS_CHECK_INTERVAL: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Sent,
    Delivered,
    Failed,
    /// Evicted to make room, or its timeout was disabled.
    Culled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacketReceipt {
    pub hash: PacketHash,
    pub truncated_hash: TruncatedHash,
    pub destination: DestinationHash,
    pub sent_at: f64,
    /// Seconds after `sent_at`. `None` disables the timeout.
    pub timeout: Option<f64>,
    pub status: ReceiptStatus,
}

impl PacketReceipt {
    pub fn new(hash: PacketHash, destination: DestinationHash, sent_at: f64, hops: u8) -> Self {
        Self {
            hash,
            truncated_hash: hash.truncated(),
            destination,
            sent_at,
            timeout: Some(DEFAULT_PER_HOP_TIMEOUT + TIMEOUT_PER_HOP * f64::from(hops)),
            status: ReceiptStatus::Sent,
        }
    }

    /// Verify a proof against the destination's identity.
    pub fn validate_proof(&self, proof: &[u8], identity: &dyn Identity) -> bool {
        let signature = match proof.len() {
            EXPLICIT_PROOF_LENGTH => {
                if &proof[..HASHLENGTH] != self.hash.as_ref() {
                    return false;
                }
                &proof[HASHLENGTH..]
            }
            IMPLICIT_PROOF_LENGTH => proof,
            _ => return false,
        };
        match Signature::try_from(signature) {
            Ok(signature) => identity.verify(self.hash.as_ref(), &signature),
            Err(_) => false,
        }
    }

    fn is_timed_out(&self, now: f64) -> bool {
        match self.timeout {
            Some(timeout) => now > self.sent_at + timeout,
            None => true,
        }
    }
}

/// Build a proof payload for `packet_hash` signed by `identity`.
pub fn build_proof(
    identity: &dyn Identity,
    packet_hash: &PacketHash,
    implicit: bool,
) -> Result<Vec<u8>, reticulum_core::error::IdentityError> {
    let signature = identity.sign(packet_hash.as_ref())?;
    let mut proof = Vec::with_capacity(EXPLICIT_PROOF_LENGTH);
    if !implicit {
        proof.extend_from_slice(packet_hash.as_ref());
    }
    proof.extend_from_slice(signature.as_ref());
    Ok(proof)
}

/// Outstanding receipts, oldest first.
#[derive(Debug)]
pub struct ReceiptTable {
    receipts: VecDeque<PacketReceipt>,
    max: usize,
}

impl Default for ReceiptTable {
    fn default() -> Self {
        Self::new(MAX_RECEIPTS)
    }
}

impl ReceiptTable {
    pub fn new(max: usize) -> Self {
        Self {
            receipts: VecDeque::new(),
            max: max.max(1),
        }
    }

    /// Track a receipt. Returns the receipt culled to make room, if any.
    pub fn add(&mut self, receipt: PacketReceipt) -> Option<PacketReceipt> {
        self.receipts.push_back(receipt);
        if self.receipts.len() > self.max {
            return self.receipts.pop_front().map(|mut culled| {
                culled.timeout = None;
                culled.status = ReceiptStatus::Culled;
                culled
            });
        }
        None
    }

    pub fn find(&self, truncated: &TruncatedHash) -> Option<&PacketReceipt> {
        self.receipts.iter().find(|r| &r.truncated_hash == truncated)
    }

    /// Remove the receipt proven by `proof` if it verifies. The receipt is
    /// gone afterwards, so a second proof never concludes it again.
    pub fn prove(
        &mut self,
        truncated: &TruncatedHash,
        proof: &[u8],
        identity: &dyn Identity,
    ) -> Option<PacketReceipt> {
        let index = self
            .receipts
            .iter()
            .position(|r| &r.truncated_hash == truncated && r.validate_proof(proof, identity))?;
        self.receipts.remove(index).map(|mut r| {
            r.status = ReceiptStatus::Delivered;
            r
        })
    }

    /// Remove and return receipts whose timeout has passed.
    pub fn check_timeouts(&mut self, now: f64) -> Vec<PacketReceipt> {
        let mut expired = Vec::new();
        self.receipts.retain(|r| {
            if r.is_timed_out(now) {
                let mut failed = r.clone();
                failed.status = if r.timeout.is_some() {
                    ReceiptStatus::Failed
                } else {
                    ReceiptStatus::Culled
                };
                expired.push(failed);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}
