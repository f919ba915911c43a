//! Signed inbound envelopes and the typed messages they carry.
//!
//! The transport hands over an [`InboundEnvelope`] with an opaque payload.
//! Nothing past this module sees raw bytes: the payload is decoded with
//! `bincode` into a [`PeerMessage`] and its variant must agree with the
//! envelope's declared [`MessageKind`].
//!
//! ## Security
//!
//! The envelope signature covers the kind, payload, nonce and timestamp
//! under the `ENVELOPE` domain, so none of them can be swapped between
//! messages. Payload length is checked before decoding.

use biogate_crypto::{Hash256, PublicKey, Signature, SigningKeyPair};
use biogate_proof::AggregateProof;
use biogate_protocol::{purposes, CanonicalEncoder, Nonce};
use biogate_reputation::PeerId;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Declared message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// An aggregate proof for the current round.
    ProofSubmission,
    /// A consensus vote.
    ConsensusParticipation,
    /// Liveness ping.
    Heartbeat,
    /// Evidence against another peer.
    ByzantineReport,
}

impl MessageKind {
    /// Stable wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            Self::ProofSubmission => 1,
            Self::ConsensusParticipation => 2,
            Self::Heartbeat => 3,
            Self::ByzantineReport => 4,
        }
    }
}

/// Decoded payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// Proof for the sender's readings.
    ProofSubmission(AggregateProof),
    /// The sender's vote in a round.
    ConsensusParticipation {
        /// Round number.
        round: u64,
        /// What the sender voted for.
        vote: Hash256,
    },
    /// Liveness ping, optionally echoing one of ours.
    Heartbeat {
        /// Our timestamp being echoed back.
        echo_ms: Option<u64>,
    },
    /// Two conflicting votes signed by `accused` in one round.
    ByzantineReport {
        /// Who equivocated.
        accused: PeerId,
        /// First signed vote.
        first: InboundEnvelope,
        /// Conflicting signed vote.
        second: InboundEnvelope,
    },
}

impl PeerMessage {
    /// Kind this message must be declared as.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ProofSubmission(_) => MessageKind::ProofSubmission,
            Self::ConsensusParticipation { .. } => MessageKind::ConsensusParticipation,
            Self::Heartbeat { .. } => MessageKind::Heartbeat,
            Self::ByzantineReport { .. } => MessageKind::ByzantineReport,
        }
    }
}

/// Envelope as received from transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Declared kind.
    pub kind: MessageKind,
    /// `bincode`-encoded [`PeerMessage`].
    pub payload: Vec<u8>,
    /// Sender's signature over [`InboundEnvelope::signing_bytes`].
    pub signature: Signature,
    /// 64-character lowercase hex nonce.
    pub nonce: String,
    /// Send time, ms since epoch.
    pub timestamp_ms: u64,
}

impl InboundEnvelope {
    /// Bytes the sender signs.
    pub fn signing_bytes(kind: MessageKind, payload: &[u8], nonce: &str, timestamp_ms: u64) -> Vec<u8> {
        CanonicalEncoder::new(purposes::ENVELOPE)
            .u8(kind.tag())
            .bytes(payload)
            .str(nonce)
            .u64(timestamp_ms)
            .finish()
    }

    /// Encode and sign `message`.
    pub fn seal(
        message: &PeerMessage,
        nonce: &Nonce,
        timestamp_ms: u64,
        key: &SigningKeyPair,
    ) -> Result<Self> {
        let kind = message.kind();
        let payload = bincode::serialize(message)?;
        let nonce = nonce.to_hex();
        let signature = key.sign(&Self::signing_bytes(kind, &payload, &nonce, timestamp_ms));
        Ok(Self {
            kind,
            payload,
            signature,
            nonce,
            timestamp_ms,
        })
    }

    /// Check the signature against `public_key`.
    pub fn verify_signature(&self, public_key: &PublicKey) -> bool {
        let message =
            Self::signing_bytes(self.kind, &self.payload, &self.nonce, self.timestamp_ms);
        public_key.verify(&message, &self.signature)
    }

    /// Decode the payload, refusing anything over `max_payload_bytes` or
    /// whose variant disagrees with the declared kind.
    pub fn decode(&self, max_payload_bytes: usize) -> Result<PeerMessage> {
        if self.payload.len() > max_payload_bytes {
            return Err(CoreError::Encoding(format!(
                "payload of {} bytes exceeds {max_payload_bytes}",
                self.payload.len()
            )));
        }
        let message: PeerMessage = bincode::deserialize(&self.payload)?;
        if message.kind() != self.kind {
            return Err(CoreError::Encoding(format!(
                "declared {:?} but payload is {:?}",
                self.kind,
                message.kind()
            )));
        }
        Ok(message)
    }

    /// Whole-envelope wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Parse the whole-envelope wire form.
    pub fn from_bytes(bytes: &[u8], max_bytes: usize) -> Result<Self> {
        if bytes.len() > max_bytes {
            return Err(CoreError::Encoding(format!(
                "envelope of {} bytes exceeds {max_bytes}",
                bytes.len()
            )));
        }
        Ok(bincode::deserialize(bytes)?)
    }
}
