//! # biogate-core
//!
//! The BIOGATE integrity service.
//!
//! [`IntegrityService`] owns the proof engine, nonce registry, anomaly
//! detector and reputation manager, and is the only thing the transport
//! talks to. It takes [`InboundEnvelope`]s, decides their fate, and produces
//! a [`ConsensusInput`] per validator each round.
//!
//! Transport integration happens through two traits: [`PeerDirectory`] for
//! public key lookup and [`biogate_reputation::TransportCommands`] for
//! disconnects and partition alerts.
//!
//! ## Security
//!
//! - Checks run cheapest first: admission, format, freshness, nonce, then
//!   signature. A nonce is spent before the signature is checked.
//! - Callers learn a [`biogate_protocol::RejectReason`] and nothing else.
//! - A proof with a critical anomaly verdict is never staged for broadcast.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod service;

#[cfg(test)]
mod proptests;

pub use config::{EnvelopeConfig, IntegrityConfig, IntegrityConfigBuilder};
pub use envelope::{InboundEnvelope, MessageKind, PeerMessage};
pub use error::{CoreError, Result};
pub use gate::{BroadcastGate, StagedProof};
pub use service::{
    open_readings, seal_readings, ConsensusInput, Dispatched, IntegrityService, PeerDirectory,
    StaticDirectory,
};
