//! # biogate-reputation
//!
//! Peer reputation and Byzantine response for BIOGATE.
//!
//! Each peer moves through a one-way state machine:
//! first contact makes it `Active` with a score of 100, a low score or an
//! anomaly verdict can quarantine it, and a score below 20, a burst of
//! suspicious activity or an exclude verdict blacklists it for good.
//!
//! The manager never performs I/O. It asks the transport to disconnect
//! blacklisted peers through [`TransportCommands`] and publishes
//! [`ReputationEvent`]s on a bounded channel.
//!
//! ## Security
//!
//! - Blacklisting is terminal, idempotent and survives reconnects.
//! - The DoS guard applies regardless of score.
//! - Updates to different peers never contend on the same lock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod peer;
pub mod rate_limiter;
pub mod record;
pub mod score;
pub mod suspicious;

#[cfg(test)]
mod proptests;

pub use config::ReputationConfig;
pub use error::{ReputationError, Result};
pub use events::{PartitionAlert, ReputationEvent, TransportCommands};
pub use manager::ReputationManager;
pub use peer::{ExclusionReason, PeerId, PeerState, QuarantineCause};
pub use rate_limiter::{RateLimitResult, RequestWindow};
pub use record::{LatencyWindow, MessageCounters, ReputationRecord};
pub use score::ReputationScore;
pub use suspicious::{BurstSummary, SuspiciousEntry, SuspiciousKind, SuspiciousLog};
