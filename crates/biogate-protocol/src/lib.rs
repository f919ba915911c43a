//! # biogate-protocol
//!
//! Wire model and replay protection for BIOGATE.
//!
//! Provides:
//! - [`Reading`]: validated device measurements with canonical bytes
//! - [`Nonce`] and [`ReplayGuard`]: single-use tokens with a bounded registry
//! - [`CanonicalEncoder`]: domain-separated, length-prefixed signing payloads
//! - [`RejectReason`]: the reason codes a counterparty may see
//! - Freshness checks on millisecond timestamps
//!
//! ## Security
//!
//! Every signed structure goes through [`CanonicalEncoder`], which prefixes a
//! purpose label, so a signature made for one purpose can never verify for
//! another.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod nonce;
pub mod reading;
pub mod replay;
pub mod time;
pub mod wire;

#[cfg(test)]
mod proptests;

pub use error::{ProtocolError, RejectReason, Result};
pub use nonce::Nonce;
pub use reading::{Reading, SignalType};
pub use replay::{ReplayConfig, ReplayGuard};
pub use time::{check_freshness, now_ms, validate_timestamp};
pub use wire::{build_domain_label, purposes, round2, CanonicalEncoder};
