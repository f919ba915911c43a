//! Replay guard: issue nonces and consume each one exactly once.
//!
//! ## Security
//!
//! - A nonce is accepted at most once while it is tracked. The first
//!   `check_and_consume` wins; every later call is rejected no matter
//!   whether the operation that carried the nonce succeeded.
//! - Consumed nonces are grouped into buckets by the time they may be
//!   forgotten: the window after consumption, or later when the caller
//!   asks for a longer retention. Expired buckets are dropped whole, so a
//!   nonce is never pruned before its retention ends while the registry is
//!   under its ceiling.
//! - Nonces can be scoped to a signer. A scoped nonce only collides with
//!   the same nonce under the same scope, so one peer cannot burn another
//!   peer's nonce by using it first.
//! - Above the ceiling the entries closest to expiry are evicted first.
//!   That is the only case in which a replay inside the retention can
//!   succeed, and it is bounded by the ceiling itself.

use std::collections::{BTreeMap, HashMap};

use biogate_crypto::Hash256;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::limits::{MAX_TRACKED_NONCES, NONCE_BUCKET_MS, NONCE_WINDOW_MS};
use crate::nonce::Nonce;
use crate::time::now_ms;
use crate::wire::{build_domain_label, purposes};

/// Replay guard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// How long a consumed nonce is remembered.
    pub window_ms: u64,
    /// Registry size above which a sweep runs.
    pub max_entries: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            window_ms: NONCE_WINDOW_MS,
            max_entries: MAX_TRACKED_NONCES,
        }
    }
}

impl ReplayConfig {
    /// Set the retention window.
    pub fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    /// Set the registry ceiling.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Reject settings that would disable replay protection.
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            return Err(ProtocolError::InvalidConfig {
                field: "window_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_entries == 0 {
            return Err(ProtocolError::InvalidConfig {
                field: "max_entries",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Registry {
    /// Key to the bucket it was filed under.
    seen: HashMap<[u8; 32], u64>,
    /// Bucket key (`expires_ms / NONCE_BUCKET_MS`) to keys in insertion order.
    buckets: BTreeMap<u64, Vec<[u8; 32]>>,
}

impl Registry {
    fn insert(&mut self, key: [u8; 32], expires_ms: u64) -> bool {
        if self.seen.contains_key(&key) {
            return false;
        }
        let bucket = expires_ms / NONCE_BUCKET_MS;
        self.seen.insert(key, bucket);
        self.buckets.entry(bucket).or_default().push(key);
        true
    }

    /// Drop every bucket whose latest expiry has passed.
    fn prune_expired(&mut self, now_ms: u64) -> usize {
        let expired: Vec<u64> = self
            .buckets
            .keys()
            .take_while(|&&bucket| (bucket + 1).saturating_mul(NONCE_BUCKET_MS) <= now_ms)
            .copied()
            .collect();

        let mut removed = 0;
        for bucket in expired {
            if let Some(keys) = self.buckets.remove(&bucket) {
                for key in &keys {
                    self.seen.remove(key);
                }
                removed += keys.len();
            }
        }
        removed
    }

    /// Evict the entries closest to expiry until at most `max` remain.
    fn evict_oldest(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.seen.len() > max {
            let Some(mut entry) = self.buckets.first_entry() else {
                break;
            };
            let excess = self.seen.len() - max;
            let bucket = entry.get_mut();
            let take = excess.min(bucket.len());
            for key in bucket.drain(..take) {
                self.seen.remove(&key);
            }
            evicted += take;
            if bucket.is_empty() {
                entry.remove();
            }
        }
        evicted
    }
}

/// Concurrent single-use nonce registry.
#[derive(Debug)]
pub struct ReplayGuard {
    config: ReplayConfig,
    registry: Mutex<Registry>,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(ReplayConfig::default())
    }
}

impl ReplayGuard {
    /// Create a guard with the given settings.
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Draw a fresh nonce. Issuing does not register it.
    pub fn issue_nonce(&self) -> Nonce {
        Nonce::generate()
    }

    /// Consume `nonce` at the current wall-clock time.
    pub fn check_and_consume(&self, nonce: &Nonce) -> bool {
        self.check_and_consume_at(nonce, now_ms())
    }

    /// Consume `nonce` at `now_ms`. Returns true only for the first call.
    pub fn check_and_consume_at(&self, nonce: &Nonce, now_ms: u64) -> bool {
        self.consume(*nonce.as_bytes(), now_ms, now_ms)
    }

    /// Consume `nonce` within `scope`, typically the signer's identity.
    ///
    /// The entry is kept for the window or until `retain_until_ms`,
    /// whichever is later. Callers pass the last instant at which the
    /// message carrying the nonce could still be accepted.
    pub fn check_and_consume_scoped(
        &self,
        scope: &[u8],
        nonce: &Nonce,
        now_ms: u64,
        retain_until_ms: u64,
    ) -> bool {
        let key = Hash256::domain_hash(
            &build_domain_label(purposes::REPLAY_SCOPE, scope),
            &[nonce.as_bytes()],
        );
        self.consume(key.to_bytes(), now_ms, retain_until_ms)
    }

    fn consume(&self, key: [u8; 32], now_ms: u64, retain_until_ms: u64) -> bool {
        let expires_ms = now_ms
            .saturating_add(self.config.window_ms)
            .max(retain_until_ms);
        let mut registry = self.registry.lock();
        if !registry.insert(key, expires_ms) {
            debug!(key = %hex::encode(&key[..8]), "Replayed nonce rejected");
            return false;
        }

        if registry.seen.len() > self.config.max_entries {
            let expired = registry.prune_expired(now_ms);
            let evicted = registry.evict_oldest(self.config.max_entries);
            if evicted > 0 {
                warn!(
                    expired,
                    evicted,
                    ceiling = self.config.max_entries,
                    "Nonce registry over ceiling, evicted live entries"
                );
            } else {
                debug!(expired, "Nonce registry swept");
            }
        }
        true
    }

    /// Parse and consume a wire-format nonce. Malformed input is rejected.
    pub fn check_and_consume_hex(&self, nonce_hex: &str, now_ms: u64) -> bool {
        self.try_check_and_consume_hex(nonce_hex, now_ms)
            .unwrap_or(false)
    }

    /// Like [`check_and_consume_hex`](Self::check_and_consume_hex) but
    /// reports malformed input as an error instead of `false`.
    pub fn try_check_and_consume_hex(&self, nonce_hex: &str, now_ms: u64) -> Result<bool> {
        let nonce = Nonce::from_hex(nonce_hex)?;
        Ok(self.check_and_consume_at(&nonce, now_ms))
    }

    /// Remove entries whose retention has ended. Returns how many were removed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        self.registry.lock().prune_expired(now_ms)
    }

    /// Number of tracked nonces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().seen.len()
    }

    /// Whether no nonces are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
