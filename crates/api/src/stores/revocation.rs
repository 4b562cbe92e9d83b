//! Token revocation registry (denylist).
//!
//! A revoked token is recorded under `blacklist:{fingerprint}` with a TTL equal
//! to the token's remaining validity, so the entry lives exactly as long as
//! the token could still be presented. An entry that expired earlier than the
//! token would let a logged-out token back in.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ephemeral::{EphemeralStore, StoreError, StoreResult},
    models::{RevocationEntry, TokenFingerprint},
};

pub const REVOCATION_KEY_PREFIX: &str = "blacklist:";

const SENTINEL: &str = "1";

/// Shortest TTL written. A token with no validity left is still recorded so
/// that a check immediately after logout reads as revoked.
const MIN_TTL: Duration = Duration::from_secs(1);

/// What a revocation check answers when the store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevocationPolicy {
    /// Reject the request with a retryable error.
    #[default]
    FailClosed,
    /// Treat the token as not revoked and log a warning.
    FailOpen,
}

/// Seconds of validity left on a token expiring at `expires_at`, never negative.
pub fn remaining_validity(expires_at: i64, now: DateTime<Utc>) -> i64 {
    (expires_at - now.timestamp()).max(0)
}

#[derive(Clone)]
pub struct TokenRevocationRegistry {
    store: Arc<dyn EphemeralStore>,
}

impl TokenRevocationRegistry {
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    fn revocation_key(fingerprint: &TokenFingerprint) -> String {
        format!("{}{}", REVOCATION_KEY_PREFIX, fingerprint)
    }

    /// Deny `fingerprint` for the next `remaining_secs` seconds.
    pub async fn revoke(
        &self,
        fingerprint: &TokenFingerprint,
        remaining_secs: i64,
    ) -> StoreResult<()> {
        let secs = u64::try_from(remaining_secs).map_err(|_| {
            StoreError::InvalidTtl(format!("negative remaining validity: {}s", remaining_secs))
        })?;
        let ttl = Duration::from_secs(secs).max(MIN_TTL);

        self.store
            .set_with_ttl(&Self::revocation_key(fingerprint), SENTINEL, ttl)
            .await?;

        tracing::info!(fingerprint = %fingerprint, ttl_secs = ttl.as_secs(), "token revoked");
        Ok(())
    }

    /// Deny a token until its own expiry. `expires_at` is the token's `exp`
    /// claim; a token without one cannot be given a safe TTL.
    pub async fn revoke_until(
        &self,
        fingerprint: &TokenFingerprint,
        expires_at: Option<i64>,
        now: DateTime<Utc>,
    ) -> StoreResult<RevocationEntry> {
        let expires_at = expires_at
            .ok_or_else(|| StoreError::InvalidTtl("token has no expiry".to_string()))?;
        let expiry = Utc.timestamp_opt(expires_at, 0).single().ok_or_else(|| {
            StoreError::InvalidTtl(format!("expiry out of range: {}", expires_at))
        })?;

        self.revoke(fingerprint, remaining_validity(expires_at, now))
            .await?;

        Ok(RevocationEntry {
            fingerprint: fingerprint.clone(),
            expires_at: expiry,
        })
    }

    pub async fn is_revoked(&self, fingerprint: &TokenFingerprint) -> StoreResult<bool> {
        let value = self.store.get(&Self::revocation_key(fingerprint)).await?;
        Ok(value.is_some())
    }

    /// Revocation check with `policy` applied to an unreachable store.
    pub async fn check(
        &self,
        fingerprint: &TokenFingerprint,
        policy: RevocationPolicy,
    ) -> StoreResult<bool> {
        match self.is_revoked(fingerprint).await {
            Err(e) if e.is_unavailable() && policy == RevocationPolicy::FailOpen => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    error = %e,
                    "revocation check skipped (fail-open)"
                );
                Ok(false)
            }
            other => other,
        }
    }
}
