//! Login/logout side effects on the ephemeral stores.
//!
//! Logout touches two stores without a transaction. The revocation write
//! comes first and must succeed; the presence update after it is allowed to
//! fail. A failure in between leaves the identity listed as online with a
//! revoked token, which only skews the online count until the next logout.

use chrono::{DateTime, Utc};

use crate::{
    ephemeral::StoreError,
    models::{RevocationEntry, TokenFingerprint},
    stores::{PresenceTracker, TokenRevocationRegistry},
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not revoke token: {0}")]
    Revocation(#[source] StoreError),
}

#[derive(Clone)]
pub struct SessionService {
    revocation: TokenRevocationRegistry,
    presence: PresenceTracker,
}

impl SessionService {
    pub fn new(revocation: TokenRevocationRegistry, presence: PresenceTracker) -> Self {
        Self {
            revocation,
            presence,
        }
    }

    /// Record a successful login.
    ///
    /// Called by the password login flow once it has issued a token; that
    /// flow is not served from here. Authenticated requests refresh the same
    /// entry through [`touch`](Self::touch).
    pub async fn login(&self, identity: &str) {
        self.touch(identity).await;
    }

    /// Keep `identity` in the presence set. Called on every authenticated
    /// request; failures are logged and ignored.
    pub async fn touch(&self, identity: &str) {
        if let Err(e) = self.presence.mark_online(identity).await {
            tracing::warn!(identity = %identity, error = %e, "presence update dropped");
        }
    }

    /// Revoke the presented token until its own expiry, then mark the
    /// identity offline.
    pub async fn logout(
        &self,
        fingerprint: &TokenFingerprint,
        identity: &str,
        expires_at: i64,
        now: DateTime<Utc>,
    ) -> Result<RevocationEntry, SessionError> {
        let entry = self
            .revocation
            .revoke_until(fingerprint, Some(expires_at), now)
            .await
            .map_err(SessionError::Revocation)?;

        if let Err(e) = self.presence.mark_offline(identity).await {
            tracing::warn!(
                identity = %identity,
                error = %e,
                "token revoked but identity still listed online"
            );
        }

        tracing::info!(identity = %identity, "logged out");
        Ok(entry)
    }
}
