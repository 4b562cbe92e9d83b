use std::{fmt, num::ParseIntError, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier of a durable entity with a view counter (a board post).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(EntityId)
    }
}

/// Views accumulated in the ephemeral store and not yet flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDelta {
    pub entity_id: EntityId,
    pub delta: u64,
}

/// SHA-256 hex digest of a bearer token. Raw tokens are never written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenFingerprint(String);

impl TokenFingerprint {
    pub fn of(token: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A revoked token, denied until the token itself would have expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    pub fingerprint: TokenFingerprint,
    pub expires_at: DateTime<Utc>,
}

/// Claims carried by access tokens issued by the login flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity (email address).
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default)]
    pub admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_sha256_hex() {
        let fp = TokenFingerprint::of("abc");

        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fp, TokenFingerprint::of("abc"));
        assert_ne!(fp, TokenFingerprint::of("abd"));
    }

    #[test]
    fn entity_id_parses_from_key_suffix() {
        assert_eq!("42".parse::<EntityId>().unwrap(), EntityId(42));
        assert!("forty-two".parse::<EntityId>().is_err());
    }

    #[test]
    fn claims_admin_defaults_to_false() {
        let claims: Claims =
            serde_json::from_str(r#"{"sub":"a@ongil.kr","exp":1700000000}"#).unwrap();

        assert!(!claims.admin);
    }
}
