//! Email verification codes.
//!
//! Codes are hashed (SHA-256) before storage so a store dump does not leak
//! usable codes. A code is consumed on the first successful confirmation.
//! A confirmed signup email is remembered for a while so the signup form can
//! be submitted after the code step.
//!
//! No route here issues codes: signup, password reset and the mail sender
//! live in the account service, which links this crate and calls
//! [`VerificationStore`] directly.

use std::{sync::Arc, time::Duration};

use sha2::{Digest, Sha256};

use crate::ephemeral::{EphemeralStore, StoreResult};

/// Lifetime of an issued code.
pub const CODE_TTL: Duration = Duration::from_secs(10 * 60);

/// How long a confirmed email stays eligible for signup.
pub const VERIFIED_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    Signup,
    PasswordReset,
}

impl CodePurpose {
    fn as_str(self) -> &'static str {
        match self {
            CodePurpose::Signup => "signup",
            CodePurpose::PasswordReset => "reset",
        }
    }
}

fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct VerificationStore {
    store: Arc<dyn EphemeralStore>,
}

impl VerificationStore {
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    fn code_key(purpose: CodePurpose, email: &str) -> String {
        format!("verify:{}:{}", purpose.as_str(), email)
    }

    fn verified_key(email: &str) -> String {
        format!("verified:{}", email)
    }

    /// Store a freshly generated code, replacing any earlier one for the email.
    pub async fn issue(&self, purpose: CodePurpose, email: &str, code: &str) -> StoreResult<()> {
        self.store
            .set_with_ttl(&Self::code_key(purpose, email), &hash_code(code), CODE_TTL)
            .await
    }

    /// Check a submitted code. A match consumes it.
    pub async fn confirm(
        &self,
        purpose: CodePurpose,
        email: &str,
        code: &str,
    ) -> StoreResult<bool> {
        let key = Self::code_key(purpose, email);

        let Some(stored) = self.store.get(&key).await? else {
            return Ok(false);
        };

        if stored != hash_code(code) {
            return Ok(false);
        }

        self.store.delete(&key).await?;
        Ok(true)
    }

    pub async fn mark_verified(&self, email: &str) -> StoreResult<()> {
        self.store
            .set_with_ttl(&Self::verified_key(email), "true", VERIFIED_TTL)
            .await
    }

    pub async fn is_verified(&self, email: &str) -> StoreResult<bool> {
        Ok(self.store.get(&Self::verified_key(email)).await?.is_some())
    }
}
