//! Volatile key-value store (Redis).
//!
//! Every fast, self-expiring piece of state in the service goes through the
//! [`EphemeralStore`] trait: view-count deltas, revoked tokens, the presence
//! set, verification codes and cached recommendations. The trait is the only
//! seam; components never talk to Redis directly.
//!
//! ## Backends
//!
//! - **remote** - [`RedisStore`], used in every deployed environment
//! - **memory** - [`MemoryStore`], in-process, for local development (`memory://`) and tests
//!
//! ## Failure model
//!
//! Every operation is bounded by a per-operation timeout. A timeout or a lost
//! connection surfaces as [`StoreError::Unavailable`]; components decide what
//! that means for them (drop a view, reject a request). A command the store
//! answered with an error (wrong key type, counter overflow) is
//! [`StoreError::Rejected`] and concerns that key alone.
//!
//! All operations are atomic at the single-key level.

mod memory;
mod remote;

pub use memory::MemoryStore;
pub use remote::RedisStore;

use std::{fmt::Display, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

/// URL scheme selecting the in-process backend.
pub const MEMORY_URL: &str = "memory://";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Network, connection or timeout failure talking to the store.
    #[error("ephemeral store unavailable during {op}: {reason}")]
    Unavailable { op: &'static str, reason: String },

    /// A value could not be interpreted as the type the caller expects.
    #[error("malformed value at {key}: {value:?}")]
    Malformed { key: String, value: String },

    /// The store answered, but refused the command.
    #[error("ephemeral store rejected {op}: {reason}")]
    Rejected { op: &'static str, reason: String },

    /// A negative, zero or absent expiry was supplied.
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),
}

impl StoreError {
    pub fn unavailable(op: &'static str, reason: impl Display) -> Self {
        Self::Unavailable {
            op,
            reason: reason.to_string(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Operations the service needs from a volatile key-value store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Health check - verify store connectivity.
    async fn ping(&self) -> StoreResult<bool>;

    /// Set a string value that expires after `ttl`. A zero TTL is rejected.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Get a string value, `None` if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Atomically add `by` to an integer key, creating it at 0 (no TTL) if absent.
    async fn increment(&self, key: &str, by: u64) -> StoreResult<u64>;

    /// Atomically subtract `by` and delete the key once it reaches zero or below.
    /// Returns the remainder (`<= 0` means the key is gone).
    async fn decrement_or_delete(&self, key: &str, by: u64) -> StoreResult<i64>;

    async fn add_to_set(&self, set: &str, member: &str) -> StoreResult<()>;

    async fn remove_from_set(&self, set: &str, member: &str) -> StoreResult<()>;

    async fn set_cardinality(&self, set: &str) -> StoreResult<u64>;

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>>;

    /// All live keys starting with `prefix`, without duplicates.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Delete a key (returns true if it existed).
    async fn delete(&self, key: &str) -> StoreResult<bool>;
}

/// Build the store selected by `url`: [`MEMORY_URL`] or any `redis://` URL.
pub fn open(url: &str, op_timeout: Duration) -> anyhow::Result<Arc<dyn EphemeralStore>> {
    if url == MEMORY_URL {
        tracing::warn!("using in-process ephemeral store; state is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let client = redis::Client::open(url)?;
    Ok(Arc::new(RedisStore::new(client, op_timeout)))
}

/// Reject TTLs the backends cannot represent.
pub(crate) fn validate_ttl(ttl: Duration) -> StoreResult<()> {
    if ttl.is_zero() {
        return Err(StoreError::InvalidTtl("ttl must be at least 1ms".to_string()));
    }
    Ok(())
}
