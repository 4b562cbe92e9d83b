use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{reconcile::DEFAULT_INTERVAL, stores::RevocationPolicy};

/// Service configuration, read from `ONGIL_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// `redis://...`, or `memory://` for an in-process store (local development)
    pub redis_url: String,
    /// HS256 secret shared with the login flow that issues access tokens
    pub jwt_secret: String,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    /// Upper bound on a single ephemeral store operation
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Upper bound on a single durable increment during reconciliation
    #[serde(default = "default_durable_timeout_ms")]
    pub durable_timeout_ms: u64,
    /// Answer of a revocation check when the ephemeral store is unreachable
    #[serde(default)]
    pub revocation_policy: RevocationPolicy,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

fn default_reconcile_interval_secs() -> u64 {
    DEFAULT_INTERVAL.as_secs()
}

fn default_store_timeout_ms() -> u64 {
    500
}

fn default_durable_timeout_ms() -> u64 {
    5_000
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn reconcile_interval(&self) -> Duration {
        if self.reconcile_interval_secs == 0 {
            tracing::warn!(
                default_secs = DEFAULT_INTERVAL.as_secs(),
                "reconcile interval of 0 is not allowed, using default"
            );
            return DEFAULT_INTERVAL;
        }
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn durable_timeout(&self) -> Duration {
        Duration::from_millis(self.durable_timeout_ms)
    }
}
