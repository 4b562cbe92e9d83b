//! Shared test utilities for API handler tests.
//!
//! Provides common fixtures and a flexible `TestStateBuilder` for constructing
//! `AppState` instances with only the mocks needed for each test. Stores are
//! backed by a fresh `MemoryStore` unless one is supplied.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStateBuilder, mock_auth_user};
//!
//! let mut view_repo = MockViewCountRepo::new();
//! view_repo.expect_views().returning(|_| Ok(Some(100)));
//!
//! let state = TestStateBuilder::new()
//!     .with_view_repo(view_repo)
//!     .build();
//! ```

use std::sync::Arc;

use chrono::Utc;

use crate::config::Config;
use crate::ephemeral::{EphemeralStore, MemoryStore};
use crate::middleware::auth::AuthUser;
use crate::models::{Claims, TokenFingerprint};
use crate::repos::{MockStatusRepo, MockViewCountRepo, Repos};
use crate::services::{MockTokenVerifier, SessionService};
use crate::state::AppState;
use crate::stores::{RevocationPolicy, Stores};

/// Bearer token accepted by [`accepting_verifier`].
pub const TEST_TOKEN: &str = "test-token";

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        database_url: "postgres://test".to_string(),
        redis_url: "memory://".to_string(),
        jwt_secret: "test".to_string(),
        reconcile_interval_secs: 600,
        store_timeout_ms: 500,
        durable_timeout_ms: 5_000,
        revocation_policy: RevocationPolicy::FailClosed,
        env: "test".to_string(),
        sentry_dsn: None,
    }
}

/// Creates an authenticated user whose token expires in an hour.
pub fn mock_auth_user(email: &str, admin: bool) -> AuthUser {
    AuthUser {
        email: email.to_string(),
        admin,
        expires_at: Utc::now().timestamp() + 3600,
        fingerprint: TokenFingerprint::of(TEST_TOKEN),
    }
}

/// A verifier that accepts [`TEST_TOKEN`] for `email` and rejects anything else.
pub fn accepting_verifier(email: &str, admin: bool) -> MockTokenVerifier {
    let claims = Claims {
        sub: email.to_string(),
        exp: Utc::now().timestamp() + 3600,
        admin,
    };

    let mut verifier = MockTokenVerifier::new();
    verifier.expect_verify().returning(move |token| {
        if token == TEST_TOKEN {
            Ok(claims.clone())
        } else {
            Err(crate::services::TokenError::Invalid("unknown test token".into()))
        }
    });
    verifier
}

/// Builder for constructing test `AppState` with custom mocks.
///
/// Uses default (empty) mocks for any repo/service not explicitly set.
/// This allows tests to only configure the mocks they actually need.
pub struct TestStateBuilder {
    store: Option<Arc<dyn EphemeralStore>>,
    view_repo: Option<MockViewCountRepo>,
    status_repo: Option<MockStatusRepo>,
    token_verifier: Option<MockTokenVerifier>,
    revocation_policy: RevocationPolicy,
}

impl TestStateBuilder {
    /// Creates a new builder with no mocks configured.
    pub fn new() -> Self {
        Self {
            store: None,
            view_repo: None,
            status_repo: None,
            token_verifier: None,
            revocation_policy: RevocationPolicy::FailClosed,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn EphemeralStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_view_repo(mut self, repo: MockViewCountRepo) -> Self {
        self.view_repo = Some(repo);
        self
    }

    pub fn with_status_repo(mut self, repo: MockStatusRepo) -> Self {
        self.status_repo = Some(repo);
        self
    }

    pub fn with_token_verifier(mut self, verifier: MockTokenVerifier) -> Self {
        self.token_verifier = Some(verifier);
        self
    }

    pub fn with_revocation_policy(mut self, policy: RevocationPolicy) -> Self {
        self.revocation_policy = policy;
        self
    }

    /// Builds the `AppState` using configured mocks or defaults.
    pub fn build(self) -> AppState {
        let ephemeral = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn EphemeralStore>);

        let repos = Repos {
            views: Arc::new(self.view_repo.unwrap_or_else(MockViewCountRepo::new)),
            status: Arc::new(self.status_repo.unwrap_or_else(MockStatusRepo::new)),
        };

        let stores = Stores::new(ephemeral.clone());
        let session = SessionService::new(stores.revocation.clone(), stores.presence.clone());

        let tokens = Arc::new(self.token_verifier.unwrap_or_else(MockTokenVerifier::new))
            as Arc<dyn crate::services::TokenVerifier>;

        let mut config = test_config();
        config.revocation_policy = self.revocation_policy;

        AppState {
            config,
            ephemeral,
            repos,
            stores,
            tokens,
            session,
        }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
