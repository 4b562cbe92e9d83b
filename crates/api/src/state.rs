use std::sync::Arc;

use crate::{
    config::Config,
    ephemeral::EphemeralStore,
    repos::Repos,
    services::{SessionService, TokenVerifier},
    stores::Stores,
};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Backing ephemeral store, for health probes.
    pub ephemeral: Arc<dyn EphemeralStore>,
    /// Database repositories.
    pub repos: Repos,
    /// Typed ephemeral stores (Redis).
    pub stores: Stores,
    /// Bearer token verifier.
    pub tokens: Arc<dyn TokenVerifier>,
    /// Login/logout side effects.
    pub session: SessionService,
}
