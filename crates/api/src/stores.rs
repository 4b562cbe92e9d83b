//! Ephemeral stores (Redis).
//!
//! Typed components over the [`EphemeralStore`](crate::ephemeral::EphemeralStore).
//! Each owns one key pattern and one consistency contract.
//!
//! ## Stores
//!
//! - **views** - Write-back view counter, flushed by the reconciler
//! - **revocation** - Denylist of logged-out tokens, TTL = remaining token lifetime
//! - **presence** - Set of signed-in identities (no TTL, best-effort)
//! - **verification** - Email verification codes (10 min TTL)
//! - **recommendations** - Cached road recommendations (15 min TTL)
//!
//! ## Redis Key Patterns
//!
//! ```text
//! post_views:{post_id}                 → pending view delta (no TTL)
//! blacklist:{sha256(token)}            → "1" (TTL = token exp - now)
//! online_users                         → set of emails (no TTL)
//! verify:{signup|reset}:{email}        → sha256(code) (10 min)
//! verified:{email}                     → "true" (30 min)
//! recommendations:{email}:{region}     → ranked roads JSON (15 min)
//! ```
//!
//! ## Usage in Handlers
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     state.stores.views.record_view(post_id).await;
//!     let online = state.stores.presence.online_count().await?;
//! }
//! ```

mod presence;
mod recommendations;
mod revocation;
mod verification;
mod views;

pub use presence::{PRESENCE_KEY, PresenceTracker};
pub use recommendations::{RECOMMENDATION_TTL, RecommendationCache};
pub use revocation::{
    REVOCATION_KEY_PREFIX, RevocationPolicy, TokenRevocationRegistry, remaining_validity,
};
pub use verification::{CODE_TTL, CodePurpose, VERIFIED_TTL, VerificationStore};
pub use views::{VIEW_KEY_PREFIX, ViewCounterCache};

use std::sync::Arc;

use crate::ephemeral::EphemeralStore;

/// Collection of all ephemeral stores, sharing one backing store.
#[derive(Clone)]
pub struct Stores {
    pub views: ViewCounterCache,
    pub revocation: TokenRevocationRegistry,
    pub presence: PresenceTracker,
    pub verification: VerificationStore,
    pub recommendations: RecommendationCache,
}

impl Stores {
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self {
            views: ViewCounterCache::new(store.clone()),
            revocation: TokenRevocationRegistry::new(store.clone()),
            presence: PresenceTracker::new(store.clone()),
            verification: VerificationStore::new(store.clone()),
            recommendations: RecommendationCache::new(store),
        }
    }
}
