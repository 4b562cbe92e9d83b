//! Short-lived cache of road-icing recommendations.
//!
//! Scoring runs in an external model; its ranked output is cached per
//! identity and region so the map view can be reloaded without rescoring.
//! The recommendation endpoint that calls the model owns this cache; this
//! service exposes no route for it.

use std::{sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};

use crate::ephemeral::{EphemeralStore, StoreError, StoreResult};

pub const RECOMMENDATION_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Clone)]
pub struct RecommendationCache {
    store: Arc<dyn EphemeralStore>,
}

impl RecommendationCache {
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    fn recommendation_key(identity: &str, region: &str) -> String {
        format!("recommendations:{}:{}", identity, region)
    }

    pub async fn put<T: Serialize>(
        &self,
        identity: &str,
        region: &str,
        value: &T,
    ) -> StoreResult<()> {
        let key = Self::recommendation_key(identity, region);
        let json = serde_json::to_string(value).map_err(|e| StoreError::Malformed {
            key: key.clone(),
            value: e.to_string(),
        })?;

        self.store.set_with_ttl(&key, &json, RECOMMENDATION_TTL).await
    }

    /// Cached result, `None` on a miss. An entry that no longer decodes is
    /// treated as a miss so the caller rescores.
    pub async fn get<T: DeserializeOwned>(
        &self,
        identity: &str,
        region: &str,
    ) -> StoreResult<Option<T>> {
        let key = Self::recommendation_key(identity, region);

        let Some(json) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding undecodable recommendation");
                Ok(None)
            }
        }
    }
}
