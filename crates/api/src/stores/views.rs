//! Write-back cache for post view counts.
//!
//! Request handlers only ever increment `post_views:{id}`; the durable
//! `posts.views` column is brought up to date by the reconciler. Reads merge
//! the two: `durable baseline + pending delta`.

use std::sync::Arc;

use crate::{
    ephemeral::{EphemeralStore, StoreError, StoreResult},
    models::{CounterDelta, EntityId},
};

pub const VIEW_KEY_PREFIX: &str = "post_views:";

/// Pending view increments per entity.
#[derive(Clone)]
pub struct ViewCounterCache {
    store: Arc<dyn EphemeralStore>,
}

impl ViewCounterCache {
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    fn view_key(id: EntityId) -> String {
        format!("{}{}", VIEW_KEY_PREFIX, id)
    }

    /// Record one view, returning the pending delta after the increment.
    pub async fn try_record_view(&self, id: EntityId) -> StoreResult<u64> {
        self.store.increment(&Self::view_key(id), 1).await
    }

    /// Record one view. A lost view is tolerable; a failed request is not.
    pub async fn record_view(&self, id: EntityId) {
        if let Err(e) = self.try_record_view(id).await {
            tracing::warn!(entity_id = %id, error = %e, "view increment dropped");
        }
    }

    /// Views recorded since the last flush (0 when none).
    pub async fn pending(&self, id: EntityId) -> StoreResult<u64> {
        let key = Self::view_key(id);
        match self.store.get(&key).await? {
            None => Ok(0),
            Some(value) => value
                .parse()
                .map_err(|_| StoreError::Malformed { key, value }),
        }
    }

    /// `baseline + pending`, falling back to the baseline alone when the
    /// pending delta cannot be read.
    pub async fn read_effective_count(&self, id: EntityId, baseline: u64) -> u64 {
        match self.pending(id).await {
            Ok(pending) => baseline.saturating_add(pending),
            Err(e) => {
                tracing::warn!(
                    entity_id = %id,
                    error = %e,
                    "serving view count without pending delta"
                );
                baseline
            }
        }
    }

    /// Snapshot every pending delta. Keys are left in place; the caller
    /// clears each one with [`settle`](Self::settle) after a durable write.
    ///
    /// Fails only if the store is unavailable. A key that is not a counter
    /// is logged and left out of the snapshot.
    pub async fn drain_all(&self) -> StoreResult<Vec<CounterDelta>> {
        let keys = self.store.scan_prefix(VIEW_KEY_PREFIX).await?;
        let mut deltas = Vec::with_capacity(keys.len());

        for key in keys {
            let Some(entity_id) = key
                .strip_prefix(VIEW_KEY_PREFIX)
                .and_then(|id| id.parse::<EntityId>().ok())
            else {
                tracing::warn!(key = %key, "skipping view key with unparseable entity id");
                continue;
            };

            let value = match self.store.get(&key).await {
                Ok(Some(value)) => value,
                // Cleared between SCAN and GET
                Ok(None) => continue,
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable view key");
                    continue;
                }
            };

            match value.parse::<u64>() {
                Ok(delta) => deltas.push(CounterDelta { entity_id, delta }),
                Err(_) => {
                    tracing::warn!(key = %key, value = %value, "skipping malformed view delta");
                }
            }
        }

        Ok(deltas)
    }

    /// Remove a flushed delta. Views recorded after the snapshot stay pending;
    /// the key disappears once nothing is left. Returns the remainder.
    pub async fn settle(&self, delta: &CounterDelta) -> StoreResult<u64> {
        let remaining = self
            .store
            .decrement_or_delete(&Self::view_key(delta.entity_id), delta.delta)
            .await?;
        Ok(remaining.max(0) as u64)
    }
}
