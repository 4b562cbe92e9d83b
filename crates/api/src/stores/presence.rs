//! Presence tracking: the set of identities currently signed in.
//!
//! Best-effort. Members carry no TTL, so a session that ends without a logout
//! stays listed until the identity logs out or is removed by hand.

use std::sync::Arc;

use crate::ephemeral::{EphemeralStore, StoreResult};

pub const PRESENCE_KEY: &str = "online_users";

#[derive(Clone)]
pub struct PresenceTracker {
    store: Arc<dyn EphemeralStore>,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    pub async fn mark_online(&self, identity: &str) -> StoreResult<()> {
        self.store.add_to_set(PRESENCE_KEY, identity).await
    }

    pub async fn mark_offline(&self, identity: &str) -> StoreResult<()> {
        self.store.remove_from_set(PRESENCE_KEY, identity).await
    }

    pub async fn online_count(&self) -> StoreResult<u64> {
        self.store.set_cardinality(PRESENCE_KEY).await
    }

    /// Online identities, sorted.
    pub async fn online_members(&self) -> StoreResult<Vec<String>> {
        let mut members = self.store.set_members(PRESENCE_KEY).await?;
        members.sort();
        Ok(members)
    }
}
