//! Durable view counts for PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::models::EntityId;

/// A durable increment that did not commit. The pending delta must stay in
/// the ephemeral store so the next cycle can retry it.
#[derive(Debug, thiserror::Error)]
#[error("durable write for post {entity_id} failed: {reason}")]
pub struct DurableWriteFailed {
    pub entity_id: EntityId,
    pub reason: String,
}

/// Repository for the `posts.views` column.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ViewCountRepo: Send + Sync {
    /// Committed view count of a post, `None` if the post does not exist.
    async fn views(&self, id: EntityId) -> Result<Option<u64>>;

    /// Add `delta` to the committed count in one atomic statement.
    ///
    /// Returns `false` when no row matched (the post was deleted).
    async fn increment_views(&self, id: EntityId, delta: u64)
    -> Result<bool, DurableWriteFailed>;
}

/// PostgreSQL implementation of ViewCountRepo.
#[derive(Clone)]
pub struct PgViewCountRepo {
    pool: Pool<Postgres>,
}

impl PgViewCountRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ViewCountRepo for PgViewCountRepo {
    async fn views(&self, id: EntityId) -> Result<Option<u64>> {
        let views: Option<i64> = sqlx::query_scalar("SELECT views FROM posts WHERE post_id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(views.map(|v| v.max(0) as u64))
    }

    async fn increment_views(
        &self,
        id: EntityId,
        delta: u64,
    ) -> Result<bool, DurableWriteFailed> {
        let delta = i64::try_from(delta).map_err(|_| DurableWriteFailed {
            entity_id: id,
            reason: format!("delta {} exceeds column range", delta),
        })?;

        let result = sqlx::query("UPDATE posts SET views = views + $1 WHERE post_id = $2")
            .bind(delta)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| DurableWriteFailed {
                entity_id: id,
                reason: e.to_string(),
            })?;

        Ok(result.rows_affected() > 0)
    }
}
