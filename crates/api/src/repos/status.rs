//! Database reachability probe.

use std::time::{Duration, Instant};

use anyhow::{Result, ensure};
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusRepo: Send + Sync {
    /// Round-trip a trivial query against `posts`, returning the latency.
    async fn probe(&self) -> Result<Duration>;
}

#[derive(Clone)]
pub struct PgStatusRepo {
    pool: Pool<Postgres>,
}

impl PgStatusRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusRepo for PgStatusRepo {
    async fn probe(&self) -> Result<Duration> {
        let started = Instant::now();
        let found: bool = sqlx::query_scalar("SELECT to_regclass('public.posts') IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;
        ensure!(found, "posts table is missing");
        Ok(started.elapsed())
    }
}
