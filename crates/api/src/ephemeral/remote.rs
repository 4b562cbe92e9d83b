//! Redis implementation of EphemeralStore.
//!
//! All operations share one [`ConnectionManager`], opened on first use. It
//! multiplexes commands over a single connection and reconnects by itself
//! after the connection drops.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError, RedisResult, aio::ConnectionManager};
use tokio::sync::OnceCell;

use super::{EphemeralStore, StoreError, StoreResult, validate_ttl};

/// Keys examined per SCAN round trip.
const SCAN_BATCH: usize = 100;

/// DECRBY then DEL when the counter drops to zero or below, in one step so an
/// INCR landing between the two is never lost.
const DECREMENT_OR_DELETE: &str = r#"
local remaining = redis.call('DECRBY', KEYS[1], ARGV[1])
if remaining <= 0 then
    redis.call('DEL', KEYS[1])
end
return remaining
"#;

/// Redis implementation of EphemeralStore.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
    op_timeout: Duration,
}

/// Only a failure to reach Redis is `Unavailable`. An error reply (WRONGTYPE,
/// overflow, script error) means Redis is up and refused this one command.
fn classify(op: &'static str, e: RedisError) -> StoreError {
    let unreachable = e.is_io_error()
        || e.is_timeout()
        || e.is_connection_dropped()
        || e.is_connection_refusal()
        || e.kind() == redis::ErrorKind::BusyLoadingError;

    if unreachable {
        StoreError::unavailable(op, e)
    } else {
        StoreError::Rejected {
            op,
            reason: e.to_string(),
        }
    }
}

impl RedisStore {
    pub fn new(client: redis::Client, op_timeout: Duration) -> Self {
        Self {
            client,
            conn: Arc::new(OnceCell::new()),
            op_timeout,
        }
    }

    /// The shared connection. A failed first connect leaves the cell empty,
    /// so the next call tries again.
    async fn connection(&self) -> RedisResult<ConnectionManager> {
        self.conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .cloned()
    }

    /// Run one round trip (connect included) under the operation timeout.
    async fn timed<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = RedisResult<T>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(op, e)),
            Err(_) => Err(StoreError::unavailable(
                op,
                format!("timed out after {:?}", self.op_timeout),
            )),
        }
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn ping(&self) -> StoreResult<bool> {
        let result: String = self
            .timed("ping", async {
                let mut conn = self.connection().await?;
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;
        Ok(result == "PONG")
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        validate_ttl(ttl)?;
        // PX keeps sub-second precision; the TTL is never rounded down.
        let millis = ttl.as_millis().max(1) as u64;

        self.timed("set", async {
            let mut conn = self.connection().await?;
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(millis)
                .query_async::<()>(&mut conn)
                .await
        })
        .await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.timed("get", async {
            let mut conn = self.connection().await?;
            conn.get(key).await
        })
        .await
    }

    async fn increment(&self, key: &str, by: u64) -> StoreResult<u64> {
        let by = i64::try_from(by).map_err(|_| StoreError::Malformed {
            key: key.to_string(),
            value: by.to_string(),
        })?;

        // INCRBY refuses to go past i64::MAX; that surfaces as Rejected
        let count: i64 = self
            .timed("incrby", async {
                let mut conn = self.connection().await?;
                conn.incr(key, by).await
            })
            .await?;

        u64::try_from(count).map_err(|_| StoreError::Malformed {
            key: key.to_string(),
            value: count.to_string(),
        })
    }

    async fn decrement_or_delete(&self, key: &str, by: u64) -> StoreResult<i64> {
        let by = i64::try_from(by).map_err(|_| StoreError::Malformed {
            key: key.to_string(),
            value: by.to_string(),
        })?;

        self.timed("decrby", async {
            let mut conn = self.connection().await?;
            redis::Script::new(DECREMENT_OR_DELETE)
                .key(key)
                .arg(by)
                .invoke_async(&mut conn)
                .await
        })
        .await
    }

    async fn add_to_set(&self, set: &str, member: &str) -> StoreResult<()> {
        self.timed("sadd", async {
            let mut conn = self.connection().await?;
            let _: () = conn.sadd(set, member).await?;
            Ok::<_, RedisError>(())
        })
        .await
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> StoreResult<()> {
        self.timed("srem", async {
            let mut conn = self.connection().await?;
            let _: () = conn.srem(set, member).await?;
            Ok::<_, RedisError>(())
        })
        .await
    }

    async fn set_cardinality(&self, set: &str) -> StoreResult<u64> {
        self.timed("scard", async {
            let mut conn = self.connection().await?;
            conn.scard(set).await
        })
        .await
    }

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        self.timed("smembers", async {
            let mut conn = self.connection().await?;
            conn.smembers(set).await
        })
        .await
    }

    /// SCAN walks the whole keyspace, not just matching keys, so a full pass
    /// takes `total keys / SCAN_BATCH` round trips. Each round trip gets its
    /// own `op_timeout`; the pass as a whole is bounded only by keyspace size.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let pattern = format!("{}*", prefix);
        let mut conn = self.timed("scan", self.connection()).await?;

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = self
                .timed(
                    "scan",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn),
                )
                .await?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once while the keyspace is rehashing
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let deleted: i64 = self
            .timed("del", async {
                let mut conn = self.connection().await?;
                conn.del(key).await
            })
            .await?;
        Ok(deleted > 0)
    }
}
