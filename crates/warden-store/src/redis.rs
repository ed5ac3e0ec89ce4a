use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::Client;
use tracing::debug;

use crate::StoreError;

/// Store backend over a Redis-compatible server.
///
/// Hashes hold session state (HGET/HSET/HSETNX/HINCRBY give the field-level
/// atomicity the engine relies on); tracked-message sets are sorted sets
/// scored by expiry timestamp, so ZPOPMIN doubles as an atomic
/// consume-one-member primitive.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unreachable(err.to_string())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl RedisStore {
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        debug!("redis store backend initialized");
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn get_field(&self, ns: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        let value: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(ns)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    pub async fn set_field(&self, ns: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("HSET")
            .arg(ns)
            .arg(field)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn set_field_if_absent(
        &self,
        ns: &str,
        field: &str,
        value: &[u8],
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let created: bool = redis::cmd("HSETNX")
            .arg(ns)
            .arg(field)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(created)
    }

    pub async fn delete_field(&self, ns: &str, field: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("HDEL")
            .arg(ns)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn incr_field(&self, ns: &str, field: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        let next: i64 = redis::cmd("HINCRBY")
            .arg(ns)
            .arg(field)
            .arg(1)
            .query_async(&mut conn)
            .await?;
        Ok(next)
    }

    pub async fn get_all(&self, ns: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, Vec<u8>> = redis::cmd("HGETALL")
            .arg(ns)
            .query_async(&mut conn)
            .await?;
        Ok(fields.into_iter().collect())
    }

    pub async fn delete(&self, ns: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("DEL").arg(ns).query_async(&mut conn).await?;
        Ok(())
    }

    pub async fn add_to_set(
        &self,
        ns: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let expires_at = now_ms() + ttl.as_millis() as i64;
        let _: () = redis::cmd("ZADD")
            .arg(ns)
            .arg(expires_at)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn pop_from_set(&self, ns: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn().await?;
        loop {
            // ZPOPMIN pops the member with the earliest expiry, atomically
            // across concurrent callers; a reply is [member, score].
            let popped: Vec<String> = redis::cmd("ZPOPMIN")
                .arg(ns)
                .arg(1)
                .query_async(&mut conn)
                .await?;
            let Some(member) = popped.first() else {
                return Ok(None);
            };
            let expires_at = popped
                .get(1)
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0) as i64;
            if expires_at <= now_ms() {
                continue; // expired, discard and keep popping
            }
            return Ok(Some(member.clone()));
        }
    }

    pub async fn set_len(&self, ns: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn().await?;
        let live: usize = redis::cmd("ZCOUNT")
            .arg(ns)
            .arg(now_ms())
            .arg("+inf")
            .query_async(&mut conn)
            .await?;
        Ok(live)
    }

    pub async fn expire(&self, ns: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("EXPIRE")
            .arg(ns)
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
