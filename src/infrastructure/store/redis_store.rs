//! Redis-backed store implementation.

use super::service::{KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, info};

const INCREMENT_WINDOW: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
";

const ACQUIRE_SLOT: &str = r"
local count = redis.call('INCR', KEYS[1])
redis.call('PEXPIRE', KEYS[1], ARGV[2])
if count > tonumber(ARGV[1]) then
  redis.call('DECR', KEYS[1])
  return 0
end
return 1
";

const RELEASE_SLOT: &str = r"
local count = redis.call('DECR', KEYS[1])
if count <= 0 then
  redis.call('DEL', KEYS[1])
end
return count
";

const DELETE_IF_EQUALS: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
";

/// Redis store shared by every process instance.
///
/// Uses connection pooling via `ConnectionManager` for efficient connection reuse.
/// Compound operations run as Lua scripts so they are atomic at the server.
pub struct RedisStore {
    client: ConnectionManager,
    key_prefix: String,
    increment_window: Script,
    acquire_slot: Script,
    release_slot: Script,
    delete_if_equals: Script,
}

impl RedisStore {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Arguments
    ///
    /// - `redis_url` - Redis connection string (e.g., `"redis://localhost:6379"`)
    /// - `key_prefix` - Namespace prepended to every key (e.g., `"cep:"`)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionError`] if the URL is invalid, the connection cannot
    /// be established, or the PING health check fails.
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> StoreResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(redis_url).map_err(|e| {
            StoreError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| StoreError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis");

        Ok(Self {
            client: manager,
            key_prefix: key_prefix.into(),
            increment_window: Script::new(INCREMENT_WINDOW),
            acquire_slot: Script::new(ACQUIRE_SLOT),
            release_slot: Script::new(RELEASE_SLOT),
            delete_if_equals: Script::new(DELETE_IF_EQUALS),
        })
    }

    /// Constructs the full Redis key with namespace prefix.
    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

fn millis(duration: Duration) -> u64 {
    (duration.as_millis() as u64).max(1)
}

fn op_error(op: &str, key: &str, e: redis::RedisError) -> StoreError {
    StoreError::OperationError(format!("Redis {} failed for {}: {}", op, key, e))
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = self.build_key(key);
        let mut conn = self.client.clone();

        conn.get::<_, Option<String>>(&key)
            .await
            .map_err(|e| op_error("GET", &key, e))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let key = self.build_key(key);
        let mut conn = self.client.clone();

        conn.pset_ex::<_, _, ()>(&key, value, millis(ttl))
            .await
            .map_err(|e| op_error("SET", &key, e))?;

        debug!("Store SET: {} (TTL: {}ms)", key, millis(ttl));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let key = self.build_key(key);
        let mut conn = self.client.clone();

        let reply = redis::cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| op_error("SET NX", &key, e))?;

        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let key = self.build_key(key);
        let mut conn = self.client.clone();

        let deleted = self
            .delete_if_equals
            .key(&key)
            .arg(expected)
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(|e| op_error("compare-and-delete", &key, e))?;

        Ok(deleted > 0)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let key = self.build_key(key);
        let mut conn = self.client.clone();

        conn.del::<_, i64>(&key)
            .await
            .map_err(|e| op_error("DEL", &key, e))?;

        Ok(())
    }

    async fn increment_window(&self, key: &str, window: Duration) -> StoreResult<u64> {
        let key = self.build_key(key);
        let mut conn = self.client.clone();

        let count = self
            .increment_window
            .key(&key)
            .arg(millis(window))
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(|e| op_error("INCR window", &key, e))?;

        Ok(count.max(0) as u64)
    }

    async fn acquire_slot(&self, key: &str, max: u64, ttl: Duration) -> StoreResult<bool> {
        let key = self.build_key(key);
        let mut conn = self.client.clone();

        let admitted = self
            .acquire_slot
            .key(&key)
            .arg(max)
            .arg(millis(ttl))
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(|e| op_error("acquire slot", &key, e))?;

        Ok(admitted == 1)
    }

    async fn release_slot(&self, key: &str) -> StoreResult<()> {
        let key = self.build_key(key);
        let mut conn = self.client.clone();

        self.release_slot
            .key(&key)
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(|e| op_error("release slot", &key, e))?;

        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
