//! Shared counters in Redis.
//!
//! Each hit runs one Lua script, so `INCR` and the expiry are applied
//! atomically on the server no matter how many API instances race on the
//! same identity. Keys expire on their own when the window closes.

use std::time::Duration;

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    Client, Script,
};

use super::{CounterStore, Hit, LimiterError};

const HIT_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if current == 1 or ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {current, ttl}
"#;

pub struct RedisCounterStore {
    connection: ConnectionManager,
    key_prefix: String,
    script: Script,
}

impl RedisCounterStore {
    /// Connect eagerly so a bad URL or unreachable server fails startup.
    pub async fn connect(redis_url: &str, key_prefix: &str) -> Result<Self, LimiterError> {
        let config = ConnectionManagerConfig::new().set_number_of_retries(1);

        let client = Client::open(redis_url).map_err(unavailable)?;
        let connection = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(unavailable)?;

        tracing::info!(key_prefix = %key_prefix, "Connected to Redis counter store");

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
            script: Script::new(HIT_SCRIPT),
        })
    }

    fn key(&self, identity: &str) -> String {
        format!("{}{}", self.key_prefix, identity)
    }
}

fn unavailable(e: redis::RedisError) -> LimiterError {
    LimiterError::Unavailable(Box::new(e))
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn hit(&self, identity: &str, window: Duration) -> Result<Hit, LimiterError> {
        let mut connection = self.connection.clone();
        let window_ms = window.as_millis() as u64;

        let (count, ttl_ms): (i64, i64) = self
            .script
            .key(self.key(identity))
            .arg(window_ms)
            .invoke_async(&mut connection)
            .await
            .map_err(unavailable)?;

        if count < 1 {
            return Err(LimiterError::Protocol(format!("counter value {count}")));
        }

        Ok(Hit {
            count: count as u64,
            reset_after: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }
}
