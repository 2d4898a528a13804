//! Redis cache backend.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};

use crate::errors::MarketDataError;

use super::backend::CacheBackend;

/// Shared external cache over one multiplexed connection.
///
/// Every command is bounded by `op_timeout`; a slow store degrades into
/// cache misses instead of stalling lookups.
#[derive(Clone)]
pub struct RedisCacheBackend {
    connection: MultiplexedConnection,
    op_timeout: Duration,
}

fn unavailable(err: impl std::fmt::Display) -> MarketDataError {
    MarketDataError::CacheUnavailable(err.to_string())
}

impl RedisCacheBackend {
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, MarketDataError> {
        info!("Connecting to Redis cache...");

        let client = Client::open(url).map_err(unavailable)?;
        let connection = tokio::time::timeout(op_timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| unavailable("connection timed out"))?
            .map_err(unavailable)?;

        info!("Redis cache connection established");
        Ok(Self {
            connection,
            op_timeout,
        })
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, MarketDataError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| unavailable("operation timed out"))?
            .map_err(unavailable)
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, MarketDataError> {
        let mut conn = self.connection.clone();
        self.bounded(async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), MarketDataError> {
        let mut conn = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        self.bounded(async move { conn.set_ex::<_, _, ()>(key, value, seconds).await })
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), MarketDataError> {
        let mut conn = self.connection.clone();
        self.bounded(async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn clear(&self, prefix: &str) -> Result<usize, MarketDataError> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", prefix);
        self.bounded(async move {
            let keys: Vec<String> = conn.keys(pattern).await?;
            if keys.is_empty() {
                return Ok::<usize, redis::RedisError>(0);
            }
            let deleted: i64 = conn.del(&keys).await?;
            Ok::<usize, redis::RedisError>(deleted as usize)
        })
        .await
    }

    async fn ping(&self) -> Result<(), MarketDataError> {
        let mut conn = self.connection.clone();
        let reply: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(unavailable(format!("unexpected PING reply '{}'", reply)))
        }
    }
}
