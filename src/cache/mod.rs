use crate::redis_client::RedisClient;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

pub mod auth;
pub mod catalog;

/// Кэш поверх Redis: витрина каталога и служебные ключи авторизации.
/// Опционален, без него все работает напрямую с хранилищем.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
}

impl CacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let raw: Option<String> = conn.get(self.redis.key(key)).await?;
        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    // Битая запись: считаем промахом, она перезапишется
                    warn!("Dropping undecodable cache entry {}: {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub(crate) async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> Result<(), redis::RedisError> {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping cache write for {}: {}", key, e);
                return Ok(());
            }
        };
        let mut conn = self.redis.conn.clone();
        let _: () = conn.set_ex(self.redis.key(key), raw, ttl_seconds).await?;
        Ok(())
    }

    pub(crate) async fn invalidate(&self, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let _: () = conn.del(self.redis.key(key)).await?;
        Ok(())
    }
}
