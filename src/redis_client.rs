use redis::{aio::MultiplexedConnection, Client};
use tracing::info;

/// Подключение к Redis. Все ключи приложения живут под общим префиксом.
#[derive(Clone)]
pub struct RedisClient {
    pub conn: MultiplexedConnection,
    namespace: String,
}

impl RedisClient {
    pub async fn connect(redis_url: &str, namespace: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_tokio_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Connected to Redis, key namespace '{}'", namespace);
        Ok(RedisClient {
            conn,
            namespace: namespace.to_string(),
        })
    }

    pub fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.namespace, suffix)
    }
}
