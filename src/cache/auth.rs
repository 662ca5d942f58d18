use crate::cache::CacheService;
use redis::AsyncCommands;
use tracing::info;
use uuid::Uuid;

/// Неудачных попыток входа до блокировки.
pub const MAX_FAILED_LOGINS: u64 = 5;
/// Окно блокировки, секунды.
pub const LOGIN_LOCK_SECONDS: i64 = 900;

impl CacheService {
    /// Превышен ли лимит неудачных входов для email
    pub async fn login_locked(&self, email: &str) -> Result<bool, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let attempts: Option<u64> = conn.get(self.redis.key(&format!("auth:failed:{}", email))).await?;
        Ok(attempts.unwrap_or(0) >= MAX_FAILED_LOGINS)
    }

    /// Считает неудачный вход, окно стартует с первой попытки
    pub async fn record_failed_login(&self, email: &str) -> Result<u64, redis::RedisError> {
        let key = self.redis.key(&format!("auth:failed:{}", email));
        let mut conn = self.redis.conn.clone();
        let attempts: u64 = conn.incr(&key, 1).await?;
        if attempts == 1 {
            let _: () = conn.expire(&key, LOGIN_LOCK_SECONDS).await?;
        }
        if attempts == MAX_FAILED_LOGINS {
            info!("Login for {} locked after {} failed attempts", email, attempts);
        }
        Ok(attempts)
    }

    pub async fn clear_failed_logins(&self, email: &str) -> Result<(), redis::RedisError> {
        self.invalidate(&format!("auth:failed:{}", email)).await
    }

    /// Отзыв токена до истечения его срока (logout)
    pub async fn revoke_token(&self, jti: Uuid, ttl_seconds: u64) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let _: () = conn
            .set_ex(self.redis.key(&format!("auth:revoked:{}", jti)), 1, ttl_seconds.max(1))
            .await?;
        Ok(())
    }

    pub async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.exists(self.redis.key(&format!("auth:revoked:{}", jti))).await
    }
}
