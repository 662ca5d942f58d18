use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Секрет по умолчанию годится только для разработки.
pub const DEV_JWT_SECRET: &str = "malling-bio-dev-secret";

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub seating: SeatingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub pool_size: u32,
}

// Redis опционален: без него нет кэша каталога и ограничения входов
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "malling".to_string()
}

// Настройки JWT и хэширования паролей
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Simulated,
    Gateway,
}

// Настройки платежного шлюза
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub provider: PaymentProvider,
    pub merchant_id: String,
    pub merchant_password: String,
    pub gateway_url: String,
    pub currency: String,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

// Зал по умолчанию и число попыток записи карты мест
#[derive(Debug, Clone, Deserialize)]
pub struct SeatingConfig {
    pub default_rows: u16,
    pub default_cols: u16,
    pub max_commit_attempts: u32,
}

impl Config {
    /// Порядок источников: значения по умолчанию, затем файл
    /// `config/malling_bio.*`, затем `MALLING_*`, затем общеизвестные
    /// переменные (`DATABASE_URL`, `REDIS_URL`, `JWT_SECRET`, `RUST_LOG`, `PORT`).
    pub fn load() -> Result<Self, ConfigError> {
        let config: Config = config::Config::builder()
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.environment", "development")?
            .set_default("app.rust_log", "malling_bio=debug,tower_http=debug")?
            .set_default("app.log_format", "pretty")?
            .set_default("database.backend", "postgres")?
            .set_default("database.pool_size", 20)?
            .set_default("redis.namespace", "malling")?
            .set_default("jwt.secret", DEV_JWT_SECRET)?
            .set_default("jwt.expires_in_hours", 24)?
            .set_default("jwt.bcrypt_cost", i64::from(bcrypt::DEFAULT_COST))?
            .set_default("payment.provider", "simulated")?
            .set_default("payment.merchant_id", "")?
            .set_default("payment.merchant_password", "")?
            .set_default("payment.gateway_url", "http://localhost:8081")?
            .set_default("payment.currency", "DKK")?
            .set_default("circuit_breaker.failure_threshold", 5)?
            .set_default("circuit_breaker.timeout_seconds", 60)?
            .set_default("seating.default_rows", 8)?
            .set_default("seating.default_cols", 12)?
            .set_default("seating.max_commit_attempts", 3)?
            .add_source(File::with_name("config/malling_bio").required(false))
            .add_source(
                Environment::with_prefix("MALLING")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", env::var("JWT_SECRET").ok())?
            .set_override_option("app.rust_log", env::var("RUST_LOG").ok())?
            .set_override_option("app.port", env::var("PORT").ok())?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Message(
                "DATABASE_URL must be set for the postgres backend".into(),
            ));
        }
        if self.is_production() && self.jwt.secret == DEV_JWT_SECRET {
            return Err(ConfigError::Message(
                "JWT_SECRET must be set in production".into(),
            ));
        }
        if self.payment.provider == PaymentProvider::Gateway
            && (self.payment.merchant_id.is_empty() || self.payment.merchant_password.is_empty())
        {
            return Err(ConfigError::Message(
                "payment gateway requires merchant_id and merchant_password".into(),
            ));
        }
        if self.seating.max_commit_attempts == 0 {
            return Err(ConfigError::Message(
                "seating.max_commit_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app.environment.eq_ignore_ascii_case("production")
    }

    /// Конфигурация без внешних сервисов: память, заглушка оплаты, дешевый bcrypt.
    pub fn for_tests() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".into(),
                port: 0,
                environment: "test".into(),
                rust_log: "malling_bio=debug".into(),
                log_format: LogFormat::Pretty,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: None,
                pool_size: 1,
            },
            redis: RedisConfig::default(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                expires_in_hours: 1,
                bcrypt_cost: 4,
            },
            payment: PaymentConfig {
                provider: PaymentProvider::Simulated,
                merchant_id: String::new(),
                merchant_password: String::new(),
                gateway_url: String::new(),
                currency: "DKK".into(),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                timeout_seconds: 60,
            },
            seating: SeatingConfig {
                default_rows: 8,
                default_cols: 12,
                max_commit_attempts: 3,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_valid() {
        assert!(Config::for_tests().validate().is_ok());
    }

    #[test]
    fn postgres_backend_requires_a_url() {
        let mut config = Config::for_tests();
        config.database.backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());
    }

    #[test]
    fn production_rejects_the_development_secret() {
        let mut config = Config::for_tests();
        config.app.environment = "production".into();
        config.jwt.secret = DEV_JWT_SECRET.into();
        assert!(config.validate().is_err());
    }
}
