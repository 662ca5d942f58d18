pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod seating;
pub mod services;
pub mod store;

use anyhow::Context;
use cache::CacheService;
use config::{Config, PaymentProvider, StoreBackend};
use services::admin::AdminService;
use services::allocation::SeatAllocator;
use services::auth::AuthService;
use services::booking::BookingService;
use services::catalog::CatalogService;
use services::payment::{GatewayPayments, PaymentProcessor, SimulatedPayments};
use std::sync::Arc;
use store::{MemoryStore, PgStore, Store};
use tracing::{info, warn};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub cache: Option<CacheService>,
    pub auth: AuthService,
    pub catalog: CatalogService,
    pub bookings: BookingService,
    pub admin: AdminService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store = open_store(&config).await?;

        let cache = match &config.redis.url {
            Some(url) => match redis_client::RedisClient::connect(url, &config.redis.namespace).await {
                Ok(redis) => Some(CacheService::new(redis)),
                Err(e) => {
                    // Без кэша сервис работает, только медленнее
                    warn!("Redis unavailable, running without cache: {}", e);
                    None
                }
            },
            None => None,
        };

        let payments: Arc<dyn PaymentProcessor> = match config.payment.provider {
            PaymentProvider::Simulated => {
                info!("Using simulated payments");
                Arc::new(SimulatedPayments::approving())
            }
            PaymentProvider::Gateway => {
                info!("Using payment gateway at {}", config.payment.gateway_url);
                Arc::new(
                    GatewayPayments::from_config(&config.payment, &config.circuit_breaker)
                        .context("failed to build payment gateway client")?,
                )
            }
        };

        Ok(Self::with_components(config, store, cache, payments))
    }

    /// Сборка сервисов из готовых частей. Тесты подставляют сюда память
    /// и заглушку оплаты.
    pub fn with_components(
        config: Config,
        store: Arc<dyn Store>,
        cache: Option<CacheService>,
        payments: Arc<dyn PaymentProcessor>,
    ) -> Arc<Self> {
        let allocator = SeatAllocator::new(
            store.clone(),
            cache.clone(),
            config.seating.max_commit_attempts,
        );

        Arc::new(Self {
            auth: AuthService::new(store.clone(), cache.clone(), &config.jwt),
            catalog: CatalogService::new(store.clone(), cache.clone(), config.seating.clone()),
            bookings: BookingService::new(
                store.clone(),
                allocator.clone(),
                payments,
                config.payment.currency.clone(),
            ),
            admin: AdminService::new(store.clone(), allocator, cache.clone(), config.seating.clone()),
            store,
            cache,
            config,
        })
    }
}

/// Хранилище по `database.backend`. Для Postgres сразу накатываются миграции.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match config.database.backend {
        StoreBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .context("DATABASE_URL is not set")?;
            let db = database::Database::connect(url, &config.database)
                .await
                .context("failed to connect to database")?;
            db.run_migrations().await.context("failed to run migrations")?;
            Ok(Arc::new(PgStore::new(db.pool)))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store, data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
