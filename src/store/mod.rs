//! Хранилище документов: фильмы, сеансы, брони, билеты, арранжементы,
//! пользователи.
//!
//! Карта мест сеанса меняется только через compare-and-swap по `version`:
//! `commit_allocation`, `commit_release` и `update_showtime`; удаление сеанса
//! тоже сверяет версию. Несовпадение
//! версии дает `StoreError::Conflict`, вызывающий перечитывает и повторяет.

pub mod memory;
pub mod postgres;

use crate::models::{
    Booking, BookingStatus, Event, Movie, Showtime, Ticket, TicketStatus, User,
};
use crate::seating::SeatMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: Uuid },

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("{entity} is still referenced: {reason}")]
    InUse { entity: &'static str, reason: String },

    #[error("stored record is malformed: {0}")]
    Malformed(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.constraint().unwrap_or("record").to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::InUse {
                entity: "record",
                reason: db.message().to_string(),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Malformed(err.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default)]
pub struct ShowtimeFilter {
    pub movie_id: Option<Uuid>,
    pub on_sale_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub showtime_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Покупка одним куском: новая карта мест по CAS + бронь + билет.
#[derive(Debug, Clone)]
pub struct AllocationCommit {
    pub showtime_id: Uuid,
    pub expected_version: i64,
    pub seat_map: SeatMap,
    pub booking: Booking,
    pub ticket: Option<Ticket>,
    pub at: DateTime<Utc>,
}

/// Возврат мест: карта по CAS, бронь переводится из `booking_from`,
/// связанные билеты получают `ticket_status`.
#[derive(Debug, Clone)]
pub struct ReleaseCommit {
    pub showtime_id: Uuid,
    pub expected_version: i64,
    pub seat_map: SeatMap,
    pub booking_id: Uuid,
    pub booking_from: BookingStatus,
    pub booking_to: BookingStatus,
    pub ticket_status: Option<TicketStatus>,
    pub at: DateTime<Utc>,
}

/// Смена статуса брони без изменения карты мест.
#[derive(Debug, Clone)]
pub struct BookingTransition {
    pub booking_id: Uuid,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub ticket_status: Option<TicketStatus>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // Фильмы
    async fn list_movies(&self) -> StoreResult<Vec<Movie>>;
    async fn get_movie(&self, id: Uuid) -> StoreResult<Option<Movie>>;
    async fn insert_movie(&self, movie: &Movie) -> StoreResult<()>;
    async fn update_movie(&self, movie: &Movie) -> StoreResult<()>;
    async fn delete_movie(&self, id: Uuid) -> StoreResult<()>;

    // Сеансы
    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<Showtime>>;
    async fn get_showtime(&self, id: Uuid) -> StoreResult<Option<Showtime>>;
    async fn insert_showtime(&self, showtime: &Showtime) -> StoreResult<()>;
    /// CAS по `showtime.version`, возвращает новую версию.
    async fn update_showtime(&self, showtime: &Showtime) -> StoreResult<i64>;
    /// Тоже CAS: покупка, успевшая занять места, меняет версию.
    async fn delete_showtime(&self, id: Uuid, expected_version: i64) -> StoreResult<()>;

    // Покупка и возврат
    async fn commit_allocation(&self, commit: AllocationCommit) -> StoreResult<i64>;
    async fn commit_release(&self, commit: ReleaseCommit) -> StoreResult<i64>;

    // Брони и билеты
    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;
    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;
    async fn transition_booking(&self, transition: BookingTransition) -> StoreResult<Booking>;
    async fn list_tickets(&self, user_id: Uuid) -> StoreResult<Vec<Ticket>>;
    async fn get_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>>;
    async fn update_ticket_status(
        &self,
        id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
    ) -> StoreResult<Ticket>;

    // Арранжементы, по дате
    /// `from` отсекает прошедшие.
    async fn list_events(&self, from: Option<DateTime<Utc>>) -> StoreResult<Vec<Event>>;
    async fn insert_event(&self, event: &Event) -> StoreResult<()>;

    // Пользователи
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;
}
