use super::{
    AllocationCommit, BookingFilter, BookingTransition, ReleaseCommit, ShowtimeFilter, Store,
    StoreError, StoreResult,
};
use crate::models::{
    Booking, Event, Movie, Showtime, ShowtimeStatus, Ticket, TicketStatus, User,
};
use chrono::{DateTime, Utc};
use crate::seating::{SeatMap, SeatRecord};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

const MOVIE_COLUMNS: &str = "id, title, original_title, slug, short_description, long_description, \
    poster_url, backdrop_url, trailer_url, genres, runtime_minutes, age_rating, age_rating_image_url, \
    languages, featured, is_upcoming, is_popular, popular_order, created_at, updated_at";

const SHOWTIME_COLUMNS: &str = "id, movie_id, datetime, auditorium, language, price, total_seats, \
    seats_available, seat_map_rows, seat_map_cols, seat_map, status, version, created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, user_id, user_name, user_email, showtime_id, movie_id, movie_title, \
    seats, price_per_seat, total_price, datetime, auditorium, language, status, payment_reference, \
    created_at, updated_at, paid_at";

const TICKET_COLUMNS: &str = "id, booking_id, user_id, user_email, movie_id, movie_title, movie_poster_url, \
    showtime_id, datetime, auditorium, language, price_per_seat, seats, total_price, total_seats, \
    purchase_date, status";

const EVENT_COLUMNS: &str = "id, title, description, image_url, date, location, price, \
    available_seats, category, created_at, updated_at";

const USER_COLUMNS: &str =
    "id, email, name, password_hash, profile_picture_id, is_admin, created_at, updated_at";

fn decode_error<E>(column: &str, err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    }
}

// Карта собирается из плоского JSONB и размеров, счетчики пересчитываются
impl<'r> FromRow<'r, PgRow> for Showtime {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let rows: i32 = row.try_get("seat_map_rows")?;
        let cols: i32 = row.try_get("seat_map_cols")?;
        let rows = u16::try_from(rows).map_err(|e| decode_error("seat_map_rows", e))?;
        let cols = u16::try_from(cols).map_err(|e| decode_error("seat_map_cols", e))?;
        let Json(records): Json<Vec<SeatRecord>> = row.try_get("seat_map")?;
        let seat_map =
            SeatMap::from_records(rows, cols, &records).map_err(|e| decode_error("seat_map", e))?;
        let status: String = row.try_get("status")?;
        let status = ShowtimeStatus::try_from(status).map_err(|e| decode_error("status", e))?;

        let mut showtime = Showtime {
            id: row.try_get("id")?,
            movie_id: row.try_get("movie_id")?,
            datetime: row.try_get("datetime")?,
            auditorium: row.try_get("auditorium")?,
            language: row.try_get("language")?,
            price: row.try_get("price")?,
            total_seats: 0,
            seats_available: 0,
            seat_map: SeatMap::uniform(0, 0),
            status,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        };
        showtime.replace_seat_map(seat_map);
        Ok(showtime)
    }
}

fn seat_records(map: &SeatMap) -> Json<Vec<SeatRecord>> {
    Json(map.records().collect())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// После неудачного CAS отличаем отсутствие записи от гонки.
    async fn missing_or_conflict(&self, table: &'static str, entity: &'static str, id: Uuid) -> StoreError {
        let query = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table);
        match sqlx::query_scalar::<_, bool>(&query).bind(id).fetch_one(&self.pool).await {
            Ok(true) => StoreError::Conflict { entity, id },
            Ok(false) => StoreError::NotFound { entity, id },
            Err(err) => err.into(),
        }
    }

    async fn write_seat_map(
        tx: &mut Transaction<'_, Postgres>,
        showtime_id: Uuid,
        expected_version: i64,
        seat_map: &SeatMap,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<i64>> {
        let version = sqlx::query_scalar::<_, i64>(
            "UPDATE showtimes
             SET seat_map = $1, seat_map_rows = $2, seat_map_cols = $3,
                 total_seats = $4, seats_available = $5,
                 version = version + 1, updated_at = $6
             WHERE id = $7 AND version = $8
             RETURNING version",
        )
        .bind(seat_records(seat_map))
        .bind(i32::from(seat_map.rows()))
        .bind(i32::from(seat_map.cols()))
        .bind(crate::models::seat_count(seat_map.total_seats()))
        .bind(crate::models::seat_count(seat_map.seats_available()))
        .bind(at)
        .bind(showtime_id)
        .bind(expected_version)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(version)
    }

    async fn set_ticket_status(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        status: TicketStatus,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE tickets SET status = $1 WHERE booking_id = $2")
            .bind(status.as_str())
            .bind(booking_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_booking(tx: &mut Transaction<'_, Postgres>, booking: &Booking) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO bookings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(&booking.user_name)
        .bind(&booking.user_email)
        .bind(booking.showtime_id)
        .bind(booking.movie_id)
        .bind(&booking.movie_title)
        .bind(Json(&booking.seats))
        .bind(booking.price_per_seat)
        .bind(booking.total_price)
        .bind(booking.datetime)
        .bind(&booking.auditorium)
        .bind(&booking.language)
        .bind(booking.status.as_str())
        .bind(&booking.payment_reference)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.paid_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_ticket(tx: &mut Transaction<'_, Postgres>, ticket: &Ticket) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO tickets ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            TICKET_COLUMNS
        ))
        .bind(ticket.id)
        .bind(ticket.booking_id)
        .bind(ticket.user_id)
        .bind(&ticket.user_email)
        .bind(ticket.movie_id)
        .bind(&ticket.movie_title)
        .bind(&ticket.movie_poster_url)
        .bind(ticket.showtime_id)
        .bind(ticket.datetime)
        .bind(&ticket.auditorium)
        .bind(&ticket.language)
        .bind(ticket.price_per_seat)
        .bind(Json(&ticket.seats))
        .bind(ticket.total_price)
        .bind(ticket.total_seats)
        .bind(ticket.purchase_date)
        .bind(ticket.status.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn bind_movie<'q>(
        query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
        movie: &'q Movie,
    ) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
        query
            .bind(movie.id)
            .bind(&movie.title)
            .bind(&movie.original_title)
            .bind(&movie.slug)
            .bind(&movie.short_description)
            .bind(&movie.long_description)
            .bind(&movie.poster_url)
            .bind(&movie.backdrop_url)
            .bind(&movie.trailer_url)
            .bind(&movie.genres)
            .bind(movie.runtime_minutes)
            .bind(&movie.age_rating)
            .bind(&movie.age_rating_image_url)
            .bind(&movie.languages)
            .bind(movie.featured)
            .bind(movie.is_upcoming)
            .bind(movie.is_popular)
            .bind(movie.popular_order)
            .bind(movie.created_at)
            .bind(movie.updated_at)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_movies(&self) -> StoreResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM movies ORDER BY title",
            MOVIE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }

    async fn get_movie(&self, id: Uuid) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(&format!(
            "SELECT {} FROM movies WHERE id = $1",
            MOVIE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(movie)
    }

    async fn insert_movie(&self, movie: &Movie) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO movies ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
            MOVIE_COLUMNS
        );
        Self::bind_movie(sqlx::query(&sql), movie)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_movie(&self, movie: &Movie) -> StoreResult<()> {
        let sql = "UPDATE movies SET title = $2, original_title = $3, slug = $4,
                   short_description = $5, long_description = $6, poster_url = $7,
                   backdrop_url = $8, trailer_url = $9, genres = $10, runtime_minutes = $11,
                   age_rating = $12, age_rating_image_url = $13, languages = $14,
                   featured = $15, is_upcoming = $16, is_popular = $17, popular_order = $18,
                   created_at = $19, updated_at = $20
                   WHERE id = $1";
        let result = Self::bind_movie(sqlx::query(sql), movie)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "movie", id: movie.id });
        }
        Ok(())
    }

    async fn delete_movie(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| match StoreError::from(err) {
                StoreError::InUse { .. } => StoreError::InUse {
                    entity: "movie",
                    reason: "showtimes reference it".into(),
                },
                other => other,
            })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "movie", id });
        }
        Ok(())
    }

    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<Showtime>> {
        let showtimes = sqlx::query_as::<_, Showtime>(&format!(
            "SELECT {} FROM showtimes
             WHERE ($1::uuid IS NULL OR movie_id = $1)
               AND (NOT $2 OR status = 'on_sale')
             ORDER BY datetime",
            SHOWTIME_COLUMNS
        ))
        .bind(filter.movie_id)
        .bind(filter.on_sale_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(showtimes)
    }

    async fn get_showtime(&self, id: Uuid) -> StoreResult<Option<Showtime>> {
        let showtime = sqlx::query_as::<_, Showtime>(&format!(
            "SELECT {} FROM showtimes WHERE id = $1",
            SHOWTIME_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(showtime)
    }

    async fn insert_showtime(&self, showtime: &Showtime) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO showtimes ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            SHOWTIME_COLUMNS
        ))
        .bind(showtime.id)
        .bind(showtime.movie_id)
        .bind(showtime.datetime)
        .bind(&showtime.auditorium)
        .bind(&showtime.language)
        .bind(showtime.price)
        .bind(crate::models::seat_count(showtime.seat_map.total_seats()))
        .bind(crate::models::seat_count(showtime.seat_map.seats_available()))
        .bind(i32::from(showtime.seat_map.rows()))
        .bind(i32::from(showtime.seat_map.cols()))
        .bind(seat_records(&showtime.seat_map))
        .bind(showtime.status.as_str())
        .bind(showtime.version)
        .bind(showtime.created_at)
        .bind(showtime.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match StoreError::from(err) {
            StoreError::InUse { .. } => StoreError::NotFound { entity: "movie", id: showtime.movie_id },
            other => other,
        })?;
        Ok(())
    }

    async fn update_showtime(&self, showtime: &Showtime) -> StoreResult<i64> {
        let version = sqlx::query_scalar::<_, i64>(
            "UPDATE showtimes
             SET movie_id = $2, datetime = $3, auditorium = $4, language = $5, price = $6,
                 total_seats = $7, seats_available = $8, seat_map_rows = $9, seat_map_cols = $10,
                 seat_map = $11, status = $12, updated_at = $13, version = version + 1
             WHERE id = $1 AND version = $14
             RETURNING version",
        )
        .bind(showtime.id)
        .bind(showtime.movie_id)
        .bind(showtime.datetime)
        .bind(&showtime.auditorium)
        .bind(&showtime.language)
        .bind(showtime.price)
        .bind(crate::models::seat_count(showtime.seat_map.total_seats()))
        .bind(crate::models::seat_count(showtime.seat_map.seats_available()))
        .bind(i32::from(showtime.seat_map.rows()))
        .bind(i32::from(showtime.seat_map.cols()))
        .bind(seat_records(&showtime.seat_map))
        .bind(showtime.status.as_str())
        .bind(showtime.updated_at)
        .bind(showtime.version)
        .fetch_optional(&self.pool)
        .await?;

        match version {
            Some(version) => Ok(version),
            None => Err(self.missing_or_conflict("showtimes", "showtime", showtime.id).await),
        }
    }

    async fn delete_showtime(&self, id: Uuid, expected_version: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM showtimes WHERE id = $1 AND version = $2")
            .bind(id)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(self.missing_or_conflict("showtimes", "showtime", id).await);
        }
        Ok(())
    }

    async fn commit_allocation(&self, commit: AllocationCommit) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;

        let version = Self::write_seat_map(
            &mut tx,
            commit.showtime_id,
            commit.expected_version,
            &commit.seat_map,
            commit.at,
        )
        .await?;
        let Some(version) = version else {
            tx.rollback().await?;
            debug!("Seat map CAS failed for showtime {}", commit.showtime_id);
            return Err(self.missing_or_conflict("showtimes", "showtime", commit.showtime_id).await);
        };

        Self::insert_booking(&mut tx, &commit.booking).await?;
        if let Some(ticket) = &commit.ticket {
            Self::insert_ticket(&mut tx, ticket).await?;
        }

        tx.commit().await?;
        Ok(version)
    }

    async fn commit_release(&self, commit: ReleaseCommit) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            "UPDATE bookings SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(commit.booking_to.as_str())
        .bind(commit.at)
        .bind(commit.booking_id)
        .bind(commit.booking_from.as_str())
        .execute(&mut *tx)
        .await?;
        if moved.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.missing_or_conflict("bookings", "booking", commit.booking_id).await);
        }

        let version = Self::write_seat_map(
            &mut tx,
            commit.showtime_id,
            commit.expected_version,
            &commit.seat_map,
            commit.at,
        )
        .await?;
        let Some(version) = version else {
            tx.rollback().await?;
            return Err(self.missing_or_conflict("showtimes", "showtime", commit.showtime_id).await);
        };

        if let Some(status) = commit.ticket_status {
            Self::set_ticket_status(&mut tx, commit.booking_id, status).await?;
        }

        tx.commit().await?;
        Ok(version)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings
             WHERE ($1::uuid IS NULL OR showtime_id = $1)
               AND ($2::uuid IS NULL OR user_id = $2)
             ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(filter.showtime_id)
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn transition_booking(&self, transition: BookingTransition) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings
             SET status = $1, updated_at = $2,
                 paid_at = CASE WHEN $1 = 'paid' THEN COALESCE(paid_at, $2) ELSE paid_at END
             WHERE id = $3 AND status = $4
             RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(transition.to.as_str())
        .bind(transition.at)
        .bind(transition.booking_id)
        .bind(transition.from.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(booking) = booking else {
            tx.rollback().await?;
            return Err(self.missing_or_conflict("bookings", "booking", transition.booking_id).await);
        };

        if let Some(status) = transition.ticket_status {
            Self::set_ticket_status(&mut tx, transition.booking_id, status).await?;
        }

        tx.commit().await?;
        Ok(booking)
    }

    async fn list_tickets(&self, user_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE user_id = $1 ORDER BY purchase_date DESC",
            TICKET_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE id = $1",
            TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn update_ticket_status(
        &self,
        id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
    ) -> StoreResult<Ticket> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "UPDATE tickets SET status = $1 WHERE id = $2 AND status = $3 RETURNING {}",
            TICKET_COLUMNS
        ))
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match ticket {
            Some(ticket) => Ok(ticket),
            None => Err(self.missing_or_conflict("tickets", "ticket", id).await),
        }
    }

    async fn list_events(&self, from: Option<DateTime<Utc>>) -> StoreResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events
             WHERE ($1::timestamptz IS NULL OR date >= $1)
             ORDER BY date",
            EVENT_COLUMNS
        ))
        .bind(from)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO events ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            EVENT_COLUMNS
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.image_url)
        .bind(event.date)
        .bind(&event.location)
        .bind(event.price)
        .bind(event.available_seats)
        .bind(&event.category)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.profile_picture_id)
        .bind(user.is_admin)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match StoreError::from(err) {
            StoreError::Duplicate(_) => {
                StoreError::Duplicate(format!("user with email {}", user.email))
            }
            other => other,
        })?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET email = $2, name = $3, password_hash = $4,
             profile_picture_id = $5, is_admin = $6, updated_at = $7
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.profile_picture_id)
        .bind(user.is_admin)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "user", id: user.id });
        }
        Ok(())
    }
}
