use crate::cache::CacheService;
use crate::config::SeatingConfig;
use crate::error::AppError;
use crate::models::{
    Booking, BookingStatus, Event, EventInput, ManualBookingInput, Movie, MovieInput, Showtime,
    ShowtimeInput, ShowtimeUpdate, Ticket, TicketStatus,
};
use crate::seating::{AuditoriumLayout, SeatRef, SeatStatus};
use crate::services::allocation::{BookingDraft, SeatAllocator};
use crate::store::{BookingFilter, BookingTransition, ShowtimeFilter, Store};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct SeatOverride {
    pub row: u16,
    pub seat: u16,
    pub status: SeatStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingStatusUpdate {
    pub status: BookingStatus,
}

// Сводка по сеансу для админки
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeSummary {
    pub showtime_id: Uuid,
    pub total_seats: i32,
    pub seats_available: i32,
    pub seats_taken: usize,
    pub seats_handicap: usize,
    pub bookings_pending: usize,
    pub bookings_paid: usize,
    pub bookings_refunded: usize,
    pub seats_sold: usize,
    pub revenue: i64,
}

/// Операции админ-панели. Проверка прав - на уровне HTTP (`AdminUser`).
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
    allocator: SeatAllocator,
    cache: Option<CacheService>,
    seating: SeatingConfig,
}

impl AdminService {
    pub fn new(
        store: Arc<dyn Store>,
        allocator: SeatAllocator,
        cache: Option<CacheService>,
        seating: SeatingConfig,
    ) -> Self {
        Self {
            store,
            allocator,
            cache,
            seating,
        }
    }

    // --- Фильмы ---

    pub async fn movies(&self) -> Result<Vec<Movie>, AppError> {
        Ok(self.store.list_movies().await?)
    }

    pub async fn create_movie(&self, input: MovieInput) -> Result<Movie, AppError> {
        input.validate()?;
        let movie = Movie::from_input(input, Utc::now());
        self.store.insert_movie(&movie).await?;
        self.invalidate_movies().await;
        info!("Movie {} '{}' created", movie.id, movie.title);
        Ok(movie)
    }

    pub async fn update_movie(&self, id: Uuid, input: MovieInput) -> Result<Movie, AppError> {
        input.validate()?;
        let mut movie = self
            .store
            .get_movie(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("movie {}", id)))?;
        movie.apply(input, Utc::now());
        self.store.update_movie(&movie).await?;
        self.invalidate_movies().await;
        info!("Movie {} updated", id);
        Ok(movie)
    }

    pub async fn delete_movie(&self, id: Uuid) -> Result<(), AppError> {
        self.store.delete_movie(id).await?;
        self.invalidate_movies().await;
        info!("Movie {} deleted", id);
        Ok(())
    }

    // --- Арранжементы ---

    pub async fn create_event(&self, input: EventInput) -> Result<Event, AppError> {
        input.validate()?;
        let event = Event::from_input(input, Utc::now());
        self.store.insert_event(&event).await?;
        info!("Event {} '{}' created for {}", event.id, event.title, event.date);
        Ok(event)
    }

    // --- Сеансы ---

    pub async fn showtimes(&self, movie_id: Option<Uuid>) -> Result<Vec<Showtime>, AppError> {
        let filter = ShowtimeFilter {
            movie_id,
            on_sale_only: false,
        };
        let mut showtimes = self.store.list_showtimes(&filter).await?;
        // В админке свежие сверху
        showtimes.reverse();
        Ok(showtimes)
    }

    pub async fn create_showtime(&self, input: ShowtimeInput) -> Result<Showtime, AppError> {
        input.validate()?;
        if self.store.get_movie(input.movie_id).await?.is_none() {
            return Err(AppError::Validation(
                "a showtime must reference an existing movie".into(),
            ));
        }

        let seat_map = match input.seat_map {
            Some(map) => map,
            None => AuditoriumLayout::for_auditorium(
                &input.auditorium,
                self.seating.default_rows,
                self.seating.default_cols,
            )
            .seat_map(input.rows, input.cols),
        };

        let now = Utc::now();
        let mut showtime = Showtime::new(
            input.movie_id,
            input.datetime,
            input.auditorium.trim().to_string(),
            input.language.trim().to_string(),
            input.price,
            seat_map,
            now,
        );
        showtime.status = input.status;

        self.store.insert_showtime(&showtime).await?;
        if let Some(cache) = &self.cache {
            cache.invalidate_showtime(showtime.id, showtime.movie_id).await;
        }
        info!(
            "Showtime {} created: {} seats in {}",
            showtime.id, showtime.total_seats, showtime.auditorium
        );
        Ok(showtime)
    }

    pub async fn update_showtime(&self, id: Uuid, update: ShowtimeUpdate) -> Result<Showtime, AppError> {
        update.validate()?;
        let showtime = self
            .allocator
            .update_showtime(id, |showtime| showtime.apply(update.clone(), Utc::now()))
            .await?;
        info!("Showtime {} updated", id);
        Ok(showtime)
    }

    pub async fn delete_showtime(&self, id: Uuid) -> Result<(), AppError> {
        let showtime = self.allocator.load_showtime(id).await?;
        let live = self
            .store
            .list_bookings(&BookingFilter {
                showtime_id: Some(id),
                user_id: None,
            })
            .await?
            .into_iter()
            .filter(|b| b.status.holds_seats())
            .count();
        if live > 0 {
            return Err(AppError::Conflict(format!(
                "showtime has {} active bookings; refund them first",
                live
            )));
        }

        // Версия прочитана до проверки броней: покупка между ними даст конфликт
        self.store.delete_showtime(id, showtime.version).await?;
        if let Some(cache) = &self.cache {
            cache.invalidate_showtime(id, showtime.movie_id).await;
        }
        info!("Showtime {} deleted", id);
        Ok(())
    }

    pub async fn set_seat_status(
        &self,
        showtime_id: Uuid,
        change: SeatOverride,
    ) -> Result<Showtime, AppError> {
        self.allocator
            .override_seat(showtime_id, SeatRef::new(change.row, change.seat), change.status)
            .await
    }

    // --- Брони и билеты ---

    pub async fn bookings(&self, showtime_id: Option<Uuid>) -> Result<Vec<Booking>, AppError> {
        let filter = BookingFilter {
            showtime_id,
            user_id: None,
        };
        Ok(self.store.list_bookings(&filter).await?)
    }

    /// Ручная бронь: места занимаются через общий путь, статус `pending`,
    /// билет не выпускается до оплаты.
    pub async fn create_booking(&self, input: ManualBookingInput) -> Result<Booking, AppError> {
        input.validate()?;
        let user = self
            .store
            .get_user(input.user_id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("user {} does not exist", input.user_id)))?;
        let showtime = self.allocator.load_showtime(input.showtime_id).await?;
        let movie = self
            .store
            .get_movie(showtime.movie_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("movie {}", showtime.movie_id)))?;

        let draft = BookingDraft {
            booking_id: Uuid::new_v4(),
            user_id: user.id,
            user_name: user.name,
            user_email: user.email,
            movie,
            price_per_seat: showtime.price,
            status: BookingStatus::Pending,
            payment_reference: None,
            issue_ticket: false,
        };
        let allocation = self.allocator.claim(showtime, &input.seats, &draft).await?;
        info!("Manual booking {} created", allocation.booking.id);
        Ok(allocation.booking)
    }

    /// Ручная смена статуса: карту мест не трогает. При возврате связанные
    /// билеты аннулируются.
    pub async fn set_booking_status(
        &self,
        booking_id: Uuid,
        to: BookingStatus,
    ) -> Result<Booking, AppError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {}", booking_id)))?;
        if !booking.status.can_transition_to(to) {
            return Err(AppError::Validation(format!(
                "booking cannot move from {} to {}",
                booking.status, to
            )));
        }

        let updated = self
            .store
            .transition_booking(BookingTransition {
                booking_id,
                from: booking.status,
                to,
                ticket_status: (to == BookingStatus::Refunded).then_some(TicketStatus::Cancelled),
                at: Utc::now(),
            })
            .await?;
        info!("Booking {} moved {} -> {}", booking_id, booking.status, to);
        Ok(updated)
    }

    pub async fn mark_ticket_used(&self, ticket_id: Uuid) -> Result<Ticket, AppError> {
        let ticket = self
            .store
            .update_ticket_status(ticket_id, TicketStatus::Active, TicketStatus::Used)
            .await?;
        info!("Ticket {} marked as used", ticket_id);
        Ok(ticket)
    }

    pub async fn showtime_summary(&self, showtime_id: Uuid) -> Result<ShowtimeSummary, AppError> {
        let showtime = self.allocator.load_showtime(showtime_id).await?;
        let bookings = self.bookings(Some(showtime_id)).await?;

        let count = |status: BookingStatus| bookings.iter().filter(|b| b.status == status).count();
        let paid = bookings.iter().filter(|b| b.status == BookingStatus::Paid);

        let summary = ShowtimeSummary {
            showtime_id,
            total_seats: showtime.total_seats,
            seats_available: showtime.seats_available,
            seats_taken: showtime.seat_map.count(SeatStatus::Taken),
            seats_handicap: showtime.seat_map.count(SeatStatus::Handicap),
            bookings_pending: count(BookingStatus::Pending),
            bookings_paid: count(BookingStatus::Paid),
            bookings_refunded: count(BookingStatus::Refunded),
            seats_sold: paid.clone().map(|b| b.seats.len()).sum(),
            revenue: paid.map(|b| b.total_price).sum(),
        };
        info!("Summary for showtime {}: {:?}", showtime_id, summary);
        Ok(summary)
    }

    async fn invalidate_movies(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_movies().await;
        }
    }
}
