//! Единственная точка записи карты мест.
//!
//! И покупка, и возврат, и ручная правка места из админки проходят через
//! `SeatAllocator`: прочитать сеанс, посчитать новую карту чистой функцией,
//! записать по CAS на `version`. При гонке - перечитать и повторить, не
//! больше `max_attempts` раз.

use crate::cache::CacheService;
use crate::error::AppError;
use crate::models::{Booking, BookingStatus, Movie, Showtime, Ticket, TicketStatus};
use crate::seating::{claim_seats, release_seats, AllocationError, SeatRef, SeatStatus};
use crate::store::{
    AllocationCommit, BookingFilter, BookingTransition, ReleaseCommit, Store, StoreError,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Все, что нужно для записи брони, кроме состояния сеанса.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub movie: Movie,
    pub price_per_seat: i64,
    pub status: BookingStatus,
    pub payment_reference: Option<String>,
    pub issue_ticket: bool,
}

impl BookingDraft {
    fn booking(&self, showtime: &Showtime, seats: &[SeatRef], now: DateTime<Utc>) -> Booking {
        let mut seats = seats.to_vec();
        seats.sort();
        Booking {
            id: self.booking_id,
            user_id: self.user_id,
            user_name: self.user_name.clone(),
            user_email: self.user_email.clone(),
            showtime_id: showtime.id,
            movie_id: showtime.movie_id,
            movie_title: self.movie.title.clone(),
            price_per_seat: self.price_per_seat,
            total_price: self.price_per_seat.saturating_mul(seats.len() as i64),
            seats,
            datetime: showtime.datetime,
            auditorium: showtime.auditorium.clone(),
            language: showtime.language.clone(),
            status: self.status,
            payment_reference: self.payment_reference.clone(),
            created_at: now,
            updated_at: now,
            paid_at: (self.status == BookingStatus::Paid).then_some(now),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Allocation {
    pub booking: Booking,
    pub ticket: Option<Ticket>,
}

#[derive(Clone)]
pub struct SeatAllocator {
    store: Arc<dyn Store>,
    cache: Option<CacheService>,
    max_attempts: u32,
}

impl SeatAllocator {
    pub fn new(store: Arc<dyn Store>, cache: Option<CacheService>, max_attempts: u32) -> Self {
        Self {
            store,
            cache,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn load_showtime(&self, id: Uuid) -> Result<Showtime, AppError> {
        self.store
            .get_showtime(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("showtime {}", id)))
    }

    /// Занимает места и записывает бронь. `showtime` - уже прочитанное
    /// состояние; при гонке перечитывается.
    pub async fn claim(
        &self,
        mut showtime: Showtime,
        seats: &[SeatRef],
        draft: &BookingDraft,
    ) -> Result<Allocation, AppError> {
        let mut attempt = 1;
        loop {
            if !showtime.is_on_sale() {
                return Err(AppError::Conflict("showtime is not on sale".into()));
            }

            let seat_map = match claim_seats(&showtime.seat_map, seats) {
                Ok(map) => map,
                Err(err @ AllocationError::SeatsUnavailable { .. }) => {
                    info!("Seat conflict on showtime {}: {}", showtime.id, err);
                    return Err(err.into());
                }
                Err(err) => return Err(err.into()),
            };

            let now = Utc::now();
            let booking = draft.booking(&showtime, seats, now);
            let ticket = draft
                .issue_ticket
                .then(|| Ticket::for_booking(&booking, &draft.movie));

            let commit = AllocationCommit {
                showtime_id: showtime.id,
                expected_version: showtime.version,
                seat_map,
                booking: booking.clone(),
                ticket: ticket.clone(),
                at: now,
            };
            match self.store.commit_allocation(commit).await {
                Ok(version) => {
                    debug!("Showtime {} now at version {}", showtime.id, version);
                    self.invalidate(&showtime).await;
                    return Ok(Allocation { booking, ticket });
                }
                Err(StoreError::Conflict { entity: "showtime", .. }) if attempt < self.max_attempts => {
                    debug!(
                        "Showtime {} changed during claim (attempt {}), re-reading",
                        showtime.id, attempt
                    );
                    attempt += 1;
                    showtime = self.load_showtime(showtime.id).await?;
                }
                Err(StoreError::Conflict { .. }) => {
                    warn!("Giving up on showtime {} after {} attempts", showtime.id, attempt);
                    return Err(AppError::Conflict(
                        "showtime is busy, please try again".into(),
                    ));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Освобождает места брони и переводит ее в `to`. Если сеанс уже
    /// удален, меняется только статус.
    pub async fn release(
        &self,
        mut booking: Booking,
        to: BookingStatus,
        ticket_status: Option<TicketStatus>,
    ) -> Result<Booking, AppError> {
        let mut attempt = 1;
        loop {
            let now = Utc::now();
            let Some(showtime) = self.store.get_showtime(booking.showtime_id).await? else {
                let moved = self
                    .store
                    .transition_booking(BookingTransition {
                        booking_id: booking.id,
                        from: booking.status,
                        to,
                        ticket_status,
                        at: now,
                    })
                    .await?;
                return Ok(moved);
            };

            let seat_map = if booking.status.holds_seats() {
                release_seats(&showtime.seat_map, &booking.seats)
            } else {
                showtime.seat_map.clone()
            };
            let commit = ReleaseCommit {
                showtime_id: showtime.id,
                expected_version: showtime.version,
                seat_map,
                booking_id: booking.id,
                booking_from: booking.status,
                booking_to: to,
                ticket_status,
                at: now,
            };

            match self.store.commit_release(commit).await {
                Ok(_) => {
                    self.invalidate(&showtime).await;
                    info!("Booking {} moved to {}, seats released", booking.id, to);
                    booking.status = to;
                    booking.updated_at = now;
                    return Ok(booking);
                }
                Err(StoreError::Conflict { entity: "showtime", .. }) if attempt < self.max_attempts => {
                    attempt += 1;
                }
                Err(StoreError::Conflict { entity: "booking", .. }) => {
                    return Err(AppError::Conflict(
                        "booking was changed by someone else, please reload".into(),
                    ));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Ручная правка статуса места. Место, занятое действующей бронью,
    /// трогать нельзя.
    pub async fn override_seat(
        &self,
        showtime_id: Uuid,
        seat: SeatRef,
        status: SeatStatus,
    ) -> Result<Showtime, AppError> {
        let mut attempt = 1;
        loop {
            let mut showtime = self.load_showtime(showtime_id).await?;
            let current = showtime
                .seat_map
                .status(seat)
                .ok_or(AllocationError::UnknownSeat(seat))?;
            if current == status {
                return Ok(showtime);
            }

            let filter = BookingFilter {
                showtime_id: Some(showtime_id),
                user_id: None,
            };
            let holder = self
                .store
                .list_bookings(&filter)
                .await?
                .into_iter()
                .find(|b| b.holds(seat));
            if let Some(holder) = holder {
                return Err(AppError::Conflict(format!(
                    "seat {} is held by booking {}",
                    seat, holder.id
                )));
            }

            let mut seat_map = showtime.seat_map.clone();
            seat_map.set_status(seat, status)?;
            showtime.replace_seat_map(seat_map);
            showtime.updated_at = Utc::now();

            match self.store.update_showtime(&showtime).await {
                Ok(version) => {
                    showtime.version = version;
                    self.invalidate(&showtime).await;
                    info!("Seat {} of showtime {} set to {}", seat, showtime_id, status);
                    return Ok(showtime);
                }
                Err(StoreError::Conflict { .. }) if attempt < self.max_attempts => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Меняет поля сеанса по CAS, карта мест остается как есть.
    pub async fn update_showtime<F>(&self, showtime_id: Uuid, mut edit: F) -> Result<Showtime, AppError>
    where
        F: FnMut(&mut Showtime) + Send,
    {
        let mut attempt = 1;
        loop {
            let mut showtime = self.load_showtime(showtime_id).await?;
            let seat_map = showtime.seat_map.clone();
            edit(&mut showtime);
            showtime.replace_seat_map(seat_map);

            match self.store.update_showtime(&showtime).await {
                Ok(version) => {
                    showtime.version = version;
                    self.invalidate(&showtime).await;
                    return Ok(showtime);
                }
                Err(StoreError::Conflict { .. }) if attempt < self.max_attempts => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn invalidate(&self, showtime: &Showtime) {
        if let Some(cache) = &self.cache {
            cache.invalidate_showtime(showtime.id, showtime.movie_id).await;
        }
    }
}
