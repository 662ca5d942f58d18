use super::{
    AllocationCommit, BookingFilter, BookingTransition, ReleaseCommit, ShowtimeFilter, Store,
    StoreError, StoreResult,
};
use crate::models::{Booking, Event, Movie, Showtime, Ticket, TicketStatus, User};
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Collections {
    movies: HashMap<Uuid, Movie>,
    showtimes: HashMap<Uuid, Showtime>,
    bookings: HashMap<Uuid, Booking>,
    tickets: HashMap<Uuid, Ticket>,
    events: HashMap<Uuid, Event>,
    users: HashMap<Uuid, User>,
}

impl Collections {
    /// Проверка версии сеанса перед записью карты.
    fn showtime_for_write(&mut self, id: Uuid, expected_version: i64) -> StoreResult<&mut Showtime> {
        let showtime = self
            .showtimes
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "showtime", id })?;
        if showtime.version != expected_version {
            return Err(StoreError::Conflict { entity: "showtime", id });
        }
        Ok(showtime)
    }

    fn set_ticket_status(&mut self, booking_id: Uuid, status: TicketStatus) {
        for ticket in self.tickets.values_mut().filter(|t| t.booking_id == booking_id) {
            ticket.status = status;
        }
    }
}

/// Хранилище в памяти процесса. Вся запись под одной блокировкой, так что
/// каждая операция атомарна. Клон делит те же данные.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_movies(&self) -> StoreResult<Vec<Movie>> {
        let data = self.inner.read().await;
        let mut movies: Vec<Movie> = data.movies.values().cloned().collect();
        movies.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(movies)
    }

    async fn get_movie(&self, id: Uuid) -> StoreResult<Option<Movie>> {
        Ok(self.inner.read().await.movies.get(&id).cloned())
    }

    async fn insert_movie(&self, movie: &Movie) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        if data.movies.contains_key(&movie.id) {
            return Err(StoreError::Duplicate(format!("movie {}", movie.id)));
        }
        data.movies.insert(movie.id, movie.clone());
        Ok(())
    }

    async fn update_movie(&self, movie: &Movie) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        let slot = data
            .movies
            .get_mut(&movie.id)
            .ok_or(StoreError::NotFound { entity: "movie", id: movie.id })?;
        *slot = movie.clone();
        Ok(())
    }

    async fn delete_movie(&self, id: Uuid) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        if data.showtimes.values().any(|s| s.movie_id == id) {
            return Err(StoreError::InUse {
                entity: "movie",
                reason: "showtimes reference it".into(),
            });
        }
        data.movies
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound { entity: "movie", id })
    }

    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<Showtime>> {
        let data = self.inner.read().await;
        let mut showtimes: Vec<Showtime> = data
            .showtimes
            .values()
            .filter(|s| filter.movie_id.map_or(true, |id| s.movie_id == id))
            .filter(|s| !filter.on_sale_only || s.is_on_sale())
            .cloned()
            .collect();
        showtimes.sort_by_key(|s| s.datetime);
        Ok(showtimes)
    }

    async fn get_showtime(&self, id: Uuid) -> StoreResult<Option<Showtime>> {
        Ok(self.inner.read().await.showtimes.get(&id).cloned())
    }

    async fn insert_showtime(&self, showtime: &Showtime) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        if !data.movies.contains_key(&showtime.movie_id) {
            return Err(StoreError::NotFound { entity: "movie", id: showtime.movie_id });
        }
        if data.showtimes.contains_key(&showtime.id) {
            return Err(StoreError::Duplicate(format!("showtime {}", showtime.id)));
        }
        data.showtimes.insert(showtime.id, showtime.clone());
        Ok(())
    }

    async fn update_showtime(&self, showtime: &Showtime) -> StoreResult<i64> {
        let mut data = self.inner.write().await;
        let slot = data.showtime_for_write(showtime.id, showtime.version)?;
        let mut next = showtime.clone();
        next.replace_seat_map(showtime.seat_map.clone());
        next.version = slot.version + 1;
        *slot = next;
        Ok(slot.version)
    }

    async fn delete_showtime(&self, id: Uuid, expected_version: i64) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        data.showtime_for_write(id, expected_version)?;
        data.showtimes.remove(&id);
        Ok(())
    }

    async fn commit_allocation(&self, commit: AllocationCommit) -> StoreResult<i64> {
        let mut data = self.inner.write().await;
        if data.bookings.contains_key(&commit.booking.id) {
            return Err(StoreError::Duplicate(format!("booking {}", commit.booking.id)));
        }

        let showtime = data.showtime_for_write(commit.showtime_id, commit.expected_version)?;
        showtime.replace_seat_map(commit.seat_map);
        showtime.version += 1;
        showtime.updated_at = commit.at;
        let version = showtime.version;

        if let Some(ticket) = commit.ticket {
            data.tickets.insert(ticket.id, ticket);
        }
        data.bookings.insert(commit.booking.id, commit.booking);
        Ok(version)
    }

    async fn commit_release(&self, commit: ReleaseCommit) -> StoreResult<i64> {
        let mut data = self.inner.write().await;

        // Сначала все проверки, потом запись: иначе операция не атомарна
        let booking_ok = data
            .bookings
            .get(&commit.booking_id)
            .ok_or(StoreError::NotFound { entity: "booking", id: commit.booking_id })?
            .status
            == commit.booking_from;
        if !booking_ok {
            return Err(StoreError::Conflict { entity: "booking", id: commit.booking_id });
        }

        let showtime = data.showtime_for_write(commit.showtime_id, commit.expected_version)?;
        showtime.replace_seat_map(commit.seat_map);
        showtime.version += 1;
        showtime.updated_at = commit.at;
        let version = showtime.version;

        if let Some(booking) = data.bookings.get_mut(&commit.booking_id) {
            booking.status = commit.booking_to;
            booking.updated_at = commit.at;
        }
        if let Some(status) = commit.ticket_status {
            data.set_ticket_status(commit.booking_id, status);
        }
        Ok(version)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let data = self.inner.read().await;
        let mut bookings: Vec<Booking> = data
            .bookings
            .values()
            .filter(|b| filter.showtime_id.map_or(true, |id| b.showtime_id == id))
            .filter(|b| filter.user_id.map_or(true, |id| b.user_id == id))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.inner.read().await.bookings.get(&id).cloned())
    }

    async fn transition_booking(&self, transition: BookingTransition) -> StoreResult<Booking> {
        let mut data = self.inner.write().await;
        let booking = data
            .bookings
            .get_mut(&transition.booking_id)
            .ok_or(StoreError::NotFound { entity: "booking", id: transition.booking_id })?;
        if booking.status != transition.from {
            return Err(StoreError::Conflict { entity: "booking", id: transition.booking_id });
        }

        booking.status = transition.to;
        booking.updated_at = transition.at;
        if transition.to == crate::models::BookingStatus::Paid && booking.paid_at.is_none() {
            booking.paid_at = Some(transition.at);
        }
        let updated = booking.clone();

        if let Some(status) = transition.ticket_status {
            data.set_ticket_status(transition.booking_id, status);
        }
        Ok(updated)
    }

    async fn list_tickets(&self, user_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let data = self.inner.read().await;
        let mut tickets: Vec<Ticket> = data
            .tickets
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date));
        Ok(tickets)
    }

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.inner.read().await.tickets.get(&id).cloned())
    }

    async fn update_ticket_status(
        &self,
        id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
    ) -> StoreResult<Ticket> {
        let mut data = self.inner.write().await;
        let ticket = data
            .tickets
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "ticket", id })?;
        if ticket.status != from {
            return Err(StoreError::Conflict { entity: "ticket", id });
        }
        ticket.status = to;
        Ok(ticket.clone())
    }

    async fn list_events(&self, from: Option<DateTime<Utc>>) -> StoreResult<Vec<Event>> {
        let data = self.inner.read().await;
        let mut events: Vec<Event> = data
            .events
            .values()
            .filter(|e| from.map_or(true, |from| e.is_upcoming(from)))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        if data.events.contains_key(&event.id) {
            return Err(StoreError::Duplicate(format!("event {}", event.id)));
        }
        data.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        if data.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("user with email {}", user.email)));
        }
        data.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let data = self.inner.read().await;
        Ok(data.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut data = self.inner.write().await;
        let slot = data
            .users
            .get_mut(&user.id)
            .ok_or(StoreError::NotFound { entity: "user", id: user.id })?;
        *slot = user.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, MovieInput};
    use crate::seating::{claim_seats, SeatMap, SeatRef};

    async fn seeded() -> (MemoryStore, Showtime) {
        let store = MemoryStore::new();
        let movie = Movie::from_input(MovieInput { title: "Flow".into(), ..Default::default() }, Utc::now());
        store.insert_movie(&movie).await.unwrap();
        let showtime = Showtime::new(
            movie.id,
            Utc::now(),
            "Sal 1".into(),
            "Dansk tale".into(),
            100,
            SeatMap::uniform(2, 2),
            Utc::now(),
        );
        store.insert_showtime(&showtime).await.unwrap();
        (store, showtime)
    }

    #[tokio::test]
    async fn stale_version_is_rejected_without_writing() {
        let (store, showtime) = seeded().await;

        let mut first = showtime.clone();
        first.price = 120;
        assert_eq!(store.update_showtime(&first).await.unwrap(), 1);

        let mut stale = showtime.clone();
        stale.seat_map = claim_seats(&stale.seat_map, &[SeatRef::new(1, 1)]).unwrap();
        assert!(matches!(
            store.update_showtime(&stale).await,
            Err(StoreError::Conflict { entity: "showtime", .. })
        ));

        let current = store.get_showtime(showtime.id).await.unwrap().unwrap();
        assert_eq!(current.price, 120);
        assert_eq!(current.seats_available, 4);
    }

    #[tokio::test]
    async fn movie_with_showtimes_cannot_be_deleted() {
        let (store, showtime) = seeded().await;
        assert!(matches!(
            store.delete_movie(showtime.movie_id).await,
            Err(StoreError::InUse { .. })
        ));

        store.delete_showtime(showtime.id, showtime.version).await.unwrap();
        store.delete_movie(showtime.movie_id).await.unwrap();
        assert!(store.list_movies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn showtime_delete_needs_the_current_version() {
        let (store, showtime) = seeded().await;

        let mut claimed = showtime.clone();
        claimed.seat_map = claim_seats(&claimed.seat_map, &[SeatRef::new(2, 2)]).unwrap();
        store.update_showtime(&claimed).await.unwrap();

        assert!(matches!(
            store.delete_showtime(showtime.id, showtime.version).await,
            Err(StoreError::Conflict { entity: "showtime", .. })
        ));
        assert!(store.get_showtime(showtime.id).await.unwrap().is_some());

        store.delete_showtime(showtime.id, showtime.version + 1).await.unwrap();
        assert!(matches!(
            store.delete_showtime(showtime.id, showtime.version + 1).await,
            Err(StoreError::NotFound { entity: "showtime", .. })
        ));
    }

    #[tokio::test]
    async fn booking_transition_checks_the_current_status() {
        let (store, showtime) = seeded().await;
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Test".into(),
            user_email: "test@example.com".into(),
            showtime_id: showtime.id,
            movie_id: showtime.movie_id,
            movie_title: "Flow".into(),
            seats: vec![SeatRef::new(1, 1)],
            price_per_seat: 100,
            total_price: 100,
            datetime: showtime.datetime,
            auditorium: showtime.auditorium.clone(),
            language: showtime.language.clone(),
            status: BookingStatus::Pending,
            payment_reference: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        store
            .commit_allocation(AllocationCommit {
                showtime_id: showtime.id,
                expected_version: 0,
                seat_map: claim_seats(&showtime.seat_map, &booking.seats).unwrap(),
                booking: booking.clone(),
                ticket: None,
                at: now,
            })
            .await
            .unwrap();

        let wrong_from = BookingTransition {
            booking_id: booking.id,
            from: BookingStatus::Paid,
            to: BookingStatus::Refunded,
            ticket_status: None,
            at: now,
        };
        assert!(matches!(
            store.transition_booking(wrong_from).await,
            Err(StoreError::Conflict { entity: "booking", .. })
        ));

        let paid = store
            .transition_booking(BookingTransition {
                booking_id: booking.id,
                from: BookingStatus::Pending,
                to: BookingStatus::Paid,
                ticket_status: None,
                at: now,
            })
            .await
            .unwrap();
        assert_eq!(paid.status, BookingStatus::Paid);
        assert!(paid.paid_at.is_some());
    }
}
