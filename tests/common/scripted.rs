//! Обертка над `MemoryStore` для сценариев с гонками и сбоями хранилища.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use malling_bio::models::{Booking, Event, Movie, Showtime, Ticket, TicketStatus, User};
use malling_bio::store::{
    AllocationCommit, BookingFilter, BookingTransition, MemoryStore, ReleaseCommit,
    ShowtimeFilter, Store, StoreError, StoreResult,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

type Hook = BoxFuture<'static, ()>;

pub struct ScriptedStore {
    inner: MemoryStore,
    reads_fail: AtomicBool,
    after_booking_list: Mutex<Option<Hook>>,
}

impl ScriptedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            reads_fail: AtomicBool::new(false),
            after_booking_list: Mutex::new(None),
        }
    }

    /// Чтения фильмов и сеансов начинают падать.
    pub fn fail_reads(&self) {
        self.reads_fail.store(true, Ordering::SeqCst);
    }

    /// Выполнить `hook` один раз: после того как `list_bookings` прочитал
    /// данные, но до того как вызывающий их получил.
    pub fn after_next_booking_list(&self, hook: Hook) {
        *self.after_booking_list.lock().unwrap() = Some(hook);
    }

    fn check_reads(&self) -> StoreResult<()> {
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Malformed("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for ScriptedStore {
    async fn list_movies(&self) -> StoreResult<Vec<Movie>> {
        self.check_reads()?;
        self.inner.list_movies().await
    }

    async fn get_movie(&self, id: Uuid) -> StoreResult<Option<Movie>> {
        self.check_reads()?;
        self.inner.get_movie(id).await
    }

    async fn insert_movie(&self, movie: &Movie) -> StoreResult<()> {
        self.inner.insert_movie(movie).await
    }

    async fn update_movie(&self, movie: &Movie) -> StoreResult<()> {
        self.inner.update_movie(movie).await
    }

    async fn delete_movie(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete_movie(id).await
    }

    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<Showtime>> {
        self.check_reads()?;
        self.inner.list_showtimes(filter).await
    }

    async fn get_showtime(&self, id: Uuid) -> StoreResult<Option<Showtime>> {
        self.check_reads()?;
        self.inner.get_showtime(id).await
    }

    async fn insert_showtime(&self, showtime: &Showtime) -> StoreResult<()> {
        self.inner.insert_showtime(showtime).await
    }

    async fn update_showtime(&self, showtime: &Showtime) -> StoreResult<i64> {
        self.inner.update_showtime(showtime).await
    }

    async fn delete_showtime(&self, id: Uuid, expected_version: i64) -> StoreResult<()> {
        self.inner.delete_showtime(id, expected_version).await
    }

    async fn commit_allocation(&self, commit: AllocationCommit) -> StoreResult<i64> {
        self.inner.commit_allocation(commit).await
    }

    async fn commit_release(&self, commit: ReleaseCommit) -> StoreResult<i64> {
        self.inner.commit_release(commit).await
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let bookings = self.inner.list_bookings(filter).await;
        let hook = self.after_booking_list.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        bookings
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        self.inner.get_booking(id).await
    }

    async fn transition_booking(&self, transition: BookingTransition) -> StoreResult<Booking> {
        self.inner.transition_booking(transition).await
    }

    async fn list_tickets(&self, user_id: Uuid) -> StoreResult<Vec<Ticket>> {
        self.inner.list_tickets(user_id).await
    }

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        self.inner.get_ticket(id).await
    }

    async fn update_ticket_status(
        &self,
        id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
    ) -> StoreResult<Ticket> {
        self.inner.update_ticket_status(id, from, to).await
    }

    async fn list_events(&self, from: Option<DateTime<Utc>>) -> StoreResult<Vec<Event>> {
        self.inner.list_events(from).await
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        self.inner.insert_event(event).await
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.inner.insert_user(user).await
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.inner.get_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.inner.update_user(user).await
    }
}
