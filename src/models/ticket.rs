use super::{seat_count, Booking, Movie, UnknownStatus};
use crate::seating::SeatRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "active",
            TicketStatus::Used => "used",
            TicketStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(TicketStatus::Active),
            "used" => Ok(TicketStatus::Used),
            "cancelled" => Ok(TicketStatus::Cancelled),
            _ => Err(UnknownStatus(value)),
        }
    }
}

/// Билет покупателя: снимок фильма и сеанса на момент покупки.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub movie_id: Uuid,
    pub movie_title: String,
    pub movie_poster_url: String,
    pub showtime_id: Uuid,
    pub datetime: DateTime<Utc>,
    pub auditorium: String,
    pub language: String,
    pub price_per_seat: i64,
    #[sqlx(json)]
    pub seats: Vec<SeatRef>,
    pub total_price: i64,
    pub total_seats: i32,
    pub purchase_date: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
}

impl Ticket {
    pub fn for_booking(booking: &Booking, movie: &Movie) -> Self {
        Ticket {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            user_id: booking.user_id,
            user_email: booking.user_email.clone(),
            movie_id: booking.movie_id,
            movie_title: booking.movie_title.clone(),
            movie_poster_url: movie.poster_url.clone(),
            showtime_id: booking.showtime_id,
            datetime: booking.datetime,
            auditorium: booking.auditorium.clone(),
            language: booking.language.clone(),
            price_per_seat: booking.price_per_seat,
            seats: booking.seats.clone(),
            total_price: booking.total_price,
            total_seats: seat_count(booking.seats.len()),
            purchase_date: booking.created_at,
            status: TicketStatus::Active,
        }
    }
}
