use super::UnknownStatus;
use crate::seating::SeatRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Paid,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
            BookingStatus::Refunded => "refunded",
        }
    }

    /// Бронь держит места, пока не возвращена.
    pub fn holds_seats(&self) -> bool {
        !matches!(self, BookingStatus::Refunded)
    }

    /// Разрешенные ручные переходы из админки.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Paid)
                | (BookingStatus::Pending, BookingStatus::Refunded)
                | (BookingStatus::Paid, BookingStatus::Refunded)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "paid" => Ok(BookingStatus::Paid),
            "refunded" => Ok(BookingStatus::Refunded),
            _ => Err(UnknownStatus(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub showtime_id: Uuid,
    pub movie_id: Uuid,
    pub movie_title: String,
    #[sqlx(json)]
    pub seats: Vec<SeatRef>,
    pub price_per_seat: i64,
    pub total_price: i64,
    pub datetime: DateTime<Utc>,
    pub auditorium: String,
    pub language: String,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn holds(&self, seat: SeatRef) -> bool {
        self.status.holds_seats() && self.seats.contains(&seat)
    }
}

/// Ручная бронь из админки: места занимаются, оплата не проводится.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ManualBookingInput {
    pub user_id: Uuid,
    pub showtime_id: Uuid,
    #[validate(length(min = 1, message = "select at least one seat"))]
    pub seats: Vec<SeatRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_transitions_are_allowed() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Refunded));
        assert!(Paid.can_transition_to(Refunded));

        assert!(!Paid.can_transition_to(Pending));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(!Refunded.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Paid));
    }

    #[test]
    fn status_text_round_trips_through_the_column_form() {
        for status in [BookingStatus::Pending, BookingStatus::Paid, BookingStatus::Refunded] {
            assert_eq!(BookingStatus::try_from(status.as_str().to_string()), Ok(status));
        }
        assert!(BookingStatus::try_from("void".to_string()).is_err());
    }
}
