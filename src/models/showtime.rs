use super::{seat_count, UnknownStatus};
use crate::seating::SeatMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_AUDITORIUM: &str = "Sal 1";
pub const DEFAULT_LANGUAGE: &str = "Dansk tale";
pub const DEFAULT_PRICE: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowtimeStatus {
    #[default]
    OnSale,
    Cancelled,
}

impl ShowtimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShowtimeStatus::OnSale => "on_sale",
            ShowtimeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ShowtimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ShowtimeStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "on_sale" => Ok(ShowtimeStatus::OnSale),
            "cancelled" => Ok(ShowtimeStatus::Cancelled),
            _ => Err(UnknownStatus(value)),
        }
    }
}

/// Сеанс. `seat_map` - авторитетное состояние мест, `version` - токен
/// оптимистичной блокировки, растет на каждой записи.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Showtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub datetime: DateTime<Utc>,
    pub auditorium: String,
    pub language: String,
    pub price: i64,
    pub total_seats: i32,
    pub seats_available: i32,
    pub seat_map: SeatMap,
    pub status: ShowtimeStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Showtime {
    pub fn new(
        movie_id: Uuid,
        datetime: DateTime<Utc>,
        auditorium: String,
        language: String,
        price: i64,
        seat_map: SeatMap,
        now: DateTime<Utc>,
    ) -> Self {
        let mut showtime = Showtime {
            id: Uuid::new_v4(),
            movie_id,
            datetime,
            auditorium,
            language,
            price,
            total_seats: 0,
            seats_available: 0,
            seat_map: SeatMap::uniform(0, 0),
            status: ShowtimeStatus::OnSale,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        showtime.replace_seat_map(seat_map);
        showtime
    }

    /// Единственный способ поменять карту: счетчики пересчитываются из нее.
    pub fn replace_seat_map(&mut self, seat_map: SeatMap) {
        self.total_seats = seat_count(seat_map.total_seats());
        self.seats_available = seat_count(seat_map.seats_available());
        self.seat_map = seat_map;
    }

    pub fn is_on_sale(&self) -> bool {
        self.status == ShowtimeStatus::OnSale
    }

    pub fn apply(&mut self, update: ShowtimeUpdate, now: DateTime<Utc>) {
        if let Some(datetime) = update.datetime {
            self.datetime = datetime;
        }
        if let Some(auditorium) = update.auditorium {
            self.auditorium = auditorium.trim().to_string();
        }
        if let Some(language) = update.language {
            self.language = language.trim().to_string();
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

fn default_auditorium() -> String {
    DEFAULT_AUDITORIUM.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_price() -> i64 {
    DEFAULT_PRICE
}

/// Новый сеанс. Карта мест: явно переданная, либо сгенерированная по
/// размерам, либо по умолчанию для зала.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeInput {
    pub movie_id: Uuid,
    pub datetime: DateTime<Utc>,
    #[serde(default = "default_auditorium")]
    #[validate(length(min = 1, max = 100))]
    pub auditorium: String,
    #[serde(default = "default_language")]
    #[validate(length(min = 1, max = 100))]
    pub language: String,
    #[serde(default = "default_price")]
    #[validate(range(min = 0))]
    pub price: i64,
    #[serde(default)]
    pub status: ShowtimeStatus,
    #[validate(range(min = 1, max = 200))]
    pub rows: Option<u16>,
    #[validate(range(min = 1, max = 200))]
    pub cols: Option<u16>,
    #[serde(default)]
    pub seat_map: Option<SeatMap>,
}

/// Правка метаданных сеанса. Карта мест здесь не меняется.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeUpdate {
    pub datetime: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 100))]
    pub auditorium: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub language: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    pub status: Option<ShowtimeStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seating::SeatRef;

    #[test]
    fn counters_follow_the_seat_map() {
        let mut showtime = Showtime::new(
            Uuid::new_v4(),
            Utc::now(),
            default_auditorium(),
            default_language(),
            DEFAULT_PRICE,
            SeatMap::generate(8, 12),
            Utc::now(),
        );
        assert_eq!((showtime.total_seats, showtime.seats_available), (96, 94));

        let mut map = showtime.seat_map.clone();
        map.set_status(SeatRef::new(1, 1), crate::seating::SeatStatus::Taken).unwrap();
        showtime.replace_seat_map(map);
        assert_eq!(showtime.seats_available, 93);
    }

    #[test]
    fn input_defaults_match_the_first_auditorium() {
        let input: ShowtimeInput = serde_json::from_value(serde_json::json!({
            "movieId": Uuid::new_v4(),
            "datetime": "2026-11-01T19:30:00Z"
        }))
        .unwrap();

        assert_eq!(input.auditorium, "Sal 1");
        assert_eq!(input.language, "Dansk tale");
        assert_eq!(input.price, 100);
        assert_eq!(input.status, ShowtimeStatus::OnSale);
        assert!(input.seat_map.is_none());
    }
}
