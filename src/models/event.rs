use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Арранжемент: показ вне обычной сетки сеансов (премьера, фестиваль).
/// Билеты на него через карту мест не продаются.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub date: DateTime<Utc>,
    pub location: Option<String>,
    pub price: Option<i64>,
    pub available_seats: Option<i32>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    #[validate(length(min = 1, max = 200, message = "an event must have a title"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    pub image_url: Option<String>,
    pub date: DateTime<Utc>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 0))]
    pub available_seats: Option<i32>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Event {
    pub fn from_input(input: EventInput, now: DateTime<Utc>) -> Self {
        Event {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            description: input.description,
            image_url: non_blank(input.image_url),
            date: input.date,
            location: non_blank(input.location),
            price: input.price,
            available_seats: input.available_seats,
            category: non_blank(input.category),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.date >= now
    }
}
