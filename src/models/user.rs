use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Количество доступных аватарок (id 1..=4).
pub const PROFILE_PICTURES: i16 = 4;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub profile_picture_id: Option<i16>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            profile_picture_id: self.profile_picture_id,
            is_admin: self.is_admin,
            created_at: self.created_at,
        }
    }
}

/// То, что уходит клиенту. Хэш пароля наружу не попадает.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub profile_picture_id: Option<i16>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePictureInput {
    #[validate(range(min = 1, max = PROFILE_PICTURES, message = "unknown profile picture"))]
    pub profile_picture_id: i16,
}
