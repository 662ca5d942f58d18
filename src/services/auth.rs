//! Учетные записи и сессии.
//!
//! Пароли хэшируются bcrypt в blocking пуле. Сессия - JWT с флагом `admin`;
//! флаг ставится вне приложения (`grant-admin`) и попадает в токен при
//! следующем входе.

use crate::cache::CacheService;
use crate::config::JwtConfig;
use crate::error::AppError;
use crate::models::{ProfilePictureInput, User, UserProfile};
use crate::store::{Store, StoreError};
use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("an account with this email already exists")]
    EmailInUse,

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("password must be at least 6 characters")]
    WeakPassword,

    #[error("name is required")]
    MissingName,

    #[error("no account found for this email")]
    UserNotFound,

    #[error("wrong password")]
    WrongPassword,

    #[error("too many failed sign-in attempts, try again later")]
    TooManyAttempts,

    #[error("authentication required")]
    MissingCredentials,

    #[error("session is invalid or expired")]
    InvalidToken,

    #[error("administrator access required")]
    AdminRequired,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("storage error")]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::EmailInUse => StatusCode::CONFLICT,
            AuthError::InvalidEmail | AuthError::WeakPassword | AuthError::MissingName => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AuthError::UserNotFound
            | AuthError::WrongPassword
            | AuthError::MissingCredentials
            | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            AuthError::AdminRequired => StatusCode::FORBIDDEN,
            AuthError::Hashing(_) | AuthError::Token(_) | AuthError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::EmailInUse => "email_in_use",
            AuthError::InvalidEmail => "invalid_email",
            AuthError::WeakPassword => "weak_password",
            AuthError::MissingName => "missing_name",
            AuthError::UserNotFound => "user_not_found",
            AuthError::WrongPassword => "wrong_password",
            AuthError::TooManyAttempts => "too_many_attempts",
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidToken => "invalid_token",
            AuthError::AdminRequired => "admin_required",
            AuthError::Hashing(_) | AuthError::Token(_) | AuthError::Store(_) => "internal_error",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub admin: bool,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    cache: Option<CacheService>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, cache: Option<CacheService>, config: &JwtConfig) -> Self {
        Self {
            store,
            cache,
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            session_ttl: Duration::hours(config.expires_in_hours.max(1)),
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<Session, AuthError> {
        let request = SignUpRequest {
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            password: request.password,
        };
        if let Err(errors) = request.validate() {
            let fields = errors.field_errors();
            return Err(if fields.contains_key("email") {
                AuthError::InvalidEmail
            } else if fields.contains_key("password") {
                AuthError::WeakPassword
            } else {
                AuthError::MissingName
            });
        }

        if self.store.find_user_by_email(&request.email).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let password_hash = hash_password(request.password, self.bcrypt_cost).await?;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: request.email,
            name: request.name,
            password_hash,
            profile_picture_id: None,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            // Гонка двух регистраций на один email
            Err(StoreError::Duplicate(_)) => return Err(AuthError::EmailInUse),
            Err(e) => return Err(e.into()),
        }
        info!("User {} signed up", user.id);
        self.issue_session(&user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        self.ensure_not_locked(&email).await?;

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            self.note_failed_login(&email).await;
            return Err(AuthError::UserNotFound);
        };
        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            self.note_failed_login(&email).await;
            return Err(AuthError::WrongPassword);
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.clear_failed_logins(&email).await {
                warn!("Failed to reset login attempts for {}: {}", email, e);
            }
        }
        info!("User {} signed in", user.id);
        self.issue_session(&user)
    }

    /// Отзывает токен до конца его срока. Без кэша токен просто истечет.
    pub async fn sign_out(&self, claims: &Claims) {
        let Some(cache) = &self.cache else {
            return;
        };
        let ttl = u64::try_from(claims.exp - Utc::now().timestamp()).unwrap_or(0);
        if ttl == 0 {
            return;
        }
        if let Err(e) = cache.revoke_token(claims.jti, ttl).await {
            warn!("Failed to revoke session {}: {}", claims.jti, e);
        }
    }

    pub async fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AuthError::InvalidToken)?
            .claims;

        if let Some(cache) = &self.cache {
            match cache.is_token_revoked(claims.jti).await {
                Ok(true) => return Err(AuthError::InvalidToken),
                Ok(false) => {}
                Err(e) => warn!("Revocation check failed, accepting token: {}", e),
            }
        }
        Ok(claims)
    }

    pub async fn user(&self, id: Uuid) -> Result<User, AuthError> {
        self.store.get_user(id).await?.ok_or(AuthError::UserNotFound)
    }

    /// Ставит или снимает флаг администратора. Действует со следующего входа.
    pub async fn set_admin(&self, email: &str, admin: bool) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let mut user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        user.is_admin = admin;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        info!("Admin claim for {} set to {}", user.id, admin);
        Ok(user)
    }

    pub async fn set_profile_picture(
        &self,
        user_id: Uuid,
        input: ProfilePictureInput,
    ) -> Result<User, AppError> {
        input.validate()?;
        let mut user = self.user(user_id).await?;
        user.profile_picture_id = Some(input.profile_picture_id);
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        Ok(user)
    }

    fn issue_session(&self, user: &User) -> Result<Session, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.session_ttl;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            admin: user.is_admin,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(Session {
            token,
            expires_at,
            user: user.profile(),
        })
    }

    async fn ensure_not_locked(&self, email: &str) -> Result<(), AuthError> {
        if !cfg!(feature = "rate-limiting") {
            return Ok(());
        }
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        match cache.login_locked(email).await {
            Ok(true) => Err(AuthError::TooManyAttempts),
            Ok(false) => Ok(()),
            Err(e) => {
                warn!("Login throttle check failed: {}", e);
                Ok(())
            }
        }
    }

    async fn note_failed_login(&self, email: &str) {
        if !cfg!(feature = "rate-limiting") {
            return;
        }
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.record_failed_login(email).await {
                warn!("Failed to record login attempt: {}", e);
            }
        }
    }
}

async fn hash_password(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}
