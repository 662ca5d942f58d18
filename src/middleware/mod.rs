use crate::error::AppError;
use crate::services::auth::{AuthError, Claims};
use crate::services::booking::Customer;
use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use uuid::Uuid;

/// Пользователь из Bearer токена.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub admin: bool,
    pub claims: Claims,
}

impl AuthUser {
    pub fn customer(&self) -> Customer {
        Customer {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Пользователь с флагом администратора в токене.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Email и пароль из `Authorization: Basic`.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub email: String,
    pub password: String,
}

fn authorization<'a>(parts: &'a Parts, scheme: &str) -> Result<&'a str, AuthError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(scheme))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingCredentials)
}

// Bearer token extractor
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = authorization(parts, "Bearer ")?;
        let claims = state.auth.verify_token(token).await?;

        Ok(AuthUser {
            id: claims.sub,
            name: claims.name.clone(),
            email: claims.email.clone(),
            admin: claims.admin,
            claims,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.admin {
            return Err(AuthError::AdminRequired.into());
        }
        Ok(AdminUser(user))
    }
}

// Basic Auth extractor
impl<S: Send + Sync> FromRequestParts<S> for BasicCredentials {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let encoded = authorization(parts, "Basic ")?;

        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| AuthError::MissingCredentials)?;
        let credentials = String::from_utf8(decoded).map_err(|_| AuthError::MissingCredentials)?;

        // Разделяем email:password
        let (email, password) = credentials
            .split_once(':')
            .ok_or(AuthError::MissingCredentials)?;
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials.into());
        }

        Ok(BasicCredentials {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}
