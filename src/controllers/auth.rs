use crate::error::AppError;
use crate::middleware::{AuthUser, BasicCredentials};
use crate::services::auth::SignUpRequest;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

// POST /api/auth/signup
async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.sign_up(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "session": session })),
    ))
}

// POST /api/auth/login, учетные данные в Basic
async fn login(
    State(state): State<Arc<AppState>>,
    creds: BasicCredentials,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.sign_in(&creds.email, &creds.password).await?;
    Ok(Json(json!({ "success": true, "session": session })))
}

// POST /api/auth/logout
async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> impl IntoResponse {
    state.auth.sign_out(&user.claims).await;
    StatusCode::NO_CONTENT
}

// GET /api/auth/me
async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth.user(user.id).await?.profile();
    Ok(Json(json!({ "success": true, "user": profile, "admin": user.admin })))
}
