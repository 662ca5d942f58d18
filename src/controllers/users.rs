use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::ProfilePictureInput;
use crate::AppState;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/me", get(profile))
        .route("/users/me/profile-picture", put(set_profile_picture))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.user(user.id).await?;
    Ok(Json(json!({ "success": true, "user": user.profile() })))
}

async fn set_profile_picture(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ProfilePictureInput>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.set_profile_picture(user.id, req).await?;
    Ok(Json(json!({ "success": true, "user": user.profile() })))
}
