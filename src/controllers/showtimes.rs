use crate::error::AppError;
use crate::services::booking::QuoteRequest;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes/{id}", get(get_showtime))
        .route("/showtimes/{id}/quote", post(quote))
}

// GET /api/showtimes/{id}: сеанс, карта мест и раскладка зала
async fn get_showtime(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.catalog.showtime(id).await?;
    Ok(Json(json!({ "success": true, "showtime": details })))
}

// POST /api/showtimes/{id}/quote
async fn quote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<QuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quote = state.bookings.quote(id, &req.seats).await?;
    Ok(Json(json!({ "success": true, "quote": quote })))
}
