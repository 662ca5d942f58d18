use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::booking::CheckoutRequest;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/bookings", get(list_bookings))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/tickets", get(list_tickets))
        .route("/tickets/{id}", get(get_ticket))
}

/* ---------- CHECKOUT ---------- */

// POST /api/checkout
async fn checkout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let purchase = state.bookings.checkout(&user.customer(), req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "booking": purchase.booking,
            "ticket": purchase.ticket,
        })),
    ))
}

/* ---------- BOOKINGS ---------- */

// GET /api/bookings
async fn list_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let bookings = state.bookings.bookings(&user.customer()).await?;
    Ok(Json(json!({ "success": true, "bookings": bookings })))
}

// POST /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.bookings.cancel(&user.customer(), id).await?;
    Ok(Json(json!({ "success": true, "booking": booking })))
}

/* ---------- TICKETS ---------- */

// GET /api/tickets
async fn list_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let tickets = state.bookings.tickets(&user.customer()).await?;
    Ok(Json(json!({ "success": true, "tickets": tickets })))
}

// GET /api/tickets/{id}
async fn get_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state.bookings.ticket(&user.customer(), id).await?;
    Ok(Json(json!({ "success": true, "ticket": ticket })))
}
