//! Админ-панель: каталог, арранжементы, сеансы, ручные брони, билеты.
//! Все маршруты требуют флаг администратора в токене.

use crate::error::AppError;
use crate::middleware::AdminUser;
use crate::models::{EventInput, ManualBookingInput, MovieInput, ShowtimeInput, ShowtimeUpdate};
use crate::services::admin::{BookingStatusUpdate, SeatOverride};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/movies", get(list_movies).post(create_movie))
        .route("/admin/movies/{id}", put(update_movie).delete(delete_movie))
        .route("/admin/events", post(create_event))
        .route("/admin/showtimes", get(list_showtimes).post(create_showtime))
        .route(
            "/admin/showtimes/{id}",
            put(update_showtime).delete(delete_showtime),
        )
        .route("/admin/showtimes/{id}/seats", put(override_seat))
        .route("/admin/bookings", get(list_bookings).post(create_booking))
        .route("/admin/bookings/{id}/status", put(update_booking_status))
        .route("/admin/tickets/{id}/use", post(mark_ticket_used))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminFilter {
    movie_id: Option<Uuid>,
    showtime_id: Option<Uuid>,
}

/* ---------- EVENTS ---------- */

async fn create_event(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<EventInput>,
) -> Result<impl IntoResponse, AppError> {
    let event = state.admin.create_event(req).await?;
    info!("Admin {} created event {}", admin.id, event.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "event": event })),
    ))
}

/* ---------- MOVIES ---------- */

async fn list_movies(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let movies = state.admin.movies().await?;
    Ok(Json(json!({ "success": true, "movies": movies })))
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<MovieInput>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state.admin.create_movie(req).await?;
    info!("Admin {} created movie {}", admin.id, movie.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "movie": movie })),
    ))
}

async fn update_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<MovieInput>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state.admin.update_movie(id, req).await?;
    Ok(Json(json!({ "success": true, "movie": movie })))
}

async fn delete_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.admin.delete_movie(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/* ---------- SHOWTIMES ---------- */

async fn list_showtimes(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<AdminFilter>,
) -> Result<impl IntoResponse, AppError> {
    let showtimes = state.admin.showtimes(filter.movie_id).await?;
    Ok(Json(json!({ "success": true, "showtimes": showtimes })))
}

async fn create_showtime(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<ShowtimeInput>,
) -> Result<impl IntoResponse, AppError> {
    let showtime = state.admin.create_showtime(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "showtime": showtime })),
    ))
}

async fn update_showtime(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ShowtimeUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let showtime = state.admin.update_showtime(id, req).await?;
    Ok(Json(json!({ "success": true, "showtime": showtime })))
}

async fn delete_showtime(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.admin.delete_showtime(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// PUT /api/admin/showtimes/{id}/seats  { row, seat, status }
async fn override_seat(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SeatOverride>,
) -> Result<impl IntoResponse, AppError> {
    info!(
        "Admin {} sets seat {}-{} of showtime {} to {}",
        admin.id, req.row, req.seat, id, req.status
    );
    let showtime = state.admin.set_seat_status(id, req).await?;
    Ok(Json(json!({ "success": true, "showtime": showtime })))
}

/* ---------- BOOKINGS & TICKETS ---------- */

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<AdminFilter>,
) -> Result<impl IntoResponse, AppError> {
    let bookings = state.admin.bookings(filter.showtime_id).await?;
    Ok(Json(json!({ "success": true, "bookings": bookings })))
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<ManualBookingInput>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.admin.create_booking(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "booking": booking })),
    ))
}

async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<BookingStatusUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.admin.set_booking_status(id, req.status).await?;
    Ok(Json(json!({ "success": true, "booking": booking })))
}

async fn mark_ticket_used(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state.admin.mark_ticket_used(id).await?;
    Ok(Json(json!({ "success": true, "ticket": ticket })))
}
