use crate::error::AppError;
use crate::services::catalog::MovieQuery;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/{id}", get(get_movie))
        .route("/movies/{id}/showtimes", get(movie_showtimes))
}

// GET /api/movies?category=popular&q=...
async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MovieQuery>,
) -> impl IntoResponse {
    let movies = state.catalog.movies(&query).await;
    Json(json!({ "success": true, "movies": movies }))
}

// GET /api/movies/{id}
async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state.catalog.movie(id).await?;
    Ok(Json(json!({ "success": true, "movie": movie })))
}

// GET /api/movies/{id}/showtimes
async fn movie_showtimes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state.catalog.movie(id).await?;
    let showtimes = state.catalog.showtimes_for_movie(movie.id).await;
    Ok(Json(json!({ "success": true, "showtimes": showtimes })))
}
