use crate::services::catalog::EventQuery;
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(list_events))
}

// GET /api/events?upcoming=true
async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventQuery>,
) -> impl IntoResponse {
    let events = state.catalog.events(&query).await;
    Json(json!({ "success": true, "events": events }))
}
