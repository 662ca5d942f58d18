//! analytics.rs
//!
//! Сводка продаж по сеансу для админки:
//! - места по статусам (свободные, занятые, для колясок);
//! - брони по статусам;
//! - выручка по оплаченным броням.

use crate::error::AppError;
use crate::middleware::AdminUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Определяет маршруты, связанные с аналитикой.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/showtimes/{id}/summary", get(showtime_summary))
}

/// GET /api/admin/showtimes/{id}/summary
async fn showtime_summary(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.admin.showtime_summary(id).await?;
    Ok(Json(json!({ "success": true, "summary": summary })))
}
