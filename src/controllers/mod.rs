pub mod admin;
#[cfg(feature = "analytics")]
pub mod analytics;
pub mod auth;
pub mod bookings;
pub mod events;
pub mod movies;
pub mod showtimes;
pub mod users;

use crate::AppState;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn routes() -> Router<Arc<AppState>> {
    let router = Router::new()
        .merge(auth::routes())
        .merge(movies::routes())
        .merge(events::routes())
        .merge(showtimes::routes())
        .merge(bookings::routes())
        .merge(users::routes())
        .merge(admin::routes());

    #[cfg(feature = "analytics")]
    let router = router.merge(analytics::routes());

    router
}

/// Полное приложение: `/health` и API под `/api`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Malling Bio API v1.0" }))
        .route("/health", get(health))
        .nest("/api", routes())
        .with_state(state)
        // Фронтенд ходит с токеном в заголовке, cookies не используются
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
