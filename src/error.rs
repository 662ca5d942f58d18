use crate::seating::{AllocationError, SeatMapError, SelectionError};
use crate::services::auth::AuthError;
use crate::services::payment::PaymentError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

/// Ошибка уровня HTTP. Каждый вариант знает свой статус и машинный код.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    SeatMap(#[from] SeatMapError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("internal error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => AppError::NotFound(format!("{} {}", entity, id)),
            StoreError::Conflict { entity, .. } => AppError::Conflict(format!(
                "{} was changed by someone else, please retry",
                entity
            )),
            StoreError::Duplicate(what) => AppError::Conflict(format!("{} already exists", what)),
            StoreError::InUse { entity, reason } => {
                AppError::Conflict(format!("{} cannot be deleted: {}", entity, reason))
            }
            other => AppError::Store(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(err) => err.status(),
            AppError::Allocation(AllocationError::SeatsUnavailable { .. }) => StatusCode::CONFLICT,
            AppError::Allocation(_) | AppError::Selection(_) | AppError::SeatMap(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Payment(PaymentError::Declined(_)) => StatusCode::PAYMENT_REQUIRED,
            AppError::Payment(PaymentError::CircuitOpen) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Payment(PaymentError::Gateway(_)) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(err) => err.code(),
            AppError::Allocation(AllocationError::SeatsUnavailable { .. }) => "seats_unavailable",
            AppError::Allocation(_) => "invalid_seat_request",
            AppError::Selection(_) => "invalid_selection",
            AppError::SeatMap(_) => "invalid_seat_map",
            AppError::Payment(PaymentError::Declined(_)) => "payment_declined",
            AppError::Payment(_) => "payment_unavailable",
            AppError::Validation(_) => "validation_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Forbidden(_) => "forbidden",
            AppError::Store(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }

        let mut body = json!({
            "success": false,
            "code": self.code(),
            "error": self.to_string(),
        });
        // Клиенту нужен список потерянных мест, чтобы предложить перевыбор
        if let AppError::Allocation(AllocationError::SeatsUnavailable { seats }) = &self {
            body["seats"] = json!(seats);
        }

        (status, Json(body)).into_response()
    }
}
