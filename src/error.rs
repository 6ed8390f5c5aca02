use crate::{backend::BackendError, slots::SlotError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("Unknown service '{0}'")]
    UnknownService(String),

    #[error("Unknown add-on '{0}'")]
    UnknownAddon(String),

    #[error(transparent)]
    InvalidSlot(#[from] SlotError),

    #[error("The selected time slot is not available for the requested service duration")]
    SlotUnavailable,

    #[error("Appointments must be booked in the future")]
    AppointmentInPast,

    #[error("{0}")]
    InvalidTransition(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Failed to read frontend file: {0}")]
    Frontend(#[from] std::io::Error),

    #[error("Storage failure: {0}")]
    Storage(BackendError),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::BookingNotFound(id) => AppError::BookingNotFound(id),
            BackendError::SlotTaken { .. } => AppError::SlotUnavailable,
            other => AppError::Storage(other),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BookingNotFound(_) => StatusCode::NOT_FOUND,
            AppError::UnknownService(_)
            | AppError::UnknownAddon(_)
            | AppError::InvalidSlot(_)
            | AppError::AppointmentInPast => StatusCode::BAD_REQUEST,
            AppError::SlotUnavailable | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Frontend(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(err = %self, "Request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
