use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub const PROJECTIONS_AT_SAME_TIME: &str =
    "Cannot create new projection, there are projections at same time already.";
pub const PROJECTION_IN_PAST: &str = "Projection time cannot be in past.";

/// Outcome of a booking operation that did not succeed.
///
/// A missing entity and a failing store stay separate variants so callers
/// can tell "nothing to act on" apart from "the database broke".
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: i32 },

    #[error("{}", PROJECTIONS_AT_SAME_TIME)]
    ScheduleConflict,

    #[error("{entity} with name {name:?} already exists")]
    NameCollision { entity: &'static str, name: String },

    #[error("seat {seat_id} is already reserved for projection {projection_id}")]
    SeatTaken { projection_id: i32, seat_id: i32 },

    #[error("{0}")]
    Invalid(String),

    #[error("store failure: {0}")]
    Store(#[from] sea_orm::DbErr),
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ScheduleConflict | Self::NameCollision { .. } | Self::SeatTaken { .. } => {
                StatusCode::CONFLICT
            },
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;

#[derive(Debug)]
pub struct AppError(BookingError);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for AppError {}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
