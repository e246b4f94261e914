//! HTTP error mapping.
//!
//! Every failed request answers with `{ "error": <message>, "code": <CODE> }`.
//!
//! | Source                     | Status | Code                  |
//! |----------------------------|--------|-----------------------|
//! | `CoreError::NotFound`      | 404    | `NOT_FOUND`           |
//! | `CoreError::Validation`    | 400    | `VALIDATION_ERROR`    |
//! | `CoreError::Configuration` | 400    | `CONFIGURATION_ERROR` |
//! | `CoreError::Conflict`      | 409    | `CONFLICT`            |
//! | `AppError::BadRequest`     | 400    | `BAD_REQUEST`         |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gpuplan_core::error::CoreError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Raised by the catalog, the estimators or request validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A request that is well-formed but inconsistent, e.g. a body id that
    /// contradicts the path.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl AppError {
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Core(CoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Core(CoreError::Validation(_)) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Core(CoreError::Configuration(_)) => {
                (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR")
            }
            Self::Core(CoreError::Conflict(_)) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        }
    }

    /// Message shown to clients; drops the `Display` prefixes.
    fn client_message(&self) -> String {
        match self {
            Self::Core(CoreError::NotFound { entity, id }) => {
                format!("{entity} with id {id} not found")
            }
            Self::Core(
                CoreError::Validation(msg)
                | CoreError::Configuration(msg)
                | CoreError::Conflict(msg),
            )
            | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        tracing::debug!(code, error = %self, "Request rejected");

        let body = ErrorBody {
            error: self.client_message(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
