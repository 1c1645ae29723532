use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::notify::DispatchError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const NOT_FOUND: &str = "not_found";
    pub const FAILED_PRECONDITION: &str = "failed_precondition";
    pub const INTERNAL: &str = "internal";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHENTICATED,
            "Admin token required",
        )
    }
}

/// Map the dispatch taxonomy onto the HTTP surface. Each tag keeps a stable
/// machine code so the admin panel can branch on it.
impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Unauthenticated => ApiError::unauthenticated(),
            DispatchError::InvalidArgument(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, codes::INVALID_ARGUMENT, message)
            }
            DispatchError::NotFound(entity) => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                format!("{entity} not found"),
            ),
            DispatchError::FailedPrecondition(message) => ApiError::new(
                StatusCode::PRECONDITION_FAILED,
                codes::FAILED_PRECONDITION,
                message,
            ),
            DispatchError::Internal(message) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                message,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.clone(),
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // Attach a structured report so shared logging middleware can emit rich diagnostics.
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, self.message),
        )
        .attach(&mut response);
        response
    }
}
