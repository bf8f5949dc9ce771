//! Error helpers.

use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use ludo_league::retention::RetentionError;
use ludo_league::role::RoleError;
use ludo_league::store::StoreError;

/// API error, rendered as `{ "error": message }` with the matching status.
#[derive(Debug)]
pub enum ApiError {
    /// 400: missing fields or invalid values.
    BadRequest(String),
    /// 401: missing or invalid ID token.
    Unauthorized(String),
    /// 403: valid ID token, insufficient role.
    Forbidden(String),
    /// 404: no such user.
    NotFound(String),
    /// 500: anything unexpected.
    Internal(String),
}
impl ApiError {
    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message for the response body.
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}
impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid JSON body: {}", value.body_text()))
    }
}
impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        Self::Internal(format!("Database error: {}", value))
    }
}
impl From<RoleError> for ApiError {
    fn from(value: RoleError) -> Self {
        match value {
            RoleError::Forbidden => Self::Forbidden(value.to_string()),
            RoleError::InvalidRole(_) | RoleError::EmailMismatch(_) => {
                Self::BadRequest(value.to_string())
            }
            RoleError::NotFound(_) => Self::NotFound(value.to_string()),
            RoleError::Store(store_error) => store_error.into(),
        }
    }
}
impl From<RetentionError> for ApiError {
    fn from(value: RetentionError) -> Self {
        match value {
            RetentionError::InvalidMonths(_) => Self::BadRequest(value.to_string()),
            RetentionError::Store(store_error) => store_error.into(),
        }
    }
}
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if self.status().is_server_error() {
            log::error!("{:?}", self);
        } else {
            log::info!("{:?}", self);
        }
        (
            self.status(),
            Json(serde_json::json!({ "error": self.message() })),
        )
            .into_response()
    }
}
