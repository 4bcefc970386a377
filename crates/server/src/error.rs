use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prep::PrepError;
use thiserror::Error;

use crate::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PrepError),
    #[error("Bad Request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Pipeline(err) => match err {
                PrepError::Calendar(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CalendarError"),
                PrepError::Provider(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ProviderError"),
                PrepError::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SchemaError"),
                PrepError::State(_) => (StatusCode::INTERNAL_SERVER_ERROR, "StateError"),
                PrepError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ConfigError"),
                PrepError::StreamClosed => (StatusCode::INTERNAL_SERVER_ERROR, "StreamClosed"),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        };

        let error_message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Pipeline(_) => self.to_string(),
        };
        tracing::warn!("[API] {} ({}): {}", error_type, status_code, error_message);

        let response = ApiResponse::<()>::error(error_type, &error_message);
        (status_code, Json(response)).into_response()
    }
}
