use crate::core::error::VendorError;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Vendor(VendorError::TickerNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Vendor(VendorError::RateLimited { .. })
            | ApiError::Vendor(VendorError::PoolExhausted { .. }) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Vendor(VendorError::UpstreamUnavailable(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
