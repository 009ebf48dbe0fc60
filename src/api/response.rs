use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::GatewayError;

pub const CODE_SUCCESS: u16 = 200;
pub const CODE_FAILURE: u16 = 500;

// ============================================================================
// Response envelope
// ============================================================================

/// `{code, data, msg}` body shared by every JSON response.
///
/// Failures are carried in `code` alone; the HTTP status is always 200.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub data: Option<T>,
    pub msg: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Json<Envelope<T>> {
        Json(Envelope {
            code: CODE_SUCCESS,
            data: Some(data),
            msg: "[success]".to_string(),
        })
    }
}

impl Envelope<()> {
    pub fn failure(message: impl AsRef<str>) -> Json<Envelope<()>> {
        Json(Envelope {
            code: CODE_FAILURE,
            data: None,
            msg: format!("[error] {}", message.as_ref()),
        })
    }
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.0 {
            GatewayError::Io(_) | GatewayError::Index(_) | GatewayError::CapacityExhausted { .. } => {
                tracing::error!(error = %self.0, "Request failed");
            }
            _ => tracing::debug!(error = %self.0, "Request rejected"),
        }
        (StatusCode::OK, Envelope::failure(self.0.to_string())).into_response()
    }
}

impl ApiError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ApiError(GatewayError::InvalidArgument(message.into()))
    }

    pub fn size_limit(limit: u64) -> Self {
        ApiError(GatewayError::SizeLimitExceeded { limit })
    }
}
