//! Error response formatting
//!
//! Every handler error leaves the service as the same JSON shape with the
//! status code, error code, and user-facing message taken from [`AppError`].
//! Raw provider and database error text never reaches the client.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standardized error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Optional additional details (e.g., the offending fields)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the client should retry the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            details: None,
            retryable: Some(error.is_retryable()),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "server error"
            );
        } else {
            tracing::warn!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "client error"
            );
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

/// Standardized success envelope
pub fn success_response<T: Serialize>(data: T) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Success envelope with pagination or other metadata
pub fn success_response_with_meta<T: Serialize, M: Serialize>(
    data: T,
    meta: M,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "data": data,
        "meta": meta,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Attach the request id from the incoming headers to an error, if present.
pub fn tag_request_id(error: AppError, headers: &axum::http::HeaderMap) -> AppError {
    match get_request_id_from_headers(headers) {
        Some(request_id) => error.with_request_id(request_id),
        None => error,
    }
}

/// Validation rejection that echoes the submitted fields back to the
/// client alongside the standard error body. Callers must never pass
/// password material in `submitted`.
pub fn validation_rejection(error: &AppError, submitted: serde_json::Value) -> Response {
    let status_code =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    let body = ErrorResponse::from_app_error(error).with_details(submitted);
    tracing::warn!(
        error = ?error,
        request_id = ?error.request_id,
        status = %status_code.as_u16(),
        "validation rejected"
    );
    (status_code, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppErrorKind, DomainError, ValidationError};

    #[test]
    fn error_response_carries_code_and_request_id() {
        let app_error = AppError::new(AppErrorKind::Domain(DomainError::DuplicateEmail {
            email: "a@b.com".to_string(),
        }))
        .with_request_id("req_123");

        let response = ErrorResponse::from_app_error(&app_error);
        assert_eq!(response.error, ErrorCode::DuplicateEmail);
        assert_eq!(response.request_id, Some("req_123".to_string()));
        assert_eq!(response.retryable, Some(false));
    }

    #[test]
    fn validation_error_maps_to_bad_request() {
        let app_error = AppError::validation(ValidationError::InvalidAmount {
            amount: "500".to_string(),
            reason: "below minimum".to_string(),
        });
        let response = app_error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn expired_session_maps_to_gone() {
        let app_error = AppError::domain(DomainError::SessionExpired);
        let response = app_error.into_response();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[test]
    fn request_id_header_is_attached_to_error() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-request-id", "req_abc".parse().unwrap());

        let tagged = tag_request_id(AppError::domain(DomainError::SessionExpired), &headers);
        assert_eq!(tagged.request_id, Some("req_abc".to_string()));

        let untagged =
            tag_request_id(AppError::domain(DomainError::SessionExpired), &Default::default());
        assert_eq!(untagged.request_id, None);
    }

    #[test]
    fn validation_rejection_echoes_submitted_fields() {
        let app_error = AppError::validation(ValidationError::InvalidAmount {
            amount: "500".to_string(),
            reason: "below minimum".to_string(),
        });
        let body = ErrorResponse::from_app_error(&app_error).with_details(serde_json::json!({
            "email": "donor@example.com",
            "amount": 500,
        }));

        let details = body.details.expect("details should be present");
        assert_eq!(details["email"], "donor@example.com");
        assert_eq!(details["amount"], 500);

        let response = validation_rejection(&app_error, details);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
