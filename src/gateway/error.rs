use crate::error::{AppError, AppErrorKind, ExternalError};
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures talking to the payment provider.
///
/// The split between retryable and fatal drives the HTTP client's retry
/// loop: transient transport and 5xx failures may be replayed, business
/// rejections never are.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request to provider timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    /// The provider understood the request and refused it (4xx business
    /// rejection). Carries the provider's own error code when it sent one.
    #[error("Payment rejected by provider: {message} (code: {code:?})")]
    Rejected {
        code: Option<i64>,
        message: String,
    },

    #[error("Provider error: {message}")]
    ProviderError { message: String, retryable: bool },

    #[error("Failed to parse provider response: {message}")]
    InvalidResponse { message: String },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::NetworkError { .. }
            | GatewayError::Timeout { .. }
            | GatewayError::RateLimitError { .. } => true,
            GatewayError::ProviderError { retryable, .. } => *retryable,
            GatewayError::ValidationError { .. }
            | GatewayError::Rejected { .. }
            | GatewayError::InvalidResponse { .. } => false,
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let kind = match &err {
            GatewayError::Timeout { timeout_secs } => {
                AppErrorKind::External(ExternalError::Timeout {
                    service: "payment gateway".to_string(),
                    timeout_secs: *timeout_secs,
                })
            }
            _ => AppErrorKind::External(ExternalError::PaymentGateway {
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            }),
        };
        AppError::new(kind)
    }
}
