//! Unified error handling for the donation backend
//!
//! Provides a layered error system with HTTP status mapping, user-facing
//! messages, and structured error codes for client handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "DUPLICATE_ORDER_ID")]
    DuplicateOrderId,
    #[serde(rename = "DUPLICATE_EMAIL")]
    DuplicateEmail,
    #[serde(rename = "ALREADY_FINALIZED")]
    AlreadyFinalized,
    #[serde(rename = "INVALID_CREDENTIALS")]
    InvalidCredentials,
    #[serde(rename = "SESSION_EXPIRED")]
    SessionExpired,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CACHE_ERROR")]
    CacheError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 504)
    #[serde(rename = "PAYMENT_GATEWAY_ERROR")]
    PaymentGatewayError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// A donation with this order id already exists
    DuplicateOrderId { order_id: String },
    /// A user with this email already exists
    DuplicateEmail { email: String },
    /// The donation is already in a terminal status
    AlreadyFinalized { order_id: String, status: String },
    /// Email/password pair did not match any user
    InvalidCredentials,
    /// Checkout correlation missing, consumed, or past its TTL
    SessionExpired,
}

/// Infrastructure-level errors (database, cache, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Redis session store unavailable
    Cache { message: String },
    /// Missing or invalid configuration
    Configuration { message: String },
    /// Unexpected process-local failure (hashing, serialization)
    Internal { message: String },
}

/// External service errors (the payment gateway)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Gateway-side rejection or transport failure
    PaymentGateway { message: String, is_retryable: bool },
    /// External service timeout
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Malformed email address
    InvalidEmail { email: String },
    /// Donor or user name outside the accepted length
    InvalidName { reason: String },
    /// Amount outside [1000, 1000000] KRW or not an integer
    InvalidAmount { amount: String, reason: String },
    /// Age outside [1, 150]
    InvalidAge { age: String },
    /// Password shorter than 6 characters
    PasswordTooShort,
    /// Password and confirmation differ
    PasswordMismatch,
    /// Free-text field over its length limit
    FieldTooLong { field: String, max: usize },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn domain(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::DuplicateOrderId { .. } => 409,
                DomainError::DuplicateEmail { .. } => 409,
                DomainError::AlreadyFinalized { .. } => 409,
                DomainError::InvalidCredentials => 400,
                DomainError::SessionExpired => 410, // Gone
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => 502,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::DuplicateOrderId { .. } => ErrorCode::DuplicateOrderId,
                DomainError::DuplicateEmail { .. } => ErrorCode::DuplicateEmail,
                DomainError::AlreadyFinalized { .. } => ErrorCode::AlreadyFinalized,
                DomainError::InvalidCredentials => ErrorCode::InvalidCredentials,
                DomainError::SessionExpired => ErrorCode::SessionExpired,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Cache { .. } => ErrorCode::CacheError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
                InfrastructureError::Internal { .. } => ErrorCode::InternalError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => ErrorCode::PaymentGatewayError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// User-facing message. Never includes raw provider or database error
    /// text.
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::DuplicateOrderId { order_id } => {
                    format!("A donation with order id '{}' already exists", order_id)
                }
                DomainError::DuplicateEmail { .. } => {
                    "An account with this email already exists".to_string()
                }
                DomainError::AlreadyFinalized { order_id, status } => {
                    format!("Donation '{}' is already {}", order_id, status)
                }
                DomainError::InvalidCredentials => "Email or password is incorrect".to_string(),
                DomainError::SessionExpired => {
                    "Your checkout session has expired. Please start again".to_string()
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => {
                    if *is_retryable {
                        "The payment provider is temporarily unavailable. Please try again"
                            .to_string()
                    } else {
                        "Payment processing failed. Please contact support".to_string()
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidEmail { email } => {
                    format!("'{}' is not a valid email address", email)
                }
                ValidationError::InvalidName { reason } => format!("Invalid name: {}", reason),
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidAge { age } => {
                    format!("Invalid age '{}': must be between 1 and 150", age)
                }
                ValidationError::PasswordTooShort => {
                    "Password must be at least 6 characters".to_string()
                }
                ValidationError::PasswordMismatch => {
                    "Password and confirmation do not match".to_string()
                }
                ValidationError::FieldTooLong { field, max } => {
                    format!("Field '{}' must be at most {} characters", field, max)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Cache { .. } => true,
                InfrastructureError::Configuration { .. } => false,
                InfrastructureError::Internal { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => *is_retryable,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
