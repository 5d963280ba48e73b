//! Database error classification

use crate::error::{AppError, AppErrorKind, InfrastructureError};
use std::fmt;

/// Classified database error
#[derive(Debug)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

#[derive(Debug)]
pub enum DatabaseErrorKind {
    /// Unique constraint violation (duplicate order id, duplicate email)
    Duplicate { constraint: String },
    /// No row matched the query
    NotFound { entity: String, id: String },
    /// Connection-level failure, safe to retry
    Connection { message: String },
    /// Everything else
    Unknown { message: String },
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    /// Classify an sqlx error. Unique violations (Postgres 23505) carry the
    /// constraint name so callers can map them to the right conflict.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::new(DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            }),
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some("23505") {
                    return Self::new(DatabaseErrorKind::Duplicate {
                        constraint: db_err.constraint().unwrap_or("unique").to_string(),
                    });
                }
                Self::new(DatabaseErrorKind::Unknown {
                    message: db_err.to_string(),
                })
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::new(DatabaseErrorKind::Connection {
                    message: err.to_string(),
                })
            }
            _ => Self::new(DatabaseErrorKind::Unknown {
                message: err.to_string(),
            }),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::Duplicate { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DatabaseErrorKind::Duplicate { constraint } => {
                write!(f, "unique constraint violation: {}", constraint)
            }
            DatabaseErrorKind::NotFound { entity, id } => {
                write!(f, "{} '{}' not found", entity, id)
            }
            DatabaseErrorKind::Connection { message } => {
                write!(f, "database connection error: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => write!(f, "database error: {}", message),
        }
    }
}

impl std::error::Error for DatabaseError {}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        let is_retryable = matches!(err.kind, DatabaseErrorKind::Connection { .. });
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: err.to_string(),
            is_retryable,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_is_classified() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
        assert!(!err.is_duplicate());
    }

    #[test]
    fn connection_errors_convert_to_retryable_app_error() {
        let err = DatabaseError::new(DatabaseErrorKind::Connection {
            message: "pool timed out".to_string(),
        });
        let app: AppError = err.into();
        assert!(app.is_retryable());
        assert_eq!(app.status_code(), 500);
    }
}
