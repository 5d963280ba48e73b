//! Signup and login
//!
//! Passwords are hashed with bcrypt before storage and only the hash is
//! ever persisted. Read paths return [`PublicUser`], which has no password
//! field at all.

use crate::database::user_repository::{NewUser, PublicUser, UserRepository};
use crate::error::{
    AppError, AppErrorKind, AppResult, DomainError, InfrastructureError, ValidationError,
};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::info;

const BCRYPT_COST: u32 = 12;
const MIN_PASSWORD_LEN: usize = 6;
const MIN_NAME_LEN: usize = 2;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if !email_regex().is_match(email) {
        return Err(AppError::validation(ValidationError::InvalidEmail {
            email: email.to_string(),
        }));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub struct AuthService {
    users: UserRepository,
}

impl AuthService {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    fn validate_signup(request: &SignupRequest) -> AppResult<()> {
        validate_email(&request.email)?;

        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(ValidationError::PasswordTooShort));
        }
        if let Some(confirm) = &request.password_confirm {
            if confirm != &request.password {
                return Err(AppError::validation(ValidationError::PasswordMismatch));
            }
        }
        if let Some(name) = &request.name {
            if name.trim().chars().count() < MIN_NAME_LEN {
                return Err(AppError::validation(ValidationError::InvalidName {
                    reason: format!("must be at least {} characters", MIN_NAME_LEN),
                }));
            }
        }
        if let Some(age) = request.age {
            if !(1..=150).contains(&age) {
                return Err(AppError::validation(ValidationError::InvalidAge {
                    age: age.to_string(),
                }));
            }
        }
        Ok(())
    }

    pub async fn signup(&self, request: SignupRequest) -> AppResult<PublicUser> {
        Self::validate_signup(&request)?;

        let email = request.email.trim().to_lowercase();
        let password_hash = bcrypt::hash(&request.password, BCRYPT_COST).map_err(|e| {
            AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Internal {
                message: format!("password hashing failed: {}", e),
            }))
        })?;

        let user = self
            .users
            .create(NewUser {
                email: email.clone(),
                password_hash,
                name: request.name.map(|n| n.trim().to_string()),
                age: request.age,
            })
            .await
            .map_err(|e| {
                if e.is_duplicate() {
                    AppError::domain(DomainError::DuplicateEmail { email })
                } else {
                    e.into()
                }
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(user.into())
    }

    /// Verify an email/password pair. The same error is returned whether the
    /// email is unknown or the password is wrong.
    pub async fn login(&self, request: LoginRequest) -> AppResult<PublicUser> {
        validate_email(&request.email)?;
        let email = request.email.trim().to_lowercase();

        let Some(user) = self.users.find_by_email(&email).await? else {
            return Err(AppError::domain(DomainError::InvalidCredentials));
        };

        let matches = bcrypt::verify(&request.password, &user.password_hash).map_err(|e| {
            AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Internal {
                message: format!("password verification failed: {}", e),
            }))
        })?;
        if !matches {
            return Err(AppError::domain(DomainError::InvalidCredentials));
        }

        info!(user_id = %user.id, "user logged in");
        Ok(user.into())
    }

    pub async fn list_users(&self, page: u32, limit: u32) -> AppResult<(Vec<PublicUser>, i64)> {
        let users = self.users.list(page, limit).await?;
        let total = self.users.count().await?;
        Ok((users.into_iter().map(PublicUser::from).collect(), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn signup_request() -> SignupRequest {
        SignupRequest {
            email: "donor@example.com".to_string(),
            password: "secret99".to_string(),
            password_confirm: Some("secret99".to_string()),
            name: Some("Kim".to_string()),
            age: Some(30),
        }
    }

    #[test]
    fn valid_signup_request_passes_validation() {
        assert!(AuthService::validate_signup(&signup_request()).is_ok());
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut request = signup_request();
        request.email = "not-an-email".to_string();
        let err = AuthService::validate_signup(&request).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn short_password_is_rejected() {
        let mut request = signup_request();
        request.password = "abc".to_string();
        request.password_confirm = Some("abc".to_string());
        assert!(AuthService::validate_signup(&request).is_err());
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let mut request = signup_request();
        request.password_confirm = Some("different".to_string());
        assert!(AuthService::validate_signup(&request).is_err());
    }

    #[test]
    fn one_character_name_is_rejected() {
        let mut request = signup_request();
        request.name = Some("K".to_string());
        assert!(AuthService::validate_signup(&request).is_err());
    }

    #[test]
    fn age_out_of_range_is_rejected() {
        let mut request = signup_request();
        request.age = Some(151);
        assert!(AuthService::validate_signup(&request).is_err());

        request.age = Some(0);
        assert!(AuthService::validate_signup(&request).is_err());
    }

    #[test]
    fn missing_optional_fields_are_accepted() {
        let request = SignupRequest {
            email: "donor@example.com".to_string(),
            password: "secret99".to_string(),
            password_confirm: None,
            name: None,
            age: None,
        };
        assert!(AuthService::validate_signup(&request).is_ok());
    }
}
