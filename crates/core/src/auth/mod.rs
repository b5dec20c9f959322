//! Credential handling.
//!
//! This module provides:
//! - Password hashing with Argon2id
//! - Password verification
//! - The password strength policy

mod password;

pub use password::{
    MIN_PASSWORD_LEN, PasswordError, hash_password, validate_password_policy, verify_password,
};

use spendgate_shared::AppError;

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooWeak => AppError::validation(err.to_string()),
            other => AppError::internal(other.to_string()),
        }
    }
}
