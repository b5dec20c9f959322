//! Shared types, errors, and configuration for Spendgate.
//!
//! This crate provides common types used across all other crates:
//! - Error codes and the application error type
//! - Typed IDs for type-safe entity references
//! - Session token issuing and verification
//! - Auth request/response payloads
//! - Configuration management

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::{Claims, TokenKind};
pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorCode};
pub use jwt::{TokenConfig, TokenError, TokenService};
