//! Core domain logic for Spendgate.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Stores and the HTTP layer perform the I/O and call into the decision
//! functions defined here.
//!
//! # Modules
//!
//! - `auth` - Password hashing and policy
//! - `identity` - Users, roles, permissions and approval limits
//! - `tenant` - Companies, subscriptions, module licences and lifecycle
//! - `access` - Authentication, tenant isolation and the authorization policy engine
//! - `spend` - Trade spend records

pub mod access;
pub mod auth;
pub mod identity;
pub mod spend;
pub mod tenant;
