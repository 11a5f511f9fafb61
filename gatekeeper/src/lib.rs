//! # Gatekeeper
//!
//! Session credentials for a small user-account service.
//!
//! Accounts live in a relational store; the single live access/refresh token
//! pair of each user lives in a key-value cache. Both stores sit behind traits
//! with PostgreSQL/Redis and in-memory implementations.
//!
//! ## Core Modules
//!
//! - [`auth`]: token codec, password hashing, auth service and request gate
//! - [`cache`]: the per-user session slot over Redis or memory
//! - [`db`]: the account store over PostgreSQL or memory
//! - [`timeouts`]: deadlines for store calls

pub mod auth;
pub mod cache;
pub mod db;
pub mod timeouts;

pub use auth::{AuthError, AuthManager, AuthResult, RequestGate, TokenPair, ValidationError};
