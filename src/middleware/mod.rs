//! HTTP middleware components.
//!
//! Middleware run before route handlers and short-circuit requests that
//! lack valid credentials.

/// API key authentication middleware
pub mod auth;
/// Browser session middleware
pub mod session;
