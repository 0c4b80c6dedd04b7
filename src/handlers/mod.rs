//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, query, extensions set by middleware)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON or redirect, status code)

/// Store connectivity check
pub mod health;
/// Dashboard key management
pub mod keys;
/// Current user info
pub mod me;
/// API key validation for the extension
pub mod validate;
/// Editor OAuth handoff
pub mod vscode;
