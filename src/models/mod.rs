//! Data models representing database entities and API payloads.

/// API key records and responses
pub mod api_key;
/// Authorization codes for the editor handoff
pub mod oauth;
/// Principals, profiles and entitlements
pub mod principal;
