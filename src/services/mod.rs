//! Business logic services.
//!
//! Services contain the key issuance, validation and handoff logic separated
//! from HTTP handlers. They take `now` explicitly so expiry and cooldown
//! behaviour is deterministic under test.

pub mod credentials;
pub mod entitlement_service;
pub mod guard;
pub mod key_service;
pub mod oauth_service;
pub mod validation_service;
