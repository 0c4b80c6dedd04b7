//! Secret generation, hashing and format checks.
//!
//! API keys are `<prefix><48 lowercase hex chars>` (24 random bytes). Only the
//! SHA-256 digest is persisted. The digest is unsalted so a presented key can be
//! found by equality; the entropy lives in the key itself.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Random bytes in every API key.
pub const API_KEY_BYTES: usize = 24;

/// Hex characters following the prefix.
pub const API_KEY_SECRET_LEN: usize = API_KEY_BYTES * 2;

/// Secret characters kept in the display prefix.
const DISPLAY_SECRET_CHARS: usize = 4;

/// SHA-256 of a PKCE verifier, base64url without padding.
pub const PKCE_CHALLENGE_LEN: usize = 43;

/// A presented key that passed the format check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedApiKey<'a> {
    pub token: &'a str,
    pub prefix: &'a str,
}

impl ParsedApiKey<'_> {
    /// Non-secret slice stored beside the digest for the dashboard listing.
    pub fn display_prefix(&self) -> &str {
        &self.token[..self.prefix.len() + DISPLAY_SECRET_CHARS]
    }
}

/// Generate a fresh API key with the given prefix.
pub fn generate_api_key(prefix: &str) -> String {
    let bytes: [u8; API_KEY_BYTES] = rand::random();
    format!("{prefix}{}", hex::encode(bytes))
}

/// Hex-encoded SHA-256 of a secret.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check that `token` is `<accepted prefix><48 lowercase hex>`.
///
/// Runs before any store access.
pub fn parse_api_key<'a>(token: &'a str, accepted: &[&str]) -> Result<ParsedApiKey<'a>, AppError> {
    let prefix_len = accepted
        .iter()
        .filter(|p| token.starts_with(**p))
        .map(|p| p.len())
        .max()
        .ok_or(AppError::MalformedApiKey)?;

    let (prefix, secret) = token.split_at(prefix_len);
    let well_formed = secret.len() == API_KEY_SECRET_LEN
        && secret.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));

    if !well_formed {
        return Err(AppError::MalformedApiKey);
    }

    Ok(ParsedApiKey { token, prefix })
}

/// Single-use authorization code handed to the native client.
pub fn generate_authorization_code() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 PKCE challenge: base64url(SHA-256(verifier)).
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn verify_pkce(verifier: &str, challenge: &str) -> bool {
    pkce_challenge(verifier) == challenge
}

/// Whether `challenge` could be an S256 challenge at all.
pub fn is_well_formed_challenge(challenge: &str) -> bool {
    challenge.len() == PKCE_CHALLENGE_LEN
        && challenge
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIXES: &[&str] = &["s1c_", "sk_"];

    #[test]
    fn generated_keys_carry_prefix_and_parse() {
        let key = generate_api_key("s1c_");
        assert!(key.starts_with("s1c_"));
        assert_eq!(key.len(), 4 + API_KEY_SECRET_LEN);

        let parsed = parse_api_key(&key, PREFIXES).unwrap();
        assert_eq!(parsed.prefix, "s1c_");
        assert_eq!(parsed.display_prefix(), &key[..8]);
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(generate_api_key("s1c_"), generate_api_key("s1c_"));
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_secret("abc"), hash_secret("abc"));
    }

    #[test]
    fn legacy_prefix_is_accepted() {
        let key = generate_api_key("sk_");
        assert_eq!(parse_api_key(&key, PREFIXES).unwrap().prefix, "sk_");
    }

    #[test]
    fn rejects_foreign_or_truncated_tokens() {
        let key = generate_api_key("s1c_");
        let tokens = vec![
            String::new(),
            "s1c_".to_string(),
            key[..key.len() - 1].to_string(),
            format!("{key}0"),
            key.replace("s1c_", "xx_"),
            key.to_uppercase(),
        ];
        for token in &tokens {
            assert!(
                matches!(parse_api_key(token, PREFIXES), Err(AppError::MalformedApiKey)),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn pkce_challenge_matches_its_verifier_only() {
        let verifier = "correct-horse-battery-staple-0123456789-abcdefgh";
        let challenge = pkce_challenge(verifier);

        assert_eq!(challenge.len(), PKCE_CHALLENGE_LEN);
        assert!(!challenge.contains('='));
        assert!(is_well_formed_challenge(&challenge));
        assert!(verify_pkce(verifier, &challenge));
        assert!(!verify_pkce("another-verifier", &challenge));
    }

    #[test]
    fn authorization_codes_are_url_safe() {
        let code = generate_authorization_code();
        assert_eq!(code.len(), 43);
        assert!(code.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    #[test]
    fn challenge_shape_is_checked() {
        assert!(!is_well_formed_challenge("short"));
        assert!(!is_well_formed_challenge(&"+".repeat(PKCE_CHALLENGE_LEN)));
    }
}
