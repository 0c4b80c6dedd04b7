//! Identity provider client.
//!
//! The browser logs in with the hosted identity provider, which leaves a session
//! token in a cookie. This module turns that token back into a [`Principal`].
//! Raw credentials never pass through this service.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode, header};

use crate::{error::AppError, models::principal::Principal};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session token.
    ///
    /// - `Ok(Some(principal))` for a live session
    /// - `Ok(None)` if the provider rejects the token
    /// - `Err(...)` if the provider cannot be reached
    async fn session_user(&self, session_token: &str) -> Result<Option<Principal>, AppError>;
}

/// Client for a GoTrue-style `GET /auth/v1/user` endpoint.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    user_url: String,
    api_key: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn session_user(&self, session_token: &str) -> Result<Option<Principal>, AppError> {
        let mut request = self.client.get(&self.user_url).bearer_auth(session_token);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Principal>().await?)),
            status => Err(AppError::ServiceUnavailable(format!(
                "identity provider answered {status}"
            ))),
        }
    }
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn session_token<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    /// Fixed token → principal table.
    #[derive(Default)]
    pub struct StaticIdentityProvider {
        sessions: HashMap<String, Principal>,
    }

    impl StaticIdentityProvider {
        pub fn with_session(mut self, token: &str, principal: Principal) -> Self {
            self.sessions.insert(token.to_string(), principal);
            self
        }
    }

    #[async_trait]
    impl IdentityProvider for StaticIdentityProvider {
        async fn session_user(&self, session_token: &str) -> Result<Option<Principal>, AppError> {
            Ok(self.sessions.get(session_token).cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sb-access-token=abc.def; other=1"),
        );

        assert_eq!(session_token(&headers, "sb-access-token"), Some("abc.def"));
        assert_eq!(session_token(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_is_no_session() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sb-access-token="));
        assert_eq!(session_token(&headers, "sb-access-token"), None);
    }

    #[test]
    fn user_url_is_normalized() {
        let provider = HttpIdentityProvider::new("http://identity.test/", None).unwrap();
        assert_eq!(provider.user_url, "http://identity.test/auth/v1/user");
    }
}
