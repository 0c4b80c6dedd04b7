//! OAuth/PKCE handoff to the editor extension.
//!
//! # Flow
//!
//! ```text
//! extension ──initiate(state, challenge)──► no session? ──► /login?redirect=... (detour)
//!                                           │                          │
//!                                           ◄──────── replay ──────────┘
//!                                           ▼
//!                        store hash(code) + challenge, expires in TTL
//!                                           ▼
//!            vscode://.../callback?code=<code>&state=<state>
//!                                           ▼
//! extension ──redeem(code, verifier)──► take artifact (single use)
//!                                       ├─ missing        → InvalidAuthorizationCode
//!                                       ├─ expired        → AuthorizationCodeExpired
//!                                       ├─ bad verifier   → PkceMismatch
//!                                       └─ ok             → mint API key
//! ```
//!
//! The artifact is deleted as part of the lookup, so every outcome is terminal
//! for that code; the extension restarts at initiate.

use chrono::{DateTime, Utc};
use url::{Url, form_urlencoded};
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::{
        oauth::{AuthorizationCode, InitiateParams, TokenRequest, TokenResponse},
        principal::Principal,
    },
    services::{
        credentials, entitlement_service::EntitlementPolicy, guard::IssuanceGuard, key_service,
        validation_service,
    },
    store::Store,
};

/// Path the login page sends the browser back to.
pub const INITIATE_PATH: &str = "/api/auth/vscode/initiate";

const MAX_STATE_LEN: usize = 512;

/// Parameters of an initiation that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub state: String,
    pub code_challenge: String,
}

/// Where to send the browser next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiateOutcome {
    /// No session: go log in, then come back with the same parameters.
    LoginRequired { location: String },
    /// Code issued: hand it to the extension through its custom URI.
    CodeIssued { location: String },
}

impl InitiateOutcome {
    pub fn location(&self) -> &str {
        match self {
            InitiateOutcome::LoginRequired { location } | InitiateOutcome::CodeIssued { location } => {
                location
            }
        }
    }
}

impl AuthorizationRequest {
    /// Check presence and shape of the initiation parameters.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if a parameter is missing, the method is not `S256`, the
    /// challenge is not 43 base64url characters, or the state is too long.
    pub fn from_params(params: InitiateParams) -> Result<Self, AppError> {
        let (Some(state), Some(code_challenge), Some(method)) = (
            params.state.filter(|s| !s.is_empty()),
            params.code_challenge.filter(|c| !c.is_empty()),
            params.code_challenge_method.filter(|m| !m.is_empty()),
        ) else {
            return Err(AppError::InvalidRequest(
                "Missing required parameters: state, code_challenge, code_challenge_method"
                    .to_string(),
            ));
        };

        if method != "S256" {
            return Err(AppError::InvalidRequest(
                "Only S256 code_challenge_method is supported".to_string(),
            ));
        }
        if !credentials::is_well_formed_challenge(&code_challenge) {
            return Err(AppError::InvalidRequest(
                "code_challenge must be a base64url SHA-256 digest".to_string(),
            ));
        }
        if state.len() > MAX_STATE_LEN {
            return Err(AppError::InvalidRequest("state is too long".to_string()));
        }

        Ok(Self {
            state,
            code_challenge,
        })
    }

    /// The initiate URL carrying these parameters, relative to the site root.
    pub fn replay_path(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("state", &self.state)
            .append_pair("code_challenge", &self.code_challenge)
            .append_pair("code_challenge_method", "S256")
            .finish();
        format!("{INITIATE_PATH}?{query}")
    }
}

/// Login page URL that replays `request` after authentication.
pub fn login_redirect(config: &Config, request: &AuthorizationRequest) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", &request.replay_path())
        .append_pair("callback", "vscode")
        .finish();
    let separator = if config.login_path.contains('?') { '&' } else { '?' };
    format!("{}{separator}{query}", config.login_path)
}

/// Native-client callback carrying the plaintext code and the client's state.
pub fn callback_url(config: &Config, code: &str, state: &str) -> Result<String, AppError> {
    let mut url = Url::parse(&config.vscode_callback_url)
        .map_err(|e| AppError::ServiceUnavailable(format!("bad callback url: {e}")))?;
    url.query_pairs_mut()
        .append_pair("code", code)
        .append_pair("state", state);
    Ok(url.into())
}

/// Start (or resume) an authorization for the editor.
///
/// `session` is the browser's principal, if logged in.
pub async fn initiate<S>(
    store: &S,
    config: &Config,
    session: Option<&Principal>,
    params: InitiateParams,
    now: DateTime<Utc>,
) -> Result<InitiateOutcome, AppError>
where
    S: Store + ?Sized,
{
    let request = AuthorizationRequest::from_params(params)?;

    let Some(principal) = session else {
        return Ok(InitiateOutcome::LoginRequired {
            location: login_redirect(config, &request),
        });
    };

    let purged = store.purge_expired_codes(now).await?;
    if purged > 0 {
        tracing::debug!(purged, "Purged expired authorization codes");
    }

    let expires_at = now
        .checked_add_signed(config.code_ttl())
        .ok_or_else(|| AppError::ServiceUnavailable("code expiry out of range".to_string()))?;

    let code = credentials::generate_authorization_code();
    store
        .insert_code(AuthorizationCode {
            hashed_code: credentials::hash_secret(&code),
            owner_id: principal.id,
            code_challenge: request.code_challenge,
            state: request.state.clone(),
            expires_at,
            created_at: now,
        })
        .await?;

    tracing::info!(user_id = %principal.id, "Authorization code issued");

    Ok(InitiateOutcome::CodeIssued {
        location: callback_url(config, &code, &request.state)?,
    })
}

/// Exchange a code and its PKCE verifier for a freshly minted API key.
///
/// # Errors
///
/// - `InvalidRequest`: code or verifier missing
/// - `InvalidAuthorizationCode`: unknown or already redeemed
/// - `AuthorizationCodeExpired`: `now` is at or past `expires_at`
/// - `PkceMismatch`: verifier does not hash to the stored challenge
/// - `QuotaExceeded`: the issuance guard refused the new key
pub async fn redeem<S>(
    store: &S,
    config: &Config,
    guard: &IssuanceGuard,
    policy: &EntitlementPolicy,
    request: TokenRequest,
    now: DateTime<Utc>,
) -> Result<TokenResponse, AppError>
where
    S: Store + ?Sized,
{
    let (Some(code), Some(verifier)) = (
        request.code.filter(|c| !c.is_empty()),
        request.code_verifier.filter(|v| !v.is_empty()),
    ) else {
        return Err(AppError::InvalidRequest(
            "Missing required parameters: code, code_verifier".to_string(),
        ));
    };

    let artifact = store
        .take_code(&credentials::hash_secret(&code))
        .await?
        .ok_or(AppError::InvalidAuthorizationCode)?;

    let owner_id = artifact.owner_id;

    if now >= artifact.expires_at {
        tracing::info!(user_id = %owner_id, "Expired authorization code presented");
        return Err(AppError::AuthorizationCodeExpired);
    }

    if !credentials::verify_pkce(&verifier, &artifact.code_challenge) {
        tracing::warn!(user_id = %owner_id, "PKCE verification failed");
        return Err(AppError::PkceMismatch);
    }

    let issued = key_service::issue(store, guard, &config.api_key_prefix, owner_id, now).await?;
    token_response(store, policy, owner_id, issued.plaintext).await
}

async fn token_response<S>(
    store: &S,
    policy: &EntitlementPolicy,
    owner_id: Uuid,
    access_token: String,
) -> Result<TokenResponse, AppError>
where
    S: Store + ?Sized,
{
    let user = validation_service::resolve_user(store, policy, owner_id).await?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer",
        user_id: user.id,
        email: user.email,
        tier: user.tier,
        plan: user.plan,
        unlimited: user.unlimited,
    })
}
