//! Application configuration management.
//!
//! Configuration is layered with the following precedence:
//!
//! 1. An explicit TOML file named by `CONFIG_FILE` (every key optional)
//! 2. Environment variables (optionally seeded from a `.env` file)
//! 3. Compiled defaults
//!
//! Environment variables are deserialized with the `envy` crate, the file with `toml`.

use std::path::Path;

use chrono::Duration;
use serde::Deserialize;
use uuid::Uuid;

use crate::services::{
    entitlement_service::{EntitlementPolicy, SpecialUserRule},
    guard::IssuanceGuard,
};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment: {0}")]
    Env(#[from] envy::Error),

    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parsing config file: {0}")]
    File(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `IDENTITY_URL` (required): Base URL of the identity provider
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `API_KEY_PREFIX` / `LEGACY_API_KEY_PREFIXES`: key formats
/// - `MAX_ACTIVE_KEYS` / `KEY_COOLDOWN_SECS`: issuance guard policy
/// - `OAUTH_CODE_TTL_SECS`, `VSCODE_CALLBACK_URL`, `LOGIN_PATH`: editor handoff
/// - `ENABLE_SPECIAL_USER`, `SPECIAL_USER_ID`, `SPECIAL_USER_EMAIL`: unlimited override
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    /// Prefix stamped on every newly minted key.
    #[serde(default = "default_key_prefix")]
    pub api_key_prefix: String,

    /// Older prefixes still accepted by validation.
    #[serde(default = "default_legacy_prefixes")]
    pub legacy_api_key_prefixes: Vec<String>,

    #[serde(default = "default_max_active_keys")]
    pub max_active_keys: u32,

    #[serde(default = "default_key_cooldown_secs")]
    pub key_cooldown_secs: i64,

    #[serde(default = "default_code_ttl_secs")]
    pub oauth_code_ttl_secs: i64,

    /// Custom URI the editor extension listens on.
    #[serde(default = "default_callback_url")]
    pub vscode_callback_url: String,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    pub identity_url: String,

    #[serde(default)]
    pub identity_api_key: Option<String>,

    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    #[serde(default)]
    pub enable_special_user: bool,

    #[serde(default)]
    pub special_user_id: Option<Uuid>,

    #[serde(default)]
    pub special_user_email: Option<String>,

    #[serde(default)]
    pub config_file: Option<String>,
}

/// Optional overrides read from the file named by `CONFIG_FILE`.
///
/// Every field left out of the file keeps the value from the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub server_port: Option<u16>,
    pub database_max_connections: Option<u32>,
    pub api_key_prefix: Option<String>,
    pub legacy_api_key_prefixes: Option<Vec<String>>,
    pub max_active_keys: Option<u32>,
    pub key_cooldown_secs: Option<i64>,
    pub oauth_code_ttl_secs: Option<i64>,
    pub vscode_callback_url: Option<String>,
    pub login_path: Option<String>,
    pub identity_url: Option<String>,
    pub identity_api_key: Option<String>,
    pub session_cookie: Option<String>,
    pub enable_special_user: Option<bool>,
    pub special_user_id: Option<Uuid>,
    pub special_user_email: Option<String>,
}

/// One key per day is the slowest issuance rate that still makes sense.
pub const MAX_KEY_COOLDOWN_SECS: i64 = 86_400;

/// Authorization codes are a browser-to-editor hop, never longer than an hour.
pub const MAX_CODE_TTL_SECS: i64 = 3_600;

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_key_prefix() -> String {
    "s1c_".to_string()
}

fn default_legacy_prefixes() -> Vec<String> {
    vec!["sk_".to_string()]
}

fn default_max_active_keys() -> u32 {
    3
}

fn default_key_cooldown_secs() -> i64 {
    60
}

fn default_code_ttl_secs() -> i64 {
    600
}

fn default_callback_url() -> String {
    "vscode://sainocode.sainocode-ai/auth/callback".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_session_cookie() -> String {
    "sb-access-token".to_string()
}

impl Config {
    /// Load configuration from the environment, then apply `CONFIG_FILE` overrides.
    ///
    /// A `.env` file is loaded first if present (does nothing if not found).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Values cannot be parsed into expected types
    /// - The override file cannot be read or contains unknown keys
    /// - The resulting policy is inconsistent (see [`Config::validate`])
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_vars(std::env::vars())
    }

    /// Build configuration from an explicit variable set.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = envy::from_iter::<_, Config>(vars)?;

        if let Some(path) = config.config_file.clone() {
            let overrides = ConfigOverrides::from_file(&path)?;
            config.apply(overrides);
        }

        config.validate()?;
        Ok(config)
    }

    /// Layer file overrides on top of the environment values.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            server_port,
            database_max_connections,
            api_key_prefix,
            legacy_api_key_prefixes,
            max_active_keys,
            key_cooldown_secs,
            oauth_code_ttl_secs,
            vscode_callback_url,
            login_path,
            identity_url,
            identity_api_key,
            session_cookie,
            enable_special_user,
            special_user_id,
            special_user_email,
        } = overrides;

        if let Some(v) = server_port {
            self.server_port = v;
        }
        if let Some(v) = database_max_connections {
            self.database_max_connections = v;
        }
        if let Some(v) = api_key_prefix {
            self.api_key_prefix = v;
        }
        if let Some(v) = legacy_api_key_prefixes {
            self.legacy_api_key_prefixes = v;
        }
        if let Some(v) = max_active_keys {
            self.max_active_keys = v;
        }
        if let Some(v) = key_cooldown_secs {
            self.key_cooldown_secs = v;
        }
        if let Some(v) = oauth_code_ttl_secs {
            self.oauth_code_ttl_secs = v;
        }
        if let Some(v) = vscode_callback_url {
            self.vscode_callback_url = v;
        }
        if let Some(v) = login_path {
            self.login_path = v;
        }
        if let Some(v) = identity_url {
            self.identity_url = v;
        }
        if identity_api_key.is_some() {
            self.identity_api_key = identity_api_key;
        }
        if let Some(v) = session_cookie {
            self.session_cookie = v;
        }
        if let Some(v) = enable_special_user {
            self.enable_special_user = v;
        }
        if special_user_id.is_some() {
            self.special_user_id = special_user_id;
        }
        if special_user_email.is_some() {
            self.special_user_email = special_user_email;
        }
    }

    /// Reject values that would make the key flows misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key_prefix.is_empty() {
            return Err(ConfigError::Invalid("API_KEY_PREFIX must not be empty".into()));
        }
        if self.max_active_keys == 0 {
            return Err(ConfigError::Invalid("MAX_ACTIVE_KEYS must be at least 1".into()));
        }
        if !(0..=MAX_KEY_COOLDOWN_SECS).contains(&self.key_cooldown_secs) {
            return Err(ConfigError::Invalid(format!(
                "KEY_COOLDOWN_SECS must be between 0 and {MAX_KEY_COOLDOWN_SECS}"
            )));
        }
        if !(1..=MAX_CODE_TTL_SECS).contains(&self.oauth_code_ttl_secs) {
            return Err(ConfigError::Invalid(format!(
                "OAUTH_CODE_TTL_SECS must be between 1 and {MAX_CODE_TTL_SECS}"
            )));
        }
        url::Url::parse(&self.vscode_callback_url)
            .map_err(|e| ConfigError::Invalid(format!("VSCODE_CALLBACK_URL: {e}")))?;
        url::Url::parse(&self.identity_url)
            .map_err(|e| ConfigError::Invalid(format!("IDENTITY_URL: {e}")))?;

        Ok(())
    }

    /// Issuance guard derived from the key policy settings.
    pub fn guard(&self) -> IssuanceGuard {
        IssuanceGuard {
            cooldown: Duration::seconds(self.key_cooldown_secs),
            max_active: self.max_active_keys,
        }
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::seconds(self.oauth_code_ttl_secs)
    }

    /// Every prefix validation accepts, current one first.
    pub fn accepted_prefixes(&self) -> Vec<&str> {
        std::iter::once(self.api_key_prefix.as_str())
            .chain(
                self.legacy_api_key_prefixes
                    .iter()
                    .map(String::as_str)
                    .filter(|p| !p.is_empty()),
            )
            .collect()
    }

    /// Unlimited-override table. An id rule wins over an email rule.
    pub fn entitlement_policy(&self) -> EntitlementPolicy {
        let mut rules = Vec::new();
        if self.enable_special_user {
            if let Some(id) = self.special_user_id {
                rules.push(SpecialUserRule::Id(id));
            } else if let Some(email) = &self.special_user_email {
                rules.push(SpecialUserRule::Email(email.clone()));
            }
        }
        EntitlementPolicy::new(rules)
    }
}

impl ConfigOverrides {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config::from_vars(vars(&[])).expect("test config")
}

#[cfg(test)]
fn vars(extra: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut vars = vec![
        ("DATABASE_URL".to_string(), "postgres://localhost/keygate".to_string()),
        ("IDENTITY_URL".to_string(), "http://identity.test".to_string()),
    ];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = test_config();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.api_key_prefix, "s1c_");
        assert_eq!(config.max_active_keys, 3);
        assert_eq!(config.oauth_code_ttl_secs, 600);
        assert_eq!(config.accepted_prefixes(), vec!["s1c_", "sk_"]);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_vars(vars(&[
            ("MAX_ACTIVE_KEYS", "5"),
            ("KEY_COOLDOWN_SECS", "0"),
            ("LEGACY_API_KEY_PREFIXES", "sk_,old_"),
        ]))
        .unwrap();

        assert_eq!(config.max_active_keys, 5);
        assert_eq!(config.guard().cooldown, Duration::zero());
        assert_eq!(config.accepted_prefixes(), vec!["s1c_", "sk_", "old_"]);
    }

    #[test]
    fn file_overrides_environment() {
        let path = std::env::temp_dir().join(format!("keygate-{}.toml", Uuid::new_v4()));
        std::fs::write(&path, "max_active_keys = 7\nenable_special_user = true\n").unwrap();

        let config = Config::from_vars(vars(&[
            ("MAX_ACTIVE_KEYS", "2"),
            ("CONFIG_FILE", path.to_str().unwrap()),
            ("SPECIAL_USER_EMAIL", "admin@example.com"),
        ]))
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.max_active_keys, 7);
        assert!(config.enable_special_user);
        assert_eq!(config.special_user_email.as_deref(), Some("admin@example.com"));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let err = toml::from_str::<ConfigOverrides>("max_keys = 1").unwrap_err();
        assert!(err.to_string().contains("max_keys"));
    }

    #[test]
    fn zero_max_active_keys_is_invalid() {
        let err = Config::from_vars(vars(&[("MAX_ACTIVE_KEYS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn cooldown_above_one_day_is_invalid() {
        assert!(Config::from_vars(vars(&[("KEY_COOLDOWN_SECS", "86400")])).is_ok());

        for value in ["86401", "10000000000000000", "-1"] {
            let err = Config::from_vars(vars(&[("KEY_COOLDOWN_SECS", value)])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{value}");
        }
    }

    #[test]
    fn code_ttl_above_one_hour_is_invalid() {
        let config = Config::from_vars(vars(&[("OAUTH_CODE_TTL_SECS", "3600")])).unwrap();
        assert_eq!(config.code_ttl(), Duration::hours(1));

        for value in ["3601", "1000000000000000", "0"] {
            let err = Config::from_vars(vars(&[("OAUTH_CODE_TTL_SECS", value)])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{value}");
        }
    }

    #[test]
    fn missing_database_url_fails() {
        let err = Config::from_vars(vec![(
            "IDENTITY_URL".to_string(),
            "http://identity.test".to_string(),
        )])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn special_user_id_wins_over_email() {
        let id = Uuid::new_v4();
        let config = Config::from_vars(vars(&[
            ("ENABLE_SPECIAL_USER", "true"),
            ("SPECIAL_USER_ID", &id.to_string()),
            ("SPECIAL_USER_EMAIL", "admin@example.com"),
        ]))
        .unwrap();

        assert_eq!(
            config.entitlement_policy().rules(),
            &[SpecialUserRule::Id(id)]
        );
    }

    #[test]
    fn special_user_disabled_yields_empty_table() {
        let config = Config::from_vars(vars(&[("SPECIAL_USER_EMAIL", "admin@example.com")])).unwrap();
        assert!(config.entitlement_policy().rules().is_empty());
    }
}
