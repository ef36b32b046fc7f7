use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::validation::{validate_login, validate_password};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Lifetimes of every credential the server hands out, in seconds.
#[derive(Clone, Debug, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_authorization_code_lifetime")]
    pub authorization_code_lifetime: i64,
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime: i64,
    #[serde(default = "default_remember_session_lifetime")]
    pub remember_session_lifetime: i64,
    #[serde(default = "default_reset_token_lifetime")]
    pub reset_token_lifetime: i64,
    /// Revoke every token descending from the same code exchange when an
    /// already rotated refresh token is presented again.
    #[serde(default = "default_true")]
    pub revoke_family_on_replay: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: default_authorization_code_lifetime(),
            access_token_lifetime: default_access_token_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
            session_lifetime: default_session_lifetime(),
            remember_session_lifetime: default_remember_session_lifetime(),
            reset_token_lifetime: default_reset_token_lifetime(),
            revoke_family_on_replay: true,
        }
    }
}

fn default_authorization_code_lifetime() -> i64 {
    120
}
fn default_access_token_lifetime() -> i64 {
    3600
}
fn default_refresh_token_lifetime() -> i64 {
    86400 * 30
}
fn default_session_lifetime() -> i64 {
    3600 * 12
}
fn default_remember_session_lifetime() -> i64 {
    86400 * 30
}
fn default_reset_token_lifetime() -> i64 {
    3600
}
fn default_true() -> bool {
    true
}

/// Bounds applied to every store round-trip.
#[derive(Clone, Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connect_timeout_secs: default_timeout_secs(),
            acquire_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}
fn default_timeout_secs() -> u64 {
    5
}

/// A client registered at start-up if it does not exist yet.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientSeed {
    pub id: String,
    pub secret: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<String>,
}

fn default_grant_types() -> Vec<String> {
    vec!["authorization_code".into(), "refresh_token".into()]
}

/// A user created at start-up if the login is not taken yet.
#[derive(Clone, Debug, Deserialize)]
pub struct UserSeed {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Issuer recorded in access tokens.
    pub issuer_url: String,
    /// Hosted login page users return to after a password reset.
    pub login_url: String,
    /// Page receiving the `hash` query parameter from reset emails.
    pub reset_password_url: String,
    pub token_signing_secret: String,
    #[serde(default = "default_true")]
    pub secure_cookies: bool,
    /// Browser origins allowed to call the API with the session cookie.
    /// Empty means same-origin only.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub clients: Vec<ClientSeed>,
    #[serde(default)]
    pub users: Vec<UserSeed>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_purge_interval_secs() -> u64 {
    900
}

impl AppConfig {
    /// Reject configurations the server cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_signing_secret.len() < 32 {
            return Err(ConfigError::Validation(
                "token_signing_secret must be at least 32 characters".into(),
            ));
        }
        for (name, value) in [
            ("issuer_url", &self.issuer_url),
            ("login_url", &self.login_url),
            ("reset_password_url", &self.reset_password_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::Validation(format!("{name} is not a valid URL: {e}")))?;
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::Validation("smtp.port must be > 0".into()));
        }
        let lifetimes = [
            ("authorization_code_lifetime", self.oauth.authorization_code_lifetime),
            ("access_token_lifetime", self.oauth.access_token_lifetime),
            ("refresh_token_lifetime", self.oauth.refresh_token_lifetime),
            ("session_lifetime", self.oauth.session_lifetime),
            ("remember_session_lifetime", self.oauth.remember_session_lifetime),
            ("reset_token_lifetime", self.oauth.reset_token_lifetime),
        ];
        if let Some((name, _)) = lifetimes.iter().find(|(_, secs)| *secs <= 0) {
            return Err(ConfigError::Validation(format!("oauth.{name} must be > 0")));
        }
        for client in &self.clients {
            if client.redirect_uris.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "client {} needs at least one redirect URI",
                    client.id
                )));
            }
        }
        for origin in &self.cors_allowed_origins {
            url::Url::parse(origin).map_err(|e| {
                ConfigError::Validation(format!("cors origin {origin} is not a valid URL: {e}"))
            })?;
        }
        for user in &self.users {
            validate_login(&user.login)
                .and_then(|_| validate_password(&user.password))
                .map_err(|e| {
                    ConfigError::Validation(format!("user seed {}: {e}", user.login))
                })?;
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any variable matching the key path separated by double underscores
/// (e.g. `SMTP__PORT`, `OAUTH__ACCESS_TOKEN_LIFETIME`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
