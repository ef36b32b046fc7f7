//! The authorization server: composes client, user, code, token, session
//! and reset handling into the operations exposed over HTTP.

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::email::ResetMailer;
use crate::error::AuthError;
use crate::oauth2::client_registry::{ClientRegistry, RESPONSE_TYPE_CODE};
use crate::oauth2::code_store::{AuthorizationCode, CodeStore};
use crate::oauth2::password_reset::{PasswordResetFlow, ReturnTo};
use crate::oauth2::session::{NewSession, SessionManager};
use crate::oauth2::token_issuer::{TokenIssuer, TokenPair, TokenSettings};
use crate::oauth2::users::UserDirectory;
use crate::validation::{validate_login, validate_password};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Query parameters shared by authorize, client check and forgot password.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeParams {
    #[serde(default)]
    pub response_type: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    pub state: Option<String>,
}

/// Credentials posted to the authorize endpoint. Empty when the caller relies
/// on an existing session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    pub login: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
}

/// How the caller of a profile endpoint proves who they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Session(String),
    Bearer(String),
}

#[derive(Debug, Clone)]
pub struct AuthorizeOutcome {
    /// Registered redirect URI carrying `code` and `state`
    pub url: String,
    /// Present when this request logged the user in with credentials
    pub new_session: Option<NewSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Rows removed by one purge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub codes: u64,
    pub tokens: u64,
    pub sessions: u64,
    pub reset_tokens: u64,
}

/// Steps of one authorize attempt.
enum AuthorizeStep {
    AwaitingLogin,
    CodeIssued {
        code: AuthorizationCode,
        new_session: Option<NewSession>,
    },
    Redirected(AuthorizeOutcome),
}

#[derive(Clone)]
pub struct AuthorizationServer {
    pub clients: ClientRegistry,
    pub users: UserDirectory,
    pub codes: CodeStore,
    pub tokens: TokenIssuer,
    pub sessions: SessionManager,
    pub resets: PasswordResetFlow,
    login_url: String,
}

impl AuthorizationServer {
    pub fn new(
        db: Arc<DatabaseConnection>,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn ResetMailer>,
        config: &AppConfig,
    ) -> Self {
        let oauth = &config.oauth;
        let users = UserDirectory::new(db.clone(), clock.clone());
        Self {
            clients: ClientRegistry::new(db.clone(), clock.clone()),
            codes: CodeStore::new(db.clone(), clock.clone(), oauth.authorization_code_lifetime),
            tokens: TokenIssuer::new(
                db.clone(),
                clock.clone(),
                TokenSettings {
                    issuer: config.issuer_url.clone(),
                    signing_secret: config.token_signing_secret.clone(),
                    access_token_lifetime: oauth.access_token_lifetime,
                    refresh_token_lifetime: oauth.refresh_token_lifetime,
                    revoke_family_on_replay: oauth.revoke_family_on_replay,
                },
            ),
            sessions: SessionManager::new(
                db.clone(),
                clock.clone(),
                oauth.session_lifetime,
                oauth.remember_session_lifetime,
            ),
            resets: PasswordResetFlow::new(
                db,
                clock,
                users.clone(),
                mailer,
                config.reset_password_url.clone(),
                oauth.reset_token_lifetime,
            ),
            users,
            login_url: config.login_url.clone(),
        }
    }

    /// Validate authorize parameters without logging anyone in.
    pub async fn check_client(&self, params: &AuthorizeParams) -> Result<ClientInfo, AuthError> {
        let client = self
            .clients
            .validate(&params.client_id, &params.response_type, &params.redirect_uri)
            .await?;
        Ok(ClientInfo {
            client_id: client.id,
            name: client.name,
        })
    }

    /// Authenticate the user (session first, then credentials) and issue an
    /// authorization code for the client.
    #[tracing::instrument(skip(self, session_id, form), fields(client_id = %params.client_id))]
    pub async fn authorize(
        &self,
        params: &AuthorizeParams,
        session_id: Option<&str>,
        form: &LoginForm,
    ) -> Result<AuthorizeOutcome, AuthError> {
        // Client errors are reported before anything about the user.
        self.clients
            .validate(&params.client_id, &params.response_type, &params.redirect_uri)
            .await?;

        let mut step = AuthorizeStep::AwaitingLogin;
        loop {
            step = match step {
                AuthorizeStep::AwaitingLogin => {
                    let (user_id, new_session) = self.login(session_id, form).await?;
                    let code = self
                        .codes
                        .issue(&params.client_id, &user_id, &params.redirect_uri)
                        .await?;
                    AuthorizeStep::CodeIssued { code, new_session }
                }
                AuthorizeStep::CodeIssued { code, new_session } => {
                    let url = redirect_with_code(&code, params.state.as_deref())?;
                    tracing::info!(
                        name = "oauth2.authorize.code_issued",
                        user_id = %code.user_id,
                        "authorization code issued"
                    );
                    AuthorizeStep::Redirected(AuthorizeOutcome { url, new_session })
                }
                AuthorizeStep::Redirected(outcome) => return Ok(outcome),
            };
        }
    }

    async fn login(
        &self,
        session_id: Option<&str>,
        form: &LoginForm,
    ) -> Result<(String, Option<NewSession>), AuthError> {
        if let Some(session_id) = session_id {
            match self.sessions.resolve(session_id).await {
                Ok(user_id) => return Ok((user_id, None)),
                Err(AuthError::SessionNotFound | AuthError::SessionExpired) => {
                    tracing::debug!("session unusable, falling back to credentials");
                }
                Err(e) => return Err(e),
            }
        }

        let (Some(login), Some(password)) = (form.login.as_deref(), form.password.as_deref())
        else {
            return Err(AuthError::Validation(
                "login and password are required".to_string(),
            ));
        };
        let login = validate_login(login)?;
        validate_password(password)?;

        let user = self.users.authenticate(&login, password).await?;
        let session = self.sessions.create(&user.id, form.remember).await?;
        Ok((user.id, Some(session)))
    }

    /// Token endpoint: client authentication, then the requested grant.
    #[tracing::instrument(skip(self, request), fields(grant_type = %request.grant_type))]
    pub async fn token(&self, request: &TokenRequest) -> Result<TokenPair, AuthError> {
        if request.grant_type != GRANT_AUTHORIZATION_CODE
            && request.grant_type != GRANT_REFRESH_TOKEN
        {
            return Err(AuthError::UnsupportedGrantType(request.grant_type.clone()));
        }
        let client_id = required(request.client_id.as_deref(), "client_id")?;
        let client_secret = required(request.client_secret.as_deref(), "client_secret")?;

        let client = self
            .clients
            .authenticate_client(client_id, client_secret)
            .await?;
        if !client.allows_grant(&request.grant_type) {
            return Err(AuthError::GrantNotAllowed);
        }

        if request.grant_type == GRANT_AUTHORIZATION_CODE {
            let code = required(request.code.as_deref(), "code")?;
            let user_id = self
                .codes
                .redeem(code, &client.id, request.redirect_uri.as_deref())
                .await?;
            self.tokens.issue_token_pair(&user_id, &client.id).await
        } else {
            let refresh_token = required(request.refresh_token.as_deref(), "refresh_token")?;
            self.tokens
                .rotate_refresh_token(refresh_token, &client.id)
                .await
        }
    }

    /// Start a password reset. Succeeds whether or not the login exists.
    #[tracing::instrument(skip(self, login), fields(client_id = %params.client_id))]
    pub async fn forgot_password(
        &self,
        params: &AuthorizeParams,
        login: &str,
    ) -> Result<(), AuthError> {
        self.clients
            .validate(&params.client_id, &params.response_type, &params.redirect_uri)
            .await?;
        let login = validate_login(login)?;

        self.resets
            .request_reset(
                &login,
                ReturnTo {
                    client_id: params.client_id.clone(),
                    redirect_uri: params.redirect_uri.clone(),
                    state: params.state.clone(),
                },
            )
            .await?;
        Ok(())
    }

    /// Consume a reset hash; returns the login page URL to continue the
    /// original authorize request.
    pub async fn reset_password(&self, hash: &str, password: &str) -> Result<String, AuthError> {
        if hash.is_empty() {
            return Err(AuthError::Validation("hash is required".to_string()));
        }
        let completed = self.resets.consume_reset(hash, password).await?;

        let mut url = url::Url::parse(&self.login_url)
            .map_err(|e| AuthError::Misconfigured(format!("login_url: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", RESPONSE_TYPE_CODE)
                .append_pair("client_id", &completed.return_to.client_id)
                .append_pair("redirect_uri", &completed.return_to.redirect_uri);
            if let Some(state) = &completed.return_to.state {
                query.append_pair("state", state);
            }
        }
        Ok(url.to_string())
    }

    async fn authenticate(&self, credential: &Credential) -> Result<String, AuthError> {
        match credential {
            Credential::Session(session_id) => self.sessions.resolve(session_id).await,
            Credential::Bearer(token) => Ok(self.tokens.verify_access_token(token).await?.user_id),
        }
    }

    pub async fn profile(&self, credential: &Credential) -> Result<Profile, AuthError> {
        let user_id = self.authenticate(credential).await?;
        let user = self.users.find_by_id(&user_id).await?.ok_or(match credential {
            Credential::Session(_) => AuthError::SessionNotFound,
            Credential::Bearer(_) => AuthError::TokenInvalid,
        })?;

        Ok(Profile {
            id: user.id,
            name: user.name,
            email: user.login,
            created_at: format_timestamp(user.created_at)?,
            updated_at: format_timestamp(user.updated_at)?,
        })
    }

    /// End the caller's session, or revoke the access token they presented.
    #[tracing::instrument(skip(self, credential))]
    pub async fn logout(&self, credential: &Credential) -> Result<(), AuthError> {
        match credential {
            Credential::Session(session_id) => {
                let user_id = self.sessions.resolve(session_id).await?;
                self.sessions.destroy(session_id).await?;
                tracing::info!(user_id = %user_id, "session ended");
            }
            Credential::Bearer(token) => {
                let grant = self.tokens.verify_access_token(token).await?;
                self.tokens.revoke_issuance(&grant.token_id).await?;
                tracing::info!(user_id = %grant.user_id, client_id = %grant.client_id, "access token revoked");
            }
        }
        Ok(())
    }

    /// Delete expired codes, issuances, sessions and reset tokens.
    pub async fn purge_expired(&self) -> Result<PurgeReport, AuthError> {
        Ok(PurgeReport {
            codes: self.codes.purge_expired().await?,
            tokens: self.tokens.purge_expired().await?,
            sessions: self.sessions.purge_expired().await?,
            reset_tokens: self.resets.purge_expired().await?,
        })
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AuthError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AuthError::Validation(format!("{name} is required"))),
    }
}

fn redirect_with_code(code: &AuthorizationCode, state: Option<&str>) -> Result<String, AuthError> {
    let mut url = url::Url::parse(&code.redirect_uri)
        .map_err(|e| AuthError::Misconfigured(format!("registered redirect URI: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("code", &code.code);
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Ok(url.to_string())
}

fn format_timestamp(ts: time::OffsetDateTime) -> Result<String, AuthError> {
    ts.format(&Rfc3339)
        .map_err(|e| AuthError::Misconfigured(format!("timestamp formatting: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn code(redirect_uri: &str) -> AuthorizationCode {
        AuthorizationCode {
            code: "abc".into(),
            client_id: "app_id".into(),
            user_id: "u1".into(),
            redirect_uri: redirect_uri.into(),
            expires_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn redirect_carries_code_and_state() {
        let url = redirect_with_code(&code("https://app.example/cb"), Some("xyz")).expect("url");
        assert_eq!(url, "https://app.example/cb?code=abc&state=xyz");
    }

    #[test]
    fn redirect_keeps_existing_query_and_encodes_state() {
        let url = redirect_with_code(&code("https://app.example/cb?tenant=1"), Some("a b&c"))
            .expect("url");
        let parsed = url::Url::parse(&url).expect("parse");
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("tenant".into(), "1".into()),
                ("code".into(), "abc".into()),
                ("state".into(), "a b&c".into()),
            ]
        );
    }

    #[test]
    fn redirect_without_state_omits_it() {
        let url = redirect_with_code(&code("https://app.example/cb"), None).expect("url");
        assert_eq!(url, "https://app.example/cb?code=abc");
    }

    #[test]
    fn required_rejects_missing_and_empty() {
        assert!(required(None, "code").is_err());
        assert!(required(Some(""), "code").is_err());
        assert_eq!(required(Some("x"), "code").expect("present"), "x");
    }
}
