//! OAuth2 HTTP endpoints.
//!
//! - `POST /oauth/v1/authorize` - log in (session or credentials) and get a code
//! - `GET /oauth/v1/client` - validate authorize parameters
//! - `GET /oauth/v1/profile` - current user
//! - `POST /oauth/v1/profile/logout` - end session / revoke bearer token
//! - `POST /v1/oauth/forgot-password` - mail a reset link
//! - `POST /v1/oauth/reset-password` - consume a reset link
//! - `POST /v1/oauth/token` - authorization_code and refresh_token grants

use crate::error::AuthError;
use crate::oauth2::server::{
    AuthorizeParams, ClientInfo, Credential, LoginForm, Profile, TokenRequest,
};
use crate::oauth2::state::OAuth2State;
use crate::oauth2::token_issuer::TokenPair;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequestParts, Query, State},
    http::{HeaderMap, header, request::Parts},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub const SESSION_COOKIE: &str = "sso_session";

/// Creates the OAuth2 router.
pub fn router(state: OAuth2State) -> Router {
    Router::new()
        .route("/oauth/v1/authorize", post(authorize))
        .route("/oauth/v1/client", get(client))
        .route("/oauth/v1/profile", get(profile))
        .route("/oauth/v1/profile/logout", post(logout))
        .route("/v1/oauth/forgot-password", post(forgot_password))
        .route("/v1/oauth/reset-password", post(reset_password))
        .route("/v1/oauth/token", post(token))
        .with_state(state)
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordBody {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordQuery {
    #[serde(default)]
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordBody {
    pub password: String,
}

/// Credential presented to the profile endpoints: a bearer token if an
/// `Authorization` header is present, the session cookie otherwise.
pub struct CallerCredential(pub Credential);

impl<S> FromRequestParts<S> for CallerCredential
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            return match value.strip_prefix("Bearer ") {
                Some(token) if !token.trim().is_empty() => {
                    Ok(CallerCredential(Credential::Bearer(token.trim().to_string())))
                }
                _ => Err(AuthError::TokenInvalid),
            };
        }

        let jar = CookieJar::from_headers(&parts.headers);
        match jar.get(SESSION_COOKIE) {
            Some(cookie) if !cookie.value().is_empty() => Ok(CallerCredential(
                Credential::Session(cookie.value().to_string()),
            )),
            _ => Err(AuthError::SessionNotFound),
        }
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// Authorization endpoint.
///
/// Uses the SSO session cookie when it is still valid, the posted credentials
/// otherwise. Responds with the client's redirect URL carrying the code.
///
/// The client triple is checked before the body is looked at, so a bad
/// client is reported as such whatever it posted.
#[tracing::instrument(skip_all, fields(client_id = %params.client_id))]
pub async fn authorize(
    State(state): State<OAuth2State>,
    jar: CookieJar,
    Query(params): Query<AuthorizeParams>,
    body: Bytes,
) -> Result<(CookieJar, Json<UrlResponse>), AuthError> {
    state.server.check_client(&params).await?;
    let form = parse_login_form(&body)?;
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let outcome = state
        .server
        .authorize(&params, session_id.as_deref(), &form)
        .await?;

    let jar = match outcome.new_session {
        Some(new_session) => {
            let mut cookie = Cookie::build((SESSION_COOKIE, new_session.session_id))
                .path("/")
                .http_only(true)
                .secure(state.secure_cookies)
                .same_site(SameSite::Lax);
            if new_session.session.remember {
                cookie = cookie.max_age(state.server.sessions.lifetime(true));
            }
            jar.add(cookie)
        }
        None => jar,
    };

    Ok((jar, Json(UrlResponse { url: outcome.url })))
}

/// Validate `response_type`, `client_id` and `redirect_uri` before showing a login form.
#[tracing::instrument(skip_all)]
pub async fn client(
    State(state): State<OAuth2State>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Json<ClientInfo>, AuthError> {
    Ok(Json(state.server.check_client(&params).await?))
}

#[tracing::instrument(skip_all)]
pub async fn profile(
    State(state): State<OAuth2State>,
    CallerCredential(credential): CallerCredential,
) -> Result<Json<Profile>, AuthError> {
    Ok(Json(state.server.profile(&credential).await?))
}

#[tracing::instrument(skip_all)]
pub async fn logout(
    State(state): State<OAuth2State>,
    jar: CookieJar,
    CallerCredential(credential): CallerCredential,
) -> Result<(CookieJar, Json<MessageResponse>), AuthError> {
    state.server.logout(&credential).await?;

    let jar = match credential {
        Credential::Session(_) => jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Credential::Bearer(_) => jar,
    };
    Ok((
        jar,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    ))
}

/// Always answers with the same message so callers cannot probe for accounts.
#[tracing::instrument(skip_all, fields(client_id = %params.client_id))]
pub async fn forgot_password(
    State(state): State<OAuth2State>,
    Query(params): Query<AuthorizeParams>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AuthError> {
    state.server.check_client(&params).await?;
    let body: ForgotPasswordBody = parse_json_body(&body)?;
    state.server.forgot_password(&params, &body.login).await?;
    Ok(Json(MessageResponse {
        message: "If the account exists, a password reset link has been sent".to_string(),
    }))
}

#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<OAuth2State>,
    Query(query): Query<ResetPasswordQuery>,
    body: Bytes,
) -> Result<Json<UrlResponse>, AuthError> {
    let body: ResetPasswordBody = parse_json_body(&body)?;
    let url = state
        .server
        .reset_password(&query.hash, &body.password)
        .await?;
    Ok(Json(UrlResponse { url }))
}

/// Token endpoint. Client credentials come from HTTP Basic auth or the query.
#[tracing::instrument(skip_all, fields(grant_type = %params.grant_type))]
pub async fn token(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Query(mut params): Query<TokenRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    if let Some((client_id, client_secret)) = basic_client_credentials(&headers) {
        params.client_id = Some(client_id);
        params.client_secret = Some(client_secret);
    }
    Ok(Json(state.server.token(&params).await?))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// JSON bodies are parsed here rather than with the `Json` extractor so that
/// malformed input is answered with the usual `invalid_request` error.
fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AuthError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "rejected request body");
        AuthError::Validation("malformed request body".to_string())
    })
}

/// An empty body means the caller relies on its session cookie.
fn parse_login_form(body: &[u8]) -> Result<LoginForm, AuthError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LoginForm::default());
    }
    parse_json_body(body)
}

fn basic_client_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let creds = String::from_utf8(decoded).ok()?;
    let (id, secret) = creds.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn basic_credentials_are_decoded() {
        let mut headers = HeaderMap::new();
        let encoded = base64::engine::general_purpose::STANDARD.encode("app_id:secret");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).expect("header"),
        );
        assert_eq!(
            basic_client_credentials(&headers),
            Some(("app_id".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn empty_login_body_means_no_credentials() {
        let form = parse_login_form(b"").expect("empty body");
        assert!(form.login.is_none() && form.password.is_none() && !form.remember);

        let form = parse_login_form(br#"{"login":"name@example.com","password":"qwerty","remember":true}"#)
            .expect("json body");
        assert_eq!(form.login.as_deref(), Some("name@example.com"));
        assert!(form.remember);

        assert!(matches!(
            parse_login_form(b"not json"),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn missing_fields_are_validation_errors() {
        assert!(matches!(
            parse_json_body::<ForgotPasswordBody>(b"{}"),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            parse_json_body::<ResetPasswordBody>(br#"{"password":"newpass"}"#),
            Ok(ResetPasswordBody { .. })
        ));
    }

    #[test]
    fn malformed_basic_credentials_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        assert_eq!(basic_client_credentials(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(basic_client_credentials(&headers), None);
    }
}
