use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every failure the authorization engine can report.
///
/// The variants are precise so that logs and tests can tell them apart, but
/// the HTTP mapping collapses them into a handful of stable error codes (see
/// [`ErrorKind`]) so a caller never learns which field or lookup failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("Unknown client")]
    UnknownClient,
    #[error("Unsupported response type")]
    UnsupportedResponseType,
    #[error("Redirect URI does not match a registered URI")]
    RedirectMismatch,
    #[error("Invalid client credentials")]
    InvalidClientCredentials,
    #[error("Grant type not allowed for this client")]
    GrantNotAllowed,

    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("Authorization code not found")]
    CodeNotFound,
    #[error("Authorization code expired")]
    CodeExpired,
    #[error("Authorization code already used")]
    CodeAlreadyUsed,
    #[error("Authorization code was issued to another client")]
    ClientMismatch,

    #[error("Refresh token not found")]
    RefreshTokenNotFound,
    #[error("Refresh token expired")]
    RefreshTokenExpired,
    #[error("Refresh token already used")]
    RefreshTokenAlreadyUsed,
    #[error("Refresh token revoked")]
    RefreshTokenRevoked,

    #[error("Access token invalid")]
    TokenInvalid,
    #[error("Access token expired")]
    TokenExpired,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Session expired")]
    SessionExpired,

    #[error("Reset token not found")]
    ResetTokenNotFound,
    #[error("Reset token expired")]
    ResetTokenExpired,
    #[error("Reset token already used")]
    ResetTokenAlreadyUsed,

    #[error("Store error: {0}")]
    Store(#[from] sea_orm::DbErr),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Token signing failed: {0}")]
    Signing(String),
    #[error("Random source unavailable: {0}")]
    Entropy(String),
    #[error("Server misconfigured: {0}")]
    Misconfigured(String),
}

/// Error taxonomy exposed at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing parameters.
    Validation,
    /// Unknown client, redirect mismatch, bad secret.
    Client,
    /// Bad login or password.
    Authentication,
    /// Authorization code or refresh token that cannot be redeemed.
    Grant,
    /// Access token or session that no longer authenticates the caller.
    Unauthorized,
    /// Password reset hash that cannot be consumed.
    Reset,
    Internal,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        use AuthError::*;
        match self {
            Validation(_) | UnsupportedGrantType(_) => ErrorKind::Validation,
            UnknownClient
            | UnsupportedResponseType
            | RedirectMismatch
            | InvalidClientCredentials
            | GrantNotAllowed => ErrorKind::Client,
            InvalidCredentials => ErrorKind::Authentication,
            CodeNotFound
            | CodeExpired
            | CodeAlreadyUsed
            | ClientMismatch
            | RefreshTokenNotFound
            | RefreshTokenExpired
            | RefreshTokenAlreadyUsed
            | RefreshTokenRevoked => ErrorKind::Grant,
            TokenInvalid | TokenExpired | SessionNotFound | SessionExpired => {
                ErrorKind::Unauthorized
            }
            ResetTokenNotFound | ResetTokenExpired | ResetTokenAlreadyUsed => ErrorKind::Reset,
            Store(_) | PasswordHash(_) | Signing(_) | Entropy(_) | Misconfigured(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable machine-readable code for the response body.
    pub fn error_code(&self) -> &'static str {
        match (self, self.kind()) {
            (AuthError::UnsupportedGrantType(_), _) => "unsupported_grant_type",
            (_, ErrorKind::Validation) => "invalid_request",
            (_, ErrorKind::Client) => "invalid_client",
            (_, ErrorKind::Authentication) => "access_denied",
            (_, ErrorKind::Grant) => "invalid_grant",
            (_, ErrorKind::Unauthorized) => "invalid_token",
            (_, ErrorKind::Reset) => "invalid_reset_token",
            (_, ErrorKind::Internal) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match (self, self.kind()) {
            (AuthError::InvalidClientCredentials, _) => StatusCode::UNAUTHORIZED,
            (_, ErrorKind::Validation | ErrorKind::Client | ErrorKind::Grant | ErrorKind::Reset) => {
                StatusCode::BAD_REQUEST
            }
            (_, ErrorKind::Authentication | ErrorKind::Unauthorized) => StatusCode::UNAUTHORIZED,
            (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic, enumeration-safe description for the response body.
    fn public_description(&self) -> Option<String> {
        match self.kind() {
            // Validation messages only ever describe the caller's own input.
            ErrorKind::Validation => Some(self.to_string()),
            ErrorKind::Client => Some("Invalid client".to_string()),
            ErrorKind::Authentication => Some("Invalid login or password".to_string()),
            ErrorKind::Grant => Some("The provided grant is invalid".to_string()),
            ErrorKind::Unauthorized => Some("Missing or invalid credentials".to_string()),
            ErrorKind::Reset => Some("The reset link is invalid or has expired".to_string()),
            ErrorKind::Internal => None,
        }
    }
}

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.kind() == ErrorKind::Internal {
            tracing::error!(error = %self, "internal error while serving request");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "request rejected");
        }
        let body = ErrorResponse {
            error: self.error_code().to_string(),
            error_description: self.public_description(),
        };
        (self.status(), Json(body)).into_response()
    }
}
