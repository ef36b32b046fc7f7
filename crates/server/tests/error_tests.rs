//! Mapping of domain errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use sso_server::error::{AuthError, ErrorKind};

#[test]
fn grant_errors_share_one_public_code() {
    for err in [
        AuthError::CodeNotFound,
        AuthError::CodeExpired,
        AuthError::CodeAlreadyUsed,
        AuthError::ClientMismatch,
        AuthError::RefreshTokenAlreadyUsed,
        AuthError::RefreshTokenRevoked,
    ] {
        assert_eq!(err.kind(), ErrorKind::Grant);
        assert_eq!(err.error_code(), "invalid_grant");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}

#[test]
fn status_codes_follow_the_taxonomy() {
    assert_eq!(
        AuthError::Validation("x".into()).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AuthError::UnsupportedGrantType("password".into()).error_code(),
        "unsupported_grant_type"
    );
    assert_eq!(AuthError::UnknownClient.status(), StatusCode::BAD_REQUEST);
    assert_eq!(AuthError::UnknownClient.error_code(), "invalid_client");
    assert_eq!(
        AuthError::InvalidClientCredentials.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AuthError::InvalidCredentials.error_code(), "access_denied");
    assert_eq!(AuthError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AuthError::SessionNotFound.error_code(), "invalid_token");
    assert_eq!(
        AuthError::ResetTokenAlreadyUsed.error_code(),
        "invalid_reset_token"
    );
    assert_eq!(
        AuthError::Entropy("x".into()).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn internal_errors_hide_their_detail() {
    let response = AuthError::Store(sea_orm::DbErr::Custom("secret table name".into()))
        .into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn redirect_mismatch_is_a_client_error() {
    assert_eq!(AuthError::RedirectMismatch.kind(), ErrorKind::Client);
    assert_eq!(AuthError::RedirectMismatch.status(), StatusCode::BAD_REQUEST);
}
