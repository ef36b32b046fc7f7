//! Client parameter validation and client authentication.

mod common;

use common::*;
use sso_server::error::AuthError;
use sso_server::oauth2::client_registry::NewClient;

#[tokio::test]
async fn valid_triple_returns_the_client() {
    let ctx = setup().await;
    let client = ctx
        .server()
        .clients
        .validate(CLIENT_ID, "code", REDIRECT_URI)
        .await
        .expect("valid");
    assert_eq!(client.id, CLIENT_ID);
    assert_eq!(client.name, "Example App");
}

#[tokio::test]
async fn altering_any_field_fails_validation() {
    let ctx = setup().await;
    let clients = &ctx.server().clients;

    assert!(matches!(
        clients.validate("unknown", "code", REDIRECT_URI).await,
        Err(AuthError::UnknownClient)
    ));
    assert!(matches!(
        clients.validate(CLIENT_ID, "token", REDIRECT_URI).await,
        Err(AuthError::UnsupportedResponseType)
    ));
    assert!(matches!(
        clients
            .validate(CLIENT_ID, "code", "https://app.example/cb/evil")
            .await,
        Err(AuthError::RedirectMismatch)
    ));
    assert!(matches!(
        clients.validate(CLIENT_ID, "code", "https://app.example").await,
        Err(AuthError::RedirectMismatch)
    ));
}

#[tokio::test]
async fn client_secret_is_checked() {
    let ctx = setup().await;
    let clients = &ctx.server().clients;

    assert!(clients.authenticate_client(CLIENT_ID, CLIENT_SECRET).await.is_ok());
    assert!(matches!(
        clients.authenticate_client(CLIENT_ID, "wrong").await,
        Err(AuthError::InvalidClientCredentials)
    ));
    assert!(matches!(
        clients.authenticate_client("unknown", CLIENT_SECRET).await,
        Err(AuthError::InvalidClientCredentials)
    ));
}

#[tokio::test]
async fn secret_is_not_stored_in_the_clear() {
    let ctx = setup().await;
    let client = ctx
        .server()
        .clients
        .validate(CLIENT_ID, "code", REDIRECT_URI)
        .await
        .expect("valid");
    assert_ne!(client.secret_digest, CLIENT_SECRET);
}

#[tokio::test]
async fn seeding_is_idempotent() {
    let ctx = setup().await;
    let seed = NewClient {
        id: CLIENT_ID.to_string(),
        secret: "different".to_string(),
        name: "Renamed".to_string(),
        redirect_uris: vec!["https://elsewhere.example/cb".to_string()],
        grant_types: vec!["authorization_code".to_string()],
    };

    let created = ctx.server().clients.seed(seed).await.expect("seed");
    assert!(!created);
    // The original registration is untouched.
    assert!(
        ctx.server()
            .clients
            .authenticate_client(CLIENT_ID, CLIENT_SECRET)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn registration_rejects_bad_redirect_uris() {
    let ctx = setup().await;
    let mut new = NewClient {
        id: "second".to_string(),
        secret: "s".to_string(),
        name: "Second".to_string(),
        redirect_uris: Vec::new(),
        grant_types: vec!["authorization_code".to_string()],
    };
    assert!(matches!(
        ctx.server().clients.register(new.clone()).await,
        Err(AuthError::Validation(_))
    ));

    new.redirect_uris = vec!["/relative/cb".to_string()];
    assert!(matches!(
        ctx.server().clients.register(new).await,
        Err(AuthError::Validation(_))
    ));
}
