//! User directory: configuration seeding and credential checks.

mod common;

use common::*;
use sso_server::error::AuthError;

#[tokio::test]
async fn seeding_creates_a_user_that_can_log_in() {
    let ctx = setup().await;
    let users = &ctx.server().users;

    let created = users
        .seed("Admin@Example.com", "change-me", Some("Admin".to_string()))
        .await
        .expect("seed");
    assert!(created);

    let user = users
        .authenticate("admin@example.com", "change-me")
        .await
        .expect("seeded user logs in");
    assert_eq!(user.name.as_deref(), Some("Admin"));
}

#[tokio::test]
async fn seeding_leaves_existing_users_untouched() {
    let ctx = setup().await;
    let users = &ctx.server().users;

    let created = users
        .seed(LOGIN, "another-password", None)
        .await
        .expect("seed");
    assert!(!created);

    // The original password still works, the seeded one was ignored.
    assert!(users.authenticate(LOGIN, PASSWORD).await.is_ok());
    assert!(matches!(
        users.authenticate(LOGIN, "another-password").await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn seeding_rejects_invalid_credentials() {
    let ctx = setup().await;
    assert!(matches!(
        ctx.server().users.seed("admin@example.com", "abc", None).await,
        Err(AuthError::Validation(_))
    ));
}
