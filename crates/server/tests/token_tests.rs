//! Access token verification and refresh token rotation.

mod common;

use common::*;
use sso_server::config::OAuthConfig;
use sso_server::error::AuthError;
use time::Duration;

#[tokio::test]
async fn issued_access_token_verifies() {
    let ctx = setup().await;
    let pair = ctx
        .server()
        .tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");

    assert_eq!(pair.token_type, "Bearer");
    assert_eq!(pair.expires_in, 3600);
    assert_ne!(pair.access_token, pair.refresh_token);

    let grant = ctx
        .server()
        .tokens
        .verify_access_token(&pair.access_token)
        .await
        .expect("verify");
    assert_eq!(grant.user_id, ctx.user_id);
    assert_eq!(grant.client_id, CLIENT_ID);
}

#[tokio::test]
async fn access_token_expires_with_the_clock() {
    let ctx = setup().await;
    let pair = ctx
        .server()
        .tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");

    ctx.clock.advance(Duration::seconds(3601));

    let result = ctx.server().tokens.verify_access_token(&pair.access_token).await;
    assert!(matches!(result, Err(AuthError::TokenExpired)));
}

#[tokio::test]
async fn tampered_access_token_is_invalid() {
    let ctx = setup().await;
    let pair = ctx
        .server()
        .tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");

    let mut tampered = pair.access_token.clone();
    tampered.push('x');
    let result = ctx.server().tokens.verify_access_token(&tampered).await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));

    let result = ctx.server().tokens.verify_access_token("not-a-jwt").await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));
}

#[tokio::test]
async fn refresh_rotation_invalidates_the_old_token() {
    let ctx = setup().await;
    let tokens = &ctx.server().tokens;
    let first = tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");

    let second = tokens
        .rotate_refresh_token(&first.refresh_token, CLIENT_ID)
        .await
        .expect("rotate");
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_ne!(second.access_token, first.access_token);

    let replay = tokens
        .rotate_refresh_token(&first.refresh_token, CLIENT_ID)
        .await;
    assert!(matches!(replay, Err(AuthError::RefreshTokenAlreadyUsed)));
}

#[tokio::test]
async fn replay_revokes_the_whole_family() {
    let ctx = setup().await;
    let tokens = &ctx.server().tokens;
    let first = tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");
    let second = tokens
        .rotate_refresh_token(&first.refresh_token, CLIENT_ID)
        .await
        .expect("rotate");

    let replay = tokens
        .rotate_refresh_token(&first.refresh_token, CLIENT_ID)
        .await;
    assert!(matches!(replay, Err(AuthError::RefreshTokenAlreadyUsed)));

    // The legitimate successor is gone too.
    let successor = tokens
        .rotate_refresh_token(&second.refresh_token, CLIENT_ID)
        .await;
    assert!(matches!(successor, Err(AuthError::RefreshTokenRevoked)));
    let access = tokens.verify_access_token(&second.access_token).await;
    assert!(matches!(access, Err(AuthError::TokenInvalid)));

    // Presenting the original again is still reported as reuse.
    let again = tokens
        .rotate_refresh_token(&first.refresh_token, CLIENT_ID)
        .await;
    assert!(matches!(again, Err(AuthError::RefreshTokenAlreadyUsed)));
}

#[tokio::test]
async fn replay_keeps_family_when_revocation_is_disabled() {
    let mut config = test_config();
    config.oauth = OAuthConfig {
        revoke_family_on_replay: false,
        ..OAuthConfig::default()
    };
    let ctx = setup_with(sso_server::email::RecordingMailer::new(), config).await;
    let tokens = &ctx.server().tokens;
    let first = tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");
    let second = tokens
        .rotate_refresh_token(&first.refresh_token, CLIENT_ID)
        .await
        .expect("rotate");

    assert!(
        tokens
            .rotate_refresh_token(&first.refresh_token, CLIENT_ID)
            .await
            .is_err()
    );
    assert!(
        tokens
            .rotate_refresh_token(&second.refresh_token, CLIENT_ID)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn refresh_token_is_bound_to_its_client() {
    let ctx = setup().await;
    let pair = ctx
        .server()
        .tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");

    let result = ctx
        .server()
        .tokens
        .rotate_refresh_token(&pair.refresh_token, "other_app")
        .await;
    assert!(matches!(result, Err(AuthError::RefreshTokenNotFound)));
}

#[tokio::test]
async fn expired_refresh_token_is_rejected() {
    let ctx = setup().await;
    let pair = ctx
        .server()
        .tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");

    ctx.clock.advance(Duration::days(31));

    let result = ctx
        .server()
        .tokens
        .rotate_refresh_token(&pair.refresh_token, CLIENT_ID)
        .await;
    assert!(matches!(result, Err(AuthError::RefreshTokenExpired)));
}

#[tokio::test]
async fn invalidate_all_for_user_revokes_every_issuance() {
    let ctx = setup().await;
    let tokens = &ctx.server().tokens;
    let a = tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");
    let b = tokens
        .issue_token_pair(&ctx.user_id, CLIENT_ID)
        .await
        .expect("issue");

    let revoked = tokens
        .invalidate_all_for_user(&ctx.user_id)
        .await
        .expect("invalidate");
    assert_eq!(revoked, 2);

    for pair in [a, b] {
        assert!(matches!(
            tokens.verify_access_token(&pair.access_token).await,
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            tokens.rotate_refresh_token(&pair.refresh_token, CLIENT_ID).await,
            Err(AuthError::RefreshTokenRevoked)
        ));
    }
}
