//! SSO session lifecycle.

mod common;

use common::*;
use sso_server::error::AuthError;
use time::Duration;

#[tokio::test]
async fn created_session_resolves_to_its_user() {
    let ctx = setup().await;
    let sessions = &ctx.server().sessions;
    let created = sessions.create(&ctx.user_id, false).await.expect("create");

    assert_ne!(created.session_id, created.session.session_digest);
    let user_id = sessions.resolve(&created.session_id).await.expect("resolve");
    assert_eq!(user_id, ctx.user_id);
}

#[tokio::test]
async fn session_expires_without_activity() {
    let ctx = setup().await;
    let sessions = &ctx.server().sessions;
    let created = sessions.create(&ctx.user_id, false).await.expect("create");

    ctx.clock.advance(Duration::hours(13));

    let result = sessions.resolve(&created.session_id).await;
    assert!(matches!(result, Err(AuthError::SessionExpired)));
}

#[tokio::test]
async fn resolving_slides_the_expiry() {
    let ctx = setup().await;
    let sessions = &ctx.server().sessions;
    let created = sessions.create(&ctx.user_id, false).await.expect("create");

    ctx.clock.advance(Duration::hours(11));
    sessions.resolve(&created.session_id).await.expect("still valid");
    ctx.clock.advance(Duration::hours(11));
    sessions
        .resolve(&created.session_id)
        .await
        .expect("extended by the previous resolve");
}

#[tokio::test]
async fn remembered_session_outlives_a_normal_one() {
    let ctx = setup().await;
    let sessions = &ctx.server().sessions;
    let normal = sessions.create(&ctx.user_id, false).await.expect("create");
    let remembered = sessions.create(&ctx.user_id, true).await.expect("create");

    ctx.clock.advance(Duration::days(2));

    assert!(sessions.resolve(&normal.session_id).await.is_err());
    assert!(sessions.resolve(&remembered.session_id).await.is_ok());
}

#[tokio::test]
async fn destroyed_session_is_gone() {
    let ctx = setup().await;
    let sessions = &ctx.server().sessions;
    let created = sessions.create(&ctx.user_id, false).await.expect("create");

    sessions.destroy(&created.session_id).await.expect("destroy");

    let result = sessions.resolve(&created.session_id).await;
    assert!(matches!(result, Err(AuthError::SessionNotFound)));
}

#[tokio::test]
async fn destroy_all_for_user_removes_every_session() {
    let ctx = setup().await;
    let sessions = &ctx.server().sessions;
    let a = sessions.create(&ctx.user_id, false).await.expect("create");
    let b = sessions.create(&ctx.user_id, true).await.expect("create");

    let removed = sessions
        .destroy_all_for_user(&ctx.user_id)
        .await
        .expect("destroy all");
    assert_eq!(removed, 2);
    assert!(sessions.resolve(&a.session_id).await.is_err());
    assert!(sessions.resolve(&b.session_id).await.is_err());
}

#[tokio::test]
async fn purge_removes_expired_rows() {
    let ctx = setup().await;
    ctx.server()
        .sessions
        .create(&ctx.user_id, false)
        .await
        .expect("create");
    issue_code(&ctx).await;

    ctx.clock.advance(Duration::days(60));

    let report = ctx.server().purge_expired().await.expect("purge");
    assert_eq!(report.sessions, 1);
    assert_eq!(report.codes, 1);
}
