//! Shared fixtures: a migrated in-memory database, a manual clock, a
//! recording mailer, one registered client and one user.

#![allow(dead_code)]

use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sso_server::AppResources;
use sso_server::api::app_router;
use sso_server::clock::ManualClock;
use sso_server::config::{AppConfig, OAuthConfig, SmtpConfig, StoreConfig};
use sso_server::email::RecordingMailer;
use sso_server::oauth2::AuthorizationServer;
use sso_server::oauth2::client_registry::NewClient;
use std::sync::Arc;

pub const CLIENT_ID: &str = "app_id";
pub const CLIENT_SECRET: &str = "secret";
pub const REDIRECT_URI: &str = "https://app.example/cb";
pub const LOGIN: &str = "name@example.com";
pub const PASSWORD: &str = "qwerty";

pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<RecordingMailer>,
    pub resources: AppResources,
    pub user_id: String,
}

impl TestContext {
    pub fn server(&self) -> &AuthorizationServer {
        &self.resources.server
    }

    pub fn http(&self) -> TestServer {
        TestServer::new(app_router(&self.resources)).expect("test server")
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        listen_addr: "127.0.0.1:0".to_string(),
        issuer_url: "https://sso.example".to_string(),
        login_url: "https://sso.example/login".to_string(),
        reset_password_url: "https://sso.example/reset".to_string(),
        token_signing_secret: "test-signing-secret-0123456789abcdef".to_string(),
        secure_cookies: false,
        cors_allowed_origins: Vec::new(),
        purge_interval_secs: 0,
        smtp: SmtpConfig {
            server: "localhost".to_string(),
            port: 25,
            username: "user".to_string(),
            password: "pass".to_string(),
            from: "noreply@sso.example".to_string(),
        },
        oauth: OAuthConfig::default(),
        store: StoreConfig::default(),
        clients: Vec::new(),
        users: Vec::new(),
    }
}

pub async fn test_db() -> DatabaseConnection {
    // A single connection so every query sees the same in-memory database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("connect");
    Migrator::up(&db, None).await.expect("migrate");
    db
}

pub async fn setup() -> TestContext {
    setup_with(RecordingMailer::new(), test_config()).await
}

pub async fn setup_with(mailer: RecordingMailer, config: AppConfig) -> TestContext {
    let db = Arc::new(test_db().await);
    let clock = Arc::new(ManualClock::default());
    let mailer = Arc::new(mailer);
    let resources = AppResources::new(
        db.clone(),
        clock.clone(),
        mailer.clone(),
        Arc::new(config),
    );

    resources
        .server
        .clients
        .register(NewClient {
            id: CLIENT_ID.to_string(),
            secret: CLIENT_SECRET.to_string(),
            name: "Example App".to_string(),
            redirect_uris: vec![REDIRECT_URI.to_string()],
            grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
        })
        .await
        .expect("register client");

    let user = resources
        .server
        .users
        .create_user(LOGIN, PASSWORD, Some("Name".to_string()))
        .await
        .expect("create user");

    TestContext {
        db,
        clock,
        mailer,
        resources,
        user_id: user.id,
    }
}

/// Issue a code for the seeded user through the code store.
pub async fn issue_code(ctx: &TestContext) -> String {
    ctx.server()
        .codes
        .issue(CLIENT_ID, &ctx.user_id, REDIRECT_URI)
        .await
        .expect("issue code")
        .code
}
