//! Single-sign-on authorization server.
//!
//! Implements the authorization code and refresh token grants, SSO sessions
//! and an emailed password reset flow on top of a SeaORM store.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::email::ResetMailer;
use crate::oauth2::AuthorizationServer;

pub mod api;
pub mod clock;
pub mod config;
pub mod email;
pub mod email_templates;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod security;
pub mod validation;

#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub server: Arc<AuthorizationServer>,
}

impl AppResources {
    pub fn new(
        db: Arc<DatabaseConnection>,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn ResetMailer>,
        config: Arc<AppConfig>,
    ) -> Self {
        let server = Arc::new(AuthorizationServer::new(
            db.clone(),
            clock,
            mailer,
            &config,
        ));
        Self { db, config, server }
    }
}
