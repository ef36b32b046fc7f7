//! Shared state handed to the OAuth2 handlers.

use crate::oauth2::server::AuthorizationServer;
use std::sync::Arc;

#[derive(Clone)]
pub struct OAuth2State {
    pub server: Arc<AuthorizationServer>,
    /// Mark the session cookie `Secure`. Only disabled for plain-HTTP development.
    pub secure_cookies: bool,
}

impl OAuth2State {
    pub fn new(server: Arc<AuthorizationServer>, secure_cookies: bool) -> Self {
        Self {
            server,
            secure_cookies,
        }
    }
}
