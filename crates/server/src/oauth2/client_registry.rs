//! Database-backed registry of client applications.

use crate::clock::Clock;
use crate::entity::oauth_client;
use crate::error::AuthError;
use crate::security::{digest_matches, token_digest};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};
use std::sync::Arc;

/// The only `response_type` accepted at the authorize endpoint.
pub const RESPONSE_TYPE_CODE: &str = "code";

/// Client registration input. The secret is only ever stored as a digest.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub id: String,
    pub secret: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
}

impl From<crate::config::ClientSeed> for NewClient {
    fn from(seed: crate::config::ClientSeed) -> Self {
        Self {
            id: seed.id,
            secret: seed.secret,
            name: seed.name,
            redirect_uris: seed.redirect_uris,
            grant_types: seed.grant_types,
        }
    }
}

#[derive(Clone)]
pub struct ClientRegistry {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
}

impl ClientRegistry {
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    async fn find(&self, client_id: &str) -> Result<Option<oauth_client::Model>, AuthError> {
        Ok(oauth_client::Entity::find_by_id(client_id)
            .one(self.db.as_ref())
            .await?)
    }

    /// Check an authorize request's `(client_id, response_type, redirect_uri)` triple.
    pub async fn validate(
        &self,
        client_id: &str,
        response_type: &str,
        redirect_uri: &str,
    ) -> Result<oauth_client::Model, AuthError> {
        let client = self
            .find(client_id)
            .await?
            .ok_or(AuthError::UnknownClient)?;

        if response_type != RESPONSE_TYPE_CODE {
            return Err(AuthError::UnsupportedResponseType);
        }
        if !client.is_redirect_uri_allowed(redirect_uri) {
            return Err(AuthError::RedirectMismatch);
        }
        Ok(client)
    }

    /// Authenticate a confidential client. Unknown ids and wrong secrets fail
    /// identically.
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<oauth_client::Model, AuthError> {
        match self.find(client_id).await? {
            Some(client) if digest_matches(client_secret, &client.secret_digest) => Ok(client),
            Some(_) => Err(AuthError::InvalidClientCredentials),
            None => {
                // Same amount of hashing work as the known-client path.
                let _ = digest_matches(client_secret, "");
                Err(AuthError::InvalidClientCredentials)
            }
        }
    }

    #[tracing::instrument(skip(self, new), fields(client_id = %new.id))]
    pub async fn register(&self, new: NewClient) -> Result<oauth_client::Model, AuthError> {
        if new.redirect_uris.is_empty() {
            return Err(AuthError::Validation(
                "a client needs at least one redirect URI".to_string(),
            ));
        }
        for uri in &new.redirect_uris {
            url::Url::parse(uri)
                .map_err(|_| AuthError::Validation(format!("invalid redirect URI: {uri}")))?;
        }
        let redirect_uris = serde_json::to_string(&new.redirect_uris)
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let client = oauth_client::ActiveModel {
            id: Set(new.id),
            secret_digest: Set(token_digest(&new.secret)),
            name: Set(new.name),
            redirect_uris: Set(redirect_uris),
            grant_types: Set(new.grant_types.join(" ")),
            created_at: Set(self.clock.now()),
        };
        let client = client.insert(self.db.as_ref()).await?;
        tracing::info!("registered client");
        Ok(client)
    }

    /// Register a client unless its id is already taken. Existing clients are
    /// left untouched. Returns whether a client was created.
    pub async fn seed(&self, new: NewClient) -> Result<bool, AuthError> {
        if self.find(&new.id).await?.is_some() {
            tracing::debug!(client_id = %new.id, "client already registered, skipping seed");
            return Ok(false);
        }
        self.register(new).await?;
        Ok(true)
    }
}
