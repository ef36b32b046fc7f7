//! Access/refresh token issuance, verification and rotation.
//!
//! Access tokens are HS256 JWTs whose `jti` names the `oauth_token` row they
//! were issued with. Refresh tokens are opaque and stored by digest on the
//! same row. Rotating a refresh token marks its row rotated and inserts a
//! child row in the same family, in one transaction.

use crate::clock::Clock;
use crate::entity::oauth_token;
use crate::error::AuthError;
use crate::oauth2::grant::GrantState;
use crate::security::{generate_token, token_digest};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: String,
    /// Client id
    pub cid: String,
    /// Issuance row id
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Body of a successful token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
}

/// Caller identity proven by a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub user_id: String,
    pub client_id: String,
    pub token_id: String,
}

/// Settings for [`TokenIssuer`], taken from the `oauth` config section.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub issuer: String,
    pub signing_secret: String,
    pub access_token_lifetime: i64,
    pub refresh_token_lifetime: i64,
    pub revoke_family_on_replay: bool,
}

#[derive(Clone)]
pub struct TokenIssuer {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
    revoke_family_on_replay: bool,
}

impl TokenIssuer {
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>, settings: TokenSettings) -> Self {
        let secret = settings.signing_secret.as_bytes();
        Self {
            db,
            clock,
            issuer: settings.issuer,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_lifetime: Duration::seconds(settings.access_token_lifetime),
            refresh_lifetime: Duration::seconds(settings.refresh_token_lifetime),
            revoke_family_on_replay: settings.revoke_family_on_replay,
        }
    }

    /// Issue a pair starting a new token family.
    #[tracing::instrument(skip(self))]
    pub async fn issue_token_pair(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<TokenPair, AuthError> {
        let family_id = uuid::Uuid::new_v4().to_string();
        let pair = self
            .insert_issuance(self.db.as_ref(), user_id, client_id, &family_id, None)
            .await?;
        tracing::info!(
            name = "oauth2.token.issued",
            family_id = %family_id,
            "issued token pair"
        );
        Ok(pair)
    }

    async fn insert_issuance<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        client_id: &str,
        family_id: &str,
        parent_id: Option<String>,
    ) -> Result<TokenPair, AuthError> {
        let now = self.clock.now();
        let token_id = uuid::Uuid::new_v4().to_string();
        let refresh_token = generate_token()?;
        let access_expires_at = now + self.access_lifetime;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            cid: client_id.to_string(),
            jti: token_id.clone(),
            iat: now.unix_timestamp(),
            exp: access_expires_at.unix_timestamp(),
            iss: self.issuer.clone(),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        oauth_token::ActiveModel {
            id: Set(token_id),
            family_id: Set(family_id.to_string()),
            parent_id: Set(parent_id),
            refresh_token_digest: Set(token_digest(&refresh_token)),
            client_id: Set(client_id.to_string()),
            user_id: Set(user_id.to_string()),
            issued_at: Set(now),
            access_token_expires_at: Set(access_expires_at),
            refresh_token_expires_at: Set(now + self.refresh_lifetime),
            rotated_at: Set(None),
            revoked_at: Set(None),
        }
        .insert(conn)
        .await?;

        Ok(TokenPair {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.access_lifetime.whole_seconds(),
            refresh_token,
        })
    }

    /// Verify signature, issuer and expiry of an access token, and that its
    /// issuance has not been revoked.
    pub async fn verify_access_token(&self, token: &str) -> Result<AccessGrant, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let claims = decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                AuthError::TokenInvalid
            })?
            .claims;

        if claims.exp <= self.clock.now().unix_timestamp() {
            return Err(AuthError::TokenExpired);
        }

        let issuance = oauth_token::Entity::find_by_id(claims.jti.clone())
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if issuance.revoked_at.is_some()
            || issuance.user_id != claims.sub
            || issuance.client_id != claims.cid
        {
            return Err(AuthError::TokenInvalid);
        }

        Ok(AccessGrant {
            user_id: claims.sub,
            client_id: claims.cid,
            token_id: claims.jti,
        })
    }

    /// Exchange a refresh token for a new pair, invalidating the presented one.
    #[tracing::instrument(skip(self, refresh_token))]
    pub async fn rotate_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<TokenPair, AuthError> {
        let record = oauth_token::Entity::find()
            .filter(oauth_token::Column::RefreshTokenDigest.eq(token_digest(refresh_token)))
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::RefreshTokenNotFound)?;
        if record.client_id != client_id {
            return Err(AuthError::RefreshTokenNotFound);
        }

        let now = self.clock.now();
        match record.refresh_state_at(now) {
            GrantState::Active => {}
            GrantState::Revoked => return Err(AuthError::RefreshTokenRevoked),
            GrantState::Expired => return Err(AuthError::RefreshTokenExpired),
            GrantState::Consumed => {
                tracing::warn!(
                    name = "oauth2.token.replay_detected",
                    family_id = %record.family_id,
                    user_id = %record.user_id,
                    "rotated refresh token presented again"
                );
                if self.revoke_family_on_replay {
                    let revoked = self.revoke_family(&record.family_id).await?;
                    tracing::warn!(family_id = %record.family_id, revoked, "revoked token family");
                }
                return Err(AuthError::RefreshTokenAlreadyUsed);
            }
        }

        let txn = self.db.begin().await?;
        let result = oauth_token::Entity::update_many()
            .col_expr(oauth_token::Column::RotatedAt, Expr::value(Some(now)))
            .filter(oauth_token::Column::Id.eq(record.id.clone()))
            .filter(oauth_token::Column::RotatedAt.is_null())
            .filter(oauth_token::Column::RevokedAt.is_null())
            .exec(&txn)
            .await?;
        if result.rows_affected != 1 {
            txn.rollback().await?;
            tracing::warn!(family_id = %record.family_id, "refresh token rotated concurrently");
            return Err(AuthError::RefreshTokenAlreadyUsed);
        }

        let pair = self
            .insert_issuance(
                &txn,
                &record.user_id,
                &record.client_id,
                &record.family_id,
                Some(record.id.clone()),
            )
            .await?;
        txn.commit().await?;

        tracing::info!(
            name = "oauth2.token.rotated",
            family_id = %record.family_id,
            user_id = %record.user_id,
            "rotated refresh token"
        );
        Ok(pair)
    }

    async fn revoke_family(&self, family_id: &str) -> Result<u64, AuthError> {
        let result = oauth_token::Entity::update_many()
            .col_expr(
                oauth_token::Column::RevokedAt,
                Expr::value(Some(self.clock.now())),
            )
            .filter(oauth_token::Column::FamilyId.eq(family_id))
            .filter(oauth_token::Column::RevokedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    /// Revoke the issuance behind one access token.
    pub async fn revoke_issuance(&self, token_id: &str) -> Result<(), AuthError> {
        oauth_token::Entity::update_many()
            .col_expr(
                oauth_token::Column::RevokedAt,
                Expr::value(Some(self.clock.now())),
            )
            .filter(oauth_token::Column::Id.eq(token_id))
            .filter(oauth_token::Column::RevokedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Revoke every live issuance of a user.
    pub async fn invalidate_all_for_user(&self, user_id: &str) -> Result<u64, AuthError> {
        revoke_all_for_user(self.db.as_ref(), user_id, self.clock.now()).await
    }

    /// Delete issuances whose refresh token has expired.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = oauth_token::Entity::delete_many()
            .filter(oauth_token::Column::RefreshTokenExpiresAt.lt(self.clock.now()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}

/// Revoke every live issuance of a user on any connection or transaction.
pub async fn revoke_all_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    now: OffsetDateTime,
) -> Result<u64, AuthError> {
    let result = oauth_token::Entity::update_many()
        .col_expr(oauth_token::Column::RevokedAt, Expr::value(Some(now)))
        .filter(oauth_token::Column::UserId.eq(user_id))
        .filter(oauth_token::Column::RevokedAt.is_null())
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
