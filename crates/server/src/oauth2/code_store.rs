//! Issuance and single-use redemption of authorization codes.

use crate::clock::Clock;
use crate::entity::oauth_authorization_code;
use crate::error::AuthError;
use crate::oauth2::grant::GrantState;
use crate::security::{generate_token, token_digest};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, sea_query::Expr,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// A freshly issued code. `code` is the only copy of the clear value.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct CodeStore {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
}

impl CodeStore {
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>, lifetime_secs: i64) -> Self {
        Self {
            db,
            clock,
            lifetime: Duration::seconds(lifetime_secs),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn issue(
        &self,
        client_id: &str,
        user_id: &str,
        redirect_uri: &str,
    ) -> Result<AuthorizationCode, AuthError> {
        let code = generate_token()?;
        let now = self.clock.now();
        let expires_at = now + self.lifetime;

        oauth_authorization_code::ActiveModel {
            code_digest: Set(token_digest(&code)),
            client_id: Set(client_id.to_string()),
            user_id: Set(user_id.to_string()),
            redirect_uri: Set(redirect_uri.to_string()),
            issued_at: Set(now),
            expires_at: Set(expires_at),
            consumed_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await?;

        tracing::debug!("issued authorization code");
        Ok(AuthorizationCode {
            code,
            client_id: client_id.to_string(),
            user_id: user_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            expires_at,
        })
    }

    /// Redeem a code for the user it was issued to.
    ///
    /// The consumption is a compare-and-set on `consumed_at IS NULL`, so of
    /// any number of concurrent redeemers exactly one succeeds.
    #[tracing::instrument(skip(self, code))]
    pub async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: Option<&str>,
    ) -> Result<String, AuthError> {
        let digest = token_digest(code);
        let record = oauth_authorization_code::Entity::find_by_id(digest.clone())
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::CodeNotFound)?;

        let now = self.clock.now();
        match record.state_at(now) {
            GrantState::Active => {}
            GrantState::Expired => return Err(AuthError::CodeExpired),
            GrantState::Consumed | GrantState::Revoked => return Err(AuthError::CodeAlreadyUsed),
        }
        if record.client_id != client_id {
            return Err(AuthError::ClientMismatch);
        }
        if redirect_uri.is_some_and(|uri| uri != record.redirect_uri) {
            return Err(AuthError::RedirectMismatch);
        }

        let result = oauth_authorization_code::Entity::update_many()
            .col_expr(
                oauth_authorization_code::Column::ConsumedAt,
                Expr::value(Some(now)),
            )
            .filter(oauth_authorization_code::Column::CodeDigest.eq(digest))
            .filter(oauth_authorization_code::Column::ConsumedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected != 1 {
            tracing::warn!(client_id, "authorization code redeemed concurrently");
            return Err(AuthError::CodeAlreadyUsed);
        }

        tracing::debug!(user_id = %record.user_id, "authorization code redeemed");
        Ok(record.user_id)
    }

    /// Delete codes past their expiry. Returns the number of rows removed.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = oauth_authorization_code::Entity::delete_many()
            .filter(oauth_authorization_code::Column::ExpiresAt.lt(self.clock.now()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}

/// Mark every outstanding code of a user as consumed so none of them can be
/// exchanged any more. Runs on any connection, including a transaction.
pub async fn retire_codes_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    now: OffsetDateTime,
) -> Result<u64, AuthError> {
    let result = oauth_authorization_code::Entity::update_many()
        .col_expr(
            oauth_authorization_code::Column::ConsumedAt,
            Expr::value(Some(now)),
        )
        .filter(oauth_authorization_code::Column::UserId.eq(user_id))
        .filter(oauth_authorization_code::Column::ConsumedAt.is_null())
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
