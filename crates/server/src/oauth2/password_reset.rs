//! Out-of-band password reset.
//!
//! A reset hash is mailed to the user and can be consumed once. Consuming it
//! changes the password and signs the user out everywhere: every session is
//! deleted, every token issuance revoked and every unredeemed authorization
//! code retired, in the same transaction as the consumption itself.

use crate::clock::Clock;
use crate::email::{ResetEmail, ResetMailer};
use crate::email_templates::human_duration;
use crate::entity::password_reset_token;
use crate::error::AuthError;
use crate::oauth2::code_store::retire_codes_for_user;
use crate::oauth2::grant::GrantState;
use crate::oauth2::password::hash_password;
use crate::oauth2::session::delete_sessions_for_user;
use crate::oauth2::token_issuer::revoke_all_for_user;
use crate::oauth2::users::{UserDirectory, set_password_hash};
use crate::security::{generate_token, token_digest};
use crate::validation::validate_password;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait, sea_query::Expr,
};
use std::sync::Arc;
use time::Duration;

/// Authorize request the user started from; the user is sent back to it once
/// the password is changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnTo {
    pub client_id: String,
    pub redirect_uri: String,
    pub state: Option<String>,
}

/// Reset token issued for a known login. The clear hash only travels by email.
#[derive(Debug, Clone)]
pub struct IssuedReset {
    pub hash: String,
    pub record: password_reset_token::Model,
}

/// Outcome of a consumed reset.
#[derive(Debug, Clone)]
pub struct CompletedReset {
    pub user_id: String,
    pub return_to: ReturnTo,
}

#[derive(Clone)]
pub struct PasswordResetFlow {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
    users: UserDirectory,
    mailer: Arc<dyn ResetMailer>,
    reset_password_url: String,
    lifetime: Duration,
}

impl PasswordResetFlow {
    pub fn new(
        db: Arc<DatabaseConnection>,
        clock: Arc<dyn Clock>,
        users: UserDirectory,
        mailer: Arc<dyn ResetMailer>,
        reset_password_url: String,
        lifetime_secs: i64,
    ) -> Self {
        Self {
            db,
            clock,
            users,
            mailer,
            reset_password_url,
            lifetime: Duration::seconds(lifetime_secs),
        }
    }

    /// Start a reset for `login`.
    ///
    /// Unknown logins yield `Ok(None)` and send nothing; the caller reports
    /// success either way.
    #[tracing::instrument(skip(self, login))]
    pub async fn request_reset(
        &self,
        login: &str,
        return_to: ReturnTo,
    ) -> Result<Option<IssuedReset>, AuthError> {
        let Some(user) = self.users.find_by_login(login).await? else {
            tracing::debug!("password reset requested for unknown login");
            return Ok(None);
        };

        let now = self.clock.now();
        // Only the newest link stays usable.
        password_reset_token::Entity::update_many()
            .col_expr(
                password_reset_token::Column::ConsumedAt,
                Expr::value(Some(now)),
            )
            .filter(password_reset_token::Column::UserId.eq(user.id.clone()))
            .filter(password_reset_token::Column::ConsumedAt.is_null())
            .exec(self.db.as_ref())
            .await?;

        let hash = generate_token()?;
        let record = password_reset_token::ActiveModel {
            hash_digest: Set(token_digest(&hash)),
            user_id: Set(user.id.clone()),
            client_id: Set(return_to.client_id),
            redirect_uri: Set(return_to.redirect_uri),
            state: Set(return_to.state),
            issued_at: Set(now),
            expires_at: Set(now + self.lifetime),
            consumed_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await?;

        let email = ResetEmail {
            to: user.login.clone(),
            reset_url: self.reset_link(&hash)?,
            expires_in: human_duration(self.lifetime.whole_seconds()),
        };
        if let Err(e) = self.mailer.send_reset(&email).await {
            tracing::error!(
                name = "oauth2.password_reset.mail_failed",
                user_id = %user.id,
                error = %e,
                "failed to send password reset email"
            );
        } else {
            tracing::info!(user_id = %user.id, "password reset email sent");
        }

        Ok(Some(IssuedReset { hash, record }))
    }

    fn reset_link(&self, hash: &str) -> Result<String, AuthError> {
        let mut url = url::Url::parse(&self.reset_password_url)
            .map_err(|e| AuthError::Misconfigured(format!("reset_password_url: {e}")))?;
        url.query_pairs_mut().append_pair("hash", hash);
        Ok(url.to_string())
    }

    /// Consume a reset hash and set a new password.
    #[tracing::instrument(skip(self, hash, new_password))]
    pub async fn consume_reset(
        &self,
        hash: &str,
        new_password: &str,
    ) -> Result<CompletedReset, AuthError> {
        validate_password(new_password)?;

        let digest = token_digest(hash);
        let record = password_reset_token::Entity::find_by_id(digest.clone())
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::ResetTokenNotFound)?;

        let now = self.clock.now();
        match record.state_at(now) {
            GrantState::Active => {}
            GrantState::Expired => return Err(AuthError::ResetTokenExpired),
            GrantState::Consumed | GrantState::Revoked => {
                return Err(AuthError::ResetTokenAlreadyUsed);
            }
        }

        // Hash before opening the transaction; Argon2 is slow.
        let password_hash = hash_password(new_password)?;

        let txn = self.db.begin().await?;
        let result = password_reset_token::Entity::update_many()
            .col_expr(
                password_reset_token::Column::ConsumedAt,
                Expr::value(Some(now)),
            )
            .filter(password_reset_token::Column::HashDigest.eq(digest))
            .filter(password_reset_token::Column::ConsumedAt.is_null())
            .exec(&txn)
            .await?;
        if result.rows_affected != 1 {
            txn.rollback().await?;
            return Err(AuthError::ResetTokenAlreadyUsed);
        }

        set_password_hash(&txn, &record.user_id, password_hash, now).await?;
        let revoked = revoke_all_for_user(&txn, &record.user_id, now).await?;
        let sessions = delete_sessions_for_user(&txn, &record.user_id).await?;
        let codes = retire_codes_for_user(&txn, &record.user_id, now).await?;
        txn.commit().await?;

        tracing::info!(
            name = "oauth2.password_reset.completed",
            user_id = %record.user_id,
            revoked_tokens = revoked,
            deleted_sessions = sessions,
            retired_codes = codes,
            "password reset completed"
        );
        Ok(CompletedReset {
            user_id: record.user_id,
            return_to: ReturnTo {
                client_id: record.client_id,
                redirect_uri: record.redirect_uri,
                state: record.state,
            },
        })
    }

    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = password_reset_token::Entity::delete_many()
            .filter(password_reset_token::Column::ExpiresAt.lt(self.clock.now()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}
