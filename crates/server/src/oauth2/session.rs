//! SSO sessions.
//!
//! A session id is handed to the browser once (as a cookie) and stored by
//! digest. Resolving a session slides its expiry forward.

use crate::clock::Clock;
use crate::entity::oauth_session;
use crate::error::AuthError;
use crate::oauth2::grant::GrantState;
use crate::security::{generate_token, token_digest};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, sea_query::Expr,
};
use std::sync::Arc;
use time::Duration;

/// A newly created session together with the clear session id.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    pub session: oauth_session::Model,
}

#[derive(Clone)]
pub struct SessionManager {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    remember_lifetime: Duration,
}

impl SessionManager {
    pub fn new(
        db: Arc<DatabaseConnection>,
        clock: Arc<dyn Clock>,
        lifetime_secs: i64,
        remember_lifetime_secs: i64,
    ) -> Self {
        Self {
            db,
            clock,
            lifetime: Duration::seconds(lifetime_secs),
            remember_lifetime: Duration::seconds(remember_lifetime_secs),
        }
    }

    pub fn lifetime(&self, remember: bool) -> Duration {
        if remember {
            self.remember_lifetime
        } else {
            self.lifetime
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&self, user_id: &str, remember: bool) -> Result<NewSession, AuthError> {
        let session_id = generate_token()?;
        let now = self.clock.now();
        let session = oauth_session::ActiveModel {
            session_digest: Set(token_digest(&session_id)),
            user_id: Set(user_id.to_string()),
            remember: Set(remember),
            created_at: Set(now),
            last_seen_at: Set(now),
            expires_at: Set(now + self.lifetime(remember)),
        }
        .insert(self.db.as_ref())
        .await?;

        tracing::debug!("created session");
        Ok(NewSession {
            session_id,
            session,
        })
    }

    /// Return the user owning a live session and extend the session.
    pub async fn resolve(&self, session_id: &str) -> Result<String, AuthError> {
        let digest = token_digest(session_id);
        let session = oauth_session::Entity::find_by_id(digest.clone())
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let now = self.clock.now();
        if session.state_at(now) != GrantState::Active {
            return Err(AuthError::SessionExpired);
        }

        oauth_session::Entity::update_many()
            .col_expr(oauth_session::Column::LastSeenAt, Expr::value(now))
            .col_expr(
                oauth_session::Column::ExpiresAt,
                Expr::value(now + self.lifetime(session.remember)),
            )
            .filter(oauth_session::Column::SessionDigest.eq(digest))
            .exec(self.db.as_ref())
            .await?;

        Ok(session.user_id)
    }

    /// Remove a session. Unknown ids are ignored.
    pub async fn destroy(&self, session_id: &str) -> Result<(), AuthError> {
        oauth_session::Entity::delete_by_id(token_digest(session_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    pub async fn destroy_all_for_user(&self, user_id: &str) -> Result<u64, AuthError> {
        delete_sessions_for_user(self.db.as_ref(), user_id).await
    }

    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = oauth_session::Entity::delete_many()
            .filter(oauth_session::Column::ExpiresAt.lt(self.clock.now()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}

/// Delete every session of a user on any connection or transaction.
pub async fn delete_sessions_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<u64, AuthError> {
    let result = oauth_session::Entity::delete_many()
        .filter(oauth_session::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
