//! User lookup and credential verification.

use crate::clock::Clock;
use crate::entity::oauth_user;
use crate::error::AuthError;
use crate::oauth2::password::{hash_password, verify_password};
use crate::validation::{normalize_login, validate_login, validate_password};
use once_cell::sync::Lazy;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, sea_query::Expr,
};
use std::sync::Arc;
use time::OffsetDateTime;

/// Hash verified against when the login is unknown, so both failure paths
/// cost one Argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("dummy-password").ok());

#[derive(Clone)]
pub struct UserDirectory {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
}

impl UserDirectory {
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn find_by_login(&self, login: &str) -> Result<Option<oauth_user::Model>, AuthError> {
        Ok(oauth_user::Entity::find()
            .filter(oauth_user::Column::Login.eq(normalize_login(login)))
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<oauth_user::Model>, AuthError> {
        Ok(oauth_user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?)
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        login: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<oauth_user::Model, AuthError> {
        let login = validate_login(login)?;
        validate_password(password)?;
        if self.find_by_login(&login).await?.is_some() {
            return Err(AuthError::Validation("login is already taken".to_string()));
        }

        let now = self.clock.now();
        let user = oauth_user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            login: Set(login),
            name: Set(name),
            password_hash: Set(hash_password(password)?),
            created_at: Set(now),
            updated_at: Set(now),
            last_login_at: Set(None),
        };
        let user = user.insert(self.db.as_ref()).await?;
        tracing::info!(user_id = %user.id, "created user");
        Ok(user)
    }

    /// Create a user unless the login is already taken. Existing users keep
    /// their password. Returns whether a user was created.
    pub async fn seed(
        &self,
        login: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<bool, AuthError> {
        if self.find_by_login(login).await?.is_some() {
            tracing::debug!("user already exists, skipping seed");
            return Ok(false);
        }
        self.create_user(login, password, name).await?;
        Ok(true)
    }

    /// Verify a login/password pair. Unknown logins and wrong passwords are
    /// indistinguishable to the caller.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<oauth_user::Model, AuthError> {
        let Some(user) = self.find_by_login(login).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash) {
            tracing::debug!(user_id = %user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        self.touch_last_login(&user.id).await?;
        Ok(user)
    }

    async fn touch_last_login(&self, user_id: &str) -> Result<(), AuthError> {
        oauth_user::Entity::update_many()
            .col_expr(
                oauth_user::Column::LastLoginAt,
                Expr::value(Some(self.clock.now())),
            )
            .filter(oauth_user::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}

/// Store a new password hash for a user on any connection or transaction.
pub async fn set_password_hash<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    password_hash: String,
    now: OffsetDateTime,
) -> Result<(), AuthError> {
    oauth_user::Entity::update_many()
        .col_expr(oauth_user::Column::PasswordHash, Expr::value(password_hash))
        .col_expr(oauth_user::Column::UpdatedAt, Expr::value(now))
        .filter(oauth_user::Column::Id.eq(user_id))
        .exec(conn)
        .await?;
    Ok(())
}
