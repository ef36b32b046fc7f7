//! Single-use password reset hashes.

use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

use crate::oauth2::grant::GrantState;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "password_reset_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub hash_digest: String,
    pub user_id: String,
    /// Client flow the user returns to once the password is changed
    pub client_id: String,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub consumed_at: Option<OffsetDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn state_at(&self, now: OffsetDateTime) -> GrantState {
        GrantState::evaluate(now, self.expires_at, self.consumed_at, None)
    }
}
