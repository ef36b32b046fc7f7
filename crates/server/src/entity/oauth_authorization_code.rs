//! One-time authorization codes exchanged at the token endpoint.

use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

use crate::oauth2::grant::GrantState;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_authorization_code")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code_digest: String,
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
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
