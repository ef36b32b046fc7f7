//! Access/refresh token issuances.
//!
//! One row per pair handed out. The row id doubles as the access token `jti`;
//! rows produced by rotating each other share a `family_id`.

use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

use crate::oauth2::grant::GrantState;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub family_id: String,
    /// Issuance whose refresh token was rotated into this one
    pub parent_id: Option<String>,
    #[sea_orm(unique)]
    pub refresh_token_digest: String,
    pub client_id: String,
    pub user_id: String,
    pub issued_at: OffsetDateTime,
    pub access_token_expires_at: OffsetDateTime,
    pub refresh_token_expires_at: OffsetDateTime,
    pub rotated_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::oauth_user::Entity",
        from = "Column::UserId",
        to = "super::oauth_user::Column::Id"
    )]
    User,
}

impl Related<super::oauth_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// State of the refresh token held by this issuance.
    ///
    /// A rotated token reads as consumed even after its family was revoked
    /// or its lifetime ran out, so every later presentation is a reuse.
    pub fn refresh_state_at(&self, now: OffsetDateTime) -> GrantState {
        if self.rotated_at.is_some() {
            return GrantState::Consumed;
        }
        GrantState::evaluate(
            now,
            self.refresh_token_expires_at,
            self.rotated_at,
            self.revoked_at,
        )
    }
}
