//! SSO sessions established by a successful login.

use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

use crate::oauth2::grant::GrantState;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_session")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_digest: String,
    pub user_id: String,
    pub remember: bool,
    pub created_at: OffsetDateTime,
    pub last_seen_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
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
    pub fn state_at(&self, now: OffsetDateTime) -> GrantState {
        GrantState::evaluate(now, self.expires_at, None, None)
    }
}
