//! Creates the tables holding one-time grants and sessions.
//!
//! Every opaque credential (authorization code, refresh token, session id,
//! reset hash) is stored as a SHA-256 digest, never in the clear.
//!
//! - oauth_authorization_code: short-lived codes bound to client, user and redirect URI
//! - oauth_token: one row per access/refresh issuance, grouped into rotation families
//! - oauth_session: SSO sessions backing the profile endpoints
//! - password_reset_token: single-use password reset hashes

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OauthAuthorizationCode::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OauthAuthorizationCode::CodeDigest)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OauthAuthorizationCode::ClientId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthAuthorizationCode::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthAuthorizationCode::RedirectUri)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthAuthorizationCode::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthAuthorizationCode::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthAuthorizationCode::ConsumedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OauthToken::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OauthToken::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OauthToken::FamilyId).string().not_null())
                    .col(ColumnDef::new(OauthToken::ParentId).string().null())
                    .col(
                        ColumnDef::new(OauthToken::RefreshTokenDigest)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(OauthToken::ClientId).string().not_null())
                    .col(ColumnDef::new(OauthToken::UserId).string().not_null())
                    .col(
                        ColumnDef::new(OauthToken::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthToken::AccessTokenExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthToken::RefreshTokenExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthToken::RotatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OauthToken::RevokedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OauthSession::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OauthSession::SessionDigest)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OauthSession::UserId).string().not_null())
                    .col(
                        ColumnDef::new(OauthSession::Remember)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OauthSession::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthSession::LastSeenAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthSession::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PasswordResetToken::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PasswordResetToken::HashDigest)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PasswordResetToken::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PasswordResetToken::ClientId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PasswordResetToken::RedirectUri)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PasswordResetToken::State).text().null())
                    .col(
                        ColumnDef::new(PasswordResetToken::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PasswordResetToken::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PasswordResetToken::ConsumedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth_token_user_id")
                    .table(OauthToken::Table)
                    .col(OauthToken::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth_token_family_id")
                    .table(OauthToken::Table)
                    .col(OauthToken::FamilyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth_session_user_id")
                    .table(OauthSession::Table)
                    .col(OauthSession::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_password_reset_token_user_id")
                    .table(PasswordResetToken::Table)
                    .col(PasswordResetToken::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_password_reset_token_user_id")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_oauth_session_user_id").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_oauth_token_family_id").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_oauth_token_user_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(PasswordResetToken::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OauthSession::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OauthToken::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(OauthAuthorizationCode::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OauthAuthorizationCode {
    Table,
    CodeDigest,
    ClientId,
    UserId,
    RedirectUri,
    IssuedAt,
    ExpiresAt,
    ConsumedAt,
}

#[derive(DeriveIden)]
enum OauthToken {
    Table,
    Id,
    FamilyId,
    ParentId,
    RefreshTokenDigest,
    ClientId,
    UserId,
    IssuedAt,
    AccessTokenExpiresAt,
    RefreshTokenExpiresAt,
    RotatedAt,
    RevokedAt,
}

#[derive(DeriveIden)]
enum OauthSession {
    Table,
    SessionDigest,
    UserId,
    Remember,
    CreatedAt,
    LastSeenAt,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum PasswordResetToken {
    Table,
    HashDigest,
    UserId,
    ClientId,
    RedirectUri,
    State,
    IssuedAt,
    ExpiresAt,
    ConsumedAt,
}
