//! Creates the identity tables of the authorization server.
//!
//! - oauth_client: registered clients with hashed secrets and exact redirect URIs
//! - oauth_user: user accounts with Argon2id password hashes

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OauthClient::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OauthClient::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OauthClient::SecretDigest).string().not_null())
                    .col(ColumnDef::new(OauthClient::Name).string().not_null())
                    .col(ColumnDef::new(OauthClient::RedirectUris).text().not_null())
                    .col(
                        ColumnDef::new(OauthClient::GrantTypes)
                            .text()
                            .not_null()
                            .default("authorization_code refresh_token"),
                    )
                    .col(
                        ColumnDef::new(OauthClient::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OauthUser::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OauthUser::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OauthUser::Login)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(OauthUser::Name).string().null())
                    .col(
                        ColumnDef::new(OauthUser::PasswordHash)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthUser::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthUser::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OauthUser::LastLoginAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OauthUser::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OauthClient::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OauthClient {
    Table,
    Id,
    SecretDigest,
    Name,
    RedirectUris,
    GrantTypes,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OauthUser {
    Table,
    Id,
    Login,
    Name,
    PasswordHash,
    CreatedAt,
    UpdatedAt,
    LastLoginAt,
}
