//! Registered client applications.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth_client")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// SHA-256 digest of the client secret
    #[serde(skip_serializing)]
    pub secret_digest: String,
    pub name: String,
    /// JSON array of registered redirect URIs
    pub redirect_uris: String,
    /// Space-separated list of allowed grant types
    pub grant_types: String,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse redirect URIs from JSON string
    pub fn redirect_uris_list(&self) -> Vec<String> {
        serde_json::from_str(&self.redirect_uris).unwrap_or_default()
    }

    /// Exact string match against one of the registered URIs.
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris_list()
            .iter()
            .any(|allowed| allowed == uri)
    }

    pub fn allows_grant(&self, grant_type: &str) -> bool {
        self.grant_types
            .split_whitespace()
            .any(|g| g == grant_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Model {
        Model {
            id: "app_id".into(),
            secret_digest: String::new(),
            name: "App".into(),
            redirect_uris: r#"["https://app.example/cb","https://app.example/other"]"#.into(),
            grant_types: "authorization_code refresh_token".into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn redirect_uri_must_match_exactly() {
        let c = client();
        assert!(c.is_redirect_uri_allowed("https://app.example/cb"));
        assert!(!c.is_redirect_uri_allowed("https://app.example/cb/"));
        assert!(!c.is_redirect_uri_allowed("https://app.example/cb?x=1"));
        assert!(!c.is_redirect_uri_allowed("https://app.example/"));
    }

    #[test]
    fn grant_types_are_checked_by_name() {
        let mut c = client();
        assert!(c.allows_grant("refresh_token"));
        c.grant_types = "authorization_code".into();
        assert!(!c.allows_grant("refresh_token"));
        assert!(!c.allows_grant("refresh"));
    }
}
