pub mod oauth_authorization_code;
pub mod oauth_client;
pub mod oauth_session;
pub mod oauth_token;
pub mod oauth_user;
pub mod password_reset_token;
