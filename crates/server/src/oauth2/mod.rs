//! OAuth2 authorization server.
//!
//! ## Supported Flows
//!
//! - Authorization Code (confidential clients)
//! - Refresh Token, with rotation and replay detection
//! - Password reset by emailed single-use link
//!
//! All one-time credentials are stored as SHA-256 digests and consumed with a
//! compare-and-set update, so concurrent redemptions have exactly one winner.

pub mod client_registry;
pub mod code_store;
pub mod endpoints;
pub mod grant;
pub mod password;
pub mod password_reset;
pub mod purge;
pub mod server;
pub mod session;
pub mod token_issuer;
pub mod users;
mod state;

pub use endpoints::router;
pub use grant::GrantState;
pub use password::{hash_password, verify_password};
pub use server::AuthorizationServer;
pub use state::OAuth2State;
