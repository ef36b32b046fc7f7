//! Input rules for user-supplied credentials.

pub mod credentials;

pub use credentials::{normalize_login, validate_login, validate_password};
