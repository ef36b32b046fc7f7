//! Lifecycle state shared by every one-time artefact.

use time::OffsetDateTime;

/// State of a code, refresh token, session or reset hash at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    Active,
    Consumed,
    Expired,
    Revoked,
}

impl GrantState {
    /// Resolve the state of an artefact. A revocation wins over expiry, and
    /// expiry wins over consumption.
    pub fn evaluate(
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
        consumed_at: Option<OffsetDateTime>,
        revoked_at: Option<OffsetDateTime>,
    ) -> Self {
        if revoked_at.is_some() {
            GrantState::Revoked
        } else if expires_at <= now {
            GrantState::Expired
        } else if consumed_at.is_some() {
            GrantState::Consumed
        } else {
            GrantState::Active
        }
    }
}
