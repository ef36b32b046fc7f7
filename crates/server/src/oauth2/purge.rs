//! Periodic removal of expired grants.
//!
//! Expiry is always checked at use time, so purging only keeps tables small.

use crate::oauth2::server::AuthorizationServer;
use std::sync::Arc;
use std::time::Duration;

pub fn spawn_purge_task(server: Arc<AuthorizationServer>, interval_secs: u64) {
    if interval_secs == 0 {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            run_purge(&server).await;
        }
    });
}

async fn run_purge(server: &AuthorizationServer) {
    match server.purge_expired().await {
        Ok(report) => tracing::debug!(
            name = "oauth2.purge.completed",
            codes = report.codes,
            tokens = report.tokens,
            sessions = report.sessions,
            reset_tokens = report.reset_tokens,
            "purged expired grants"
        ),
        Err(e) => tracing::warn!(
            name = "oauth2.purge.failed",
            error = %e,
            "failed to purge expired grants"
        ),
    }
}
