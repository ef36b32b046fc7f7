//! HTTP surface: OAuth2 routes plus `/healthz`.

pub mod health;

use crate::AppResources;
use crate::oauth2::{self, OAuth2State};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Build the full application router.
pub fn app_router(resources: &AppResources) -> Router {
    let state = OAuth2State::new(resources.server.clone(), resources.config.secure_cookies);
    let router = Router::new()
        .merge(oauth2::router(state))
        .route("/healthz", get(health::health).head(health::health));

    let router = match cors_layer(&resources.config.cors_allowed_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

/// Credentialed CORS for the configured origins, so the session cookie
/// travels with cross-origin requests. No layer when nothing is configured.
fn cors_layer(allowed_origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin.trim_end_matches('/')).ok())
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::HEAD])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(resources))]
pub async fn start_webserver(resources: AppResources) -> color_eyre::Result<()> {
    let router = app_router(&resources);
    let addr = resources.config.listen_addr.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
