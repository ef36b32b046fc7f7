use lettre::{AsyncSmtpTransport, Tokio1Executor, transport::smtp::authentication::Credentials};
use migration::{Migrator, MigratorTrait};
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::{ConnectOptions, Database};
use sso_server::AppResources;
use sso_server::api::start_webserver;
use sso_server::clock::SystemClock;
use sso_server::config::load_config;
use sso_server::email::SmtpResetMailer;
use sso_server::oauth2::client_registry::NewClient;
use sso_server::oauth2::purge::spawn_purge_task;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "sso_server=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    initialize_tracing();

    let config = Arc::new(load_config()?);

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider)
        .map_err(|_| color_eyre::eyre::eyre!("Failed to install crypto provider"))?;

    // Set up SeaORM database connection
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.store.max_connections)
        .connect_timeout(config.store.connect_timeout())
        .acquire_timeout(config.store.acquire_timeout())
        .sqlx_logging(false);
    let db = Arc::new(Database::connect(options).await?);
    Migrator::up(db.as_ref(), None).await?;

    // Set up lettre SMTP client
    let creds = Credentials::new(config.smtp.username.clone(), config.smtp.password.clone());
    let transport = Arc::new(
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp.server)?
            .port(config.smtp.port)
            .credentials(creds)
            .build(),
    );
    let mailer = Arc::new(SmtpResetMailer::new(transport, config.smtp.from.clone()));

    let resources = AppResources::new(db, Arc::new(SystemClock), mailer, config.clone());

    for seed in config.clients.iter().cloned() {
        let client_id = seed.id.clone();
        if resources.server.clients.seed(NewClient::from(seed)).await? {
            tracing::info!(client_id = %client_id, "seeded client from configuration");
        }
    }

    for seed in &config.users {
        if resources
            .server
            .users
            .seed(&seed.login, &seed.password, seed.name.clone())
            .await?
        {
            tracing::info!(login = %seed.login, "seeded user from configuration");
        }
    }

    spawn_purge_task(resources.server.clone(), config.purge_interval_secs);

    start_webserver(resources).await?;
    Ok(())
}
