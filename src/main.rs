use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use shop_auth::configuration::get_configuration;
use shop_auth::session::SessionService;
use shop_auth::startup::run;
use shop_auth::store::PgStore;
use shop_auth::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

/// How often expired refresh records are swept
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn startup_error(kind: std::io::ErrorKind, what: &str) -> std::io::Error {
    std::io::Error::new(kind, what.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let connection_string = configuration.database.connection_string();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            startup_error(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    tracing::info!("Database connection pool created successfully");

    let store = Arc::new(PgStore::new(pool));
    let session = SessionService::from_settings(store.clone(), store, &configuration.jwt)
        .map_err(|e| {
            tracing::error!("Refusing to start: {}", e);
            startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
        })?;

    let reaper = session.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = reaper.purge_expired().await {
                tracing::error!(error = %e, "Failed to purge expired refresh tokens");
            }
        }
    });

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, session)?.await
}
