//! Muster Registry Server
//!
//! HTTP entry point for the fleet-registration backend.

use anyhow::{Context, Result};
use muster_server::{bootstrap, create_router, AppState, Config};
use muster_store::Database;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "muster_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration (environment over .env file)
    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Starting {} registry server", config.server_name);
    info!("Database file: {}", config.database_file.display());

    // Open the store; migrations run before anything else touches it
    let mut db =
        Database::open_at(&config.database_file).context("Failed to open registry database")?;

    // The admin account must exist before the first login can succeed
    let admin = bootstrap::ensure_admin(&mut db, &config.admin_username, &config.admin_password)
        .context("Failed to bootstrap admin user")?;
    info!(username = %admin.username, "admin account ready");

    let addr = config.address();
    let state = AppState::new(db, config);
    let app = create_router(state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Registry server listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
