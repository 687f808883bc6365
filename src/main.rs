//! Biblio bootstrap
//!
//! Prepares the database for the catalog and identity services: runs the
//! migrations and makes sure an administrator account exists.

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biblio_core::{config::AppConfig, repository::Repository, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // RUST_LOG wins over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let level = &config.logging.level;
            format!("biblio_core={level},biblio_bootstrap={level},audit=info").into()
        });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Biblio bootstrap v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    let services = Services::new(Repository::new(pool), &config.hashing)?;

    let login = config.bootstrap.admin_login.as_str();
    match config.bootstrap.admin_password.clone() {
        Some(password) => {
            if services.identity.ensure_admin(login, password).await? {
                tracing::info!("Administrator account {} created", login);
            } else {
                tracing::info!("Administrator account {} already present", login);
            }
        }
        None => {
            tracing::warn!("No bootstrap admin password configured, skipping administrator setup");
        }
    }

    Ok(())
}
