//! API Server binary entrypoint.

use api_server::{ApiServer, AppState};
use trade_core::config::AppConfig;
use trade_core::db::create_pool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::load()?;

    let pool = create_pool(&config.database).await?;

    if config.database.run_migrations {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../../migrations").run(&pool).await?;
    } else {
        tracing::info!("Skipping migrations (database.run_migrations=false)");
    }

    if config.super_admin.is_enabled() {
        tracing::info!("Configuration super admin enabled");
    }

    let state = AppState::new(&config, pool)?;
    ApiServer::new(config.server.clone(), state).run().await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines; filter via `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "api_server=debug,rfq_engine=debug,auth=debug,trade_core=info,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
