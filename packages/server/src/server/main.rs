// Main entry point for the membership bot

use std::sync::Arc;

use anyhow::{Context, Result};
use membership_core::kernel::{start_scheduler, PgRecordStore, ServerDeps, TelegramAdapter};
use membership_core::server::{build_app, run_bot};
use membership_core::Config;
use sqlx::postgres::PgPoolOptions;
use telegram::{TelegramOptions, TelegramService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,membership_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting membership bot");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        admin_id = %config.subscription.admin_id,
        group_id = config.subscription.group_id,
        "Configuration loaded"
    );

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let telegram = Arc::new(
        TelegramService::new(TelegramOptions::new(config.telegram_token.clone()))
            .context("Failed to create Telegram client")?,
    );

    let subscription = config.subscription.clone();
    let deps = ServerDeps::new(
        Arc::new(PgRecordStore::new(pool.clone())),
        Arc::new(TelegramAdapter::new(
            telegram.clone(),
            subscription.admin_id,
            subscription.group_id,
        )),
        subscription,
    );

    // Daily sweeps; the handle must outlive the server
    let _scheduler = start_scheduler(deps.clone())
        .await
        .context("Failed to start scheduler")?;

    let bot_deps = deps.clone();
    tokio::spawn(async move {
        if let Err(e) = run_bot(telegram, bot_deps).await {
            tracing::error!(error = %e, "Telegram update loop stopped");
        }
    });

    // Start server
    let app = build_app(pool);
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
