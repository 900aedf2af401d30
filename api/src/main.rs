use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;

use memo_api::{
    app::build_router,
    auth::AuthManager,
    config::{self, AppConfig},
    observability::Observability,
    rate_limit::RateLimitState,
    state::AppState,
    validation::QueryValidator,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    let obs = Observability::init(config::log_format_from_env())?;
    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .context("failed to apply migrations")?;

    tracing::info!("Database connected and migrations applied");

    // Compiled once here and shared by every request
    let validator = QueryValidator::new().context("failed to compile query rejection patterns")?;

    let state = AppState::new(
        pool,
        obs.registry,
        validator,
        AuthManager::new(&config.jwt_secret),
    );

    let rate_limiter = RateLimitState::from_env();
    rate_limiter.spawn_pruner();

    let app = build_router(state, rate_limiter, &config.cors_allowed_origins);

    tracing::info!("API server listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
