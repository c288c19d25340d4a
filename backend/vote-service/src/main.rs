use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vote_service::handlers;
use vote_service::repository::{CardRepository, PreferenceRepository, RankingRepository};
use vote_service::{AppState, Config};

#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting vote-service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        env = %config.app.env,
        http_port = config.app.http_port,
        candidate_pool_size = config.vote.candidate_pool_size,
        "Configuration loaded"
    );

    // Initialize database pool
    let connect_options = PgConnectOptions::from_str(&config.database.url)
        .context("Failed to parse DATABASE_URL")?;

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    // Verify database connection
    sqlx::query("SELECT 1")
        .execute(&pg_pool)
        .await
        .context("Failed to verify database connection")?;
    info!("Database pool created and verified");

    // Run database migrations
    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let rankings = Arc::new(RankingRepository::new(pg_pool.clone()));
    let state = web::Data::new(AppState::new(
        Arc::new(PreferenceRepository::new(pg_pool.clone())),
        Arc::new(CardRepository::new(pg_pool.clone())),
        rankings.clone(),
        rankings.clone(),
        &config.vote,
    ));

    let http_addr = format!("{}:{}", config.app.host, config.app.http_port);
    info!("HTTP server listening on http://{}", http_addr);

    let health_repo = web::Data::new(rankings);
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .app_data(health_repo.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/ready", web::get().to(readiness))
            .configure(handlers::configure)
    })
    .bind(&http_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("vote-service shutting down");
    Ok(())
}

async fn readiness(repo: web::Data<Arc<RankingRepository>>) -> actix_web::HttpResponse {
    match repo.health_check().await {
        Ok(()) => actix_web::HttpResponse::Ok().body("READY"),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            actix_web::HttpResponse::ServiceUnavailable().body("NOT READY")
        }
    }
}
