use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod db;
mod engine;
mod error;
mod models;
mod services;

use config::Config;
use constants::API_VERSION;
use db::{Database, MatchStore, MemoryMatchStore, PgMatchStore};
use services::{MatchService, ReplayCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudships_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Cloudships match engine");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Initialize storage
    let store: Arc<dyn MatchStore> = if config.uses_postgres() {
        let db = Database::new(&config).await?;
        tracing::info!("Running database migrations...");
        db.run_migrations().await?;
        Arc::new(PgMatchStore::new(db))
    } else {
        tracing::warn!("Using in-memory match store");
        Arc::new(MemoryMatchStore::new())
    };

    // Initialize Redis (replay cache only)
    let redis = match config.redis_url.as_deref() {
        Some(url) => {
            let client = redis::Client::open(url)?;
            Some(redis::aio::ConnectionManager::new(client).await?)
        }
        None => {
            tracing::info!("REDIS_URL not set; replay cache is process-local");
            None
        }
    };

    let cache = ReplayCache::new(redis.clone(), config.replay_cache_ttl_secs);
    let app_state = api::AppState {
        service: MatchService::new(store, cache),
        redis,
        config: config.clone(),
    };

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Matches
        .route("/api/v1/matches", post(api::matches::create_match))
        .route(
            "/api/v1/matches/{match_id}",
            get(api::matches::get_match_status),
        )
        .route(
            "/api/v1/matches/{match_id}/join",
            post(api::matches::join_match),
        )
        .route(
            "/api/v1/matches/{match_id}/place",
            post(api::matches::place_ships),
        )
        .route(
            "/api/v1/matches/{match_id}/attack",
            post(api::matches::attack),
        )
        .route(
            "/api/v1/matches/{match_id}/finish",
            post(api::matches::finish_match),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
