//! Keygate - API key and editor handoff service
//!
//! Issues and validates the opaque API keys used by the editor extension, and
//! bridges a logged-in browser session to the extension through an
//! authorization-code + PKCE handoff over a custom URI scheme.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Keys**: Random 24-byte tokens, stored as SHA-256 hashes
//! - **Identity**: Hosted identity provider, session cookie resolved over HTTP
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load layered configuration (file > environment > defaults)
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod identity;
mod middleware;
mod models;
mod services;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use axum::{
    Router,
    http::{HeaderName, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    identity::HttpIdentityProvider, middleware::auth::API_KEY_HEADER, state::AppState,
    store::postgres::PgStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::load()?;
    tracing::info!(
        max_active_keys = config.max_active_keys,
        key_cooldown_secs = config.key_cooldown_secs,
        unlimited_overrides = config.entitlement_policy().rules().len(),
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let identity = HttpIdentityProvider::new(&config.identity_url, config.identity_api_key.clone())?;
    let addr = format!("0.0.0.0:{}", config.server_port);

    let state = AppState::new(config, Arc::new(PgStore::new(pool)), Arc::new(identity));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble routes, middleware and shared state.
fn build_router(state: AppState) -> Router {
    // Routes for the extension, authenticated by API key
    let api_key_routes = Router::new()
        .route("/api/auth/validate", post(handlers::validate::validate_key))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::api_key_middleware,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static(API_KEY_HEADER),
                ]),
        );

    // Dashboard routes, authenticated by browser session
    let session_routes = Router::new()
        .route("/api/auth/me", get(handlers::me::me))
        .route(
            "/api/keys",
            get(handlers::keys::list_keys).post(handlers::keys::create_key),
        )
        .route("/api/keys/regenerate", post(handlers::keys::regenerate_key))
        .route("/api/keys/{id}", delete(handlers::keys::revoke_key))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session::session_middleware,
        ));

    Router::new()
        // Public routes (initiate checks the session itself)
        .route("/health", get(handlers::health::health_check))
        .route("/api/auth/vscode/initiate", get(handlers::vscode::initiate))
        .route("/api/auth/vscode/token", post(handlers::vscode::token))
        .merge(api_key_routes)
        .merge(session_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
