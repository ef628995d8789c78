use server::config;
use server::routes;
use server::state;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(
        stockfish_path = %config.review.stockfish_path,
        max_workers = config.review.max_workers,
        default_depth = config.review.default_depth,
        "Review config loaded"
    );

    let orchestrator = state::build_orchestrator(&config.review)?;

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/ws/review", get(routes::review_ws::ws_handler))
        .route("/api/review/load", post(routes::saved::load_saved_analysis))
        // Shared state
        .layer(Extension(orchestrator))
        .layer(Extension(config.review.clone()))
        .layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
