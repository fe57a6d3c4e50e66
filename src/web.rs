//! Status badge HTTP server.
//!
//! Serves a single SVG at `/` so hosting dashboards and uptime monitors can
//! embed a live "online" badge. Everything else is a 404.

use std::net::SocketAddr;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

const BADGE_SVG: &str = include_str!("../assets/online.svg");

/// Start the badge server on the given address.
pub async fn start(
    bind: SocketAddr,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(badge))
        .fallback(not_found)
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "badge server listening");

    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|v| *v).await;
            })
            .await
        {
            tracing::error!(%error, "badge server exited with error");
        }
    });

    Ok(handle)
}

/// Monitors poll this; the no-store headers keep proxies from serving a badge
/// for a bot that is actually down.
async fn badge() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        BADGE_SVG,
    )
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
