//! HTTP layer.
//!
//! ```text
//! GET /health
//! GET /datasets
//! GET /datasets/{dataset}/info
//! GET /datasets/{dataset}/bounds
//! GET /datasets/{dataset}/tilejson.json?tile_format=png
//! GET /datasets/{dataset}/tiles/{z}/{x}/{y}.{format}?rescale=min,max
//! GET /tiles/{z}/{x}/{y}.{format}?url=...&rescale=min,max
//! ```

mod error;
mod handlers;
mod middleware;

pub use error::ApiError;
pub use handlers::{AppState, TileJsonQuery, TileQuery, TILE_CACHE_CONTROL};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::service::TileService;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the application router.
pub fn router(service: Arc<TileService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/datasets", get(handlers::datasets))
        .route("/datasets/:dataset/info", get(handlers::dataset_info))
        .route("/datasets/:dataset/bounds", get(handlers::dataset_bounds))
        .route("/datasets/:dataset/tilejson.json", get(handlers::tilejson))
        .route(
            "/datasets/:dataset/tiles/:z/:x/:tile",
            get(handlers::dataset_tile),
        )
        .route("/tiles/:z/:x/:tile", get(handlers::tile_by_url))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(middleware::cors())
        .with_state(AppState { service })
}

/// Bind `address` and serve until `shutdown` is cancelled.
pub async fn serve(
    service: Arc<TileService>,
    address: &str,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })?;
    serve_on(listener, service, shutdown).await
}

/// Serve on an already bound listener.
///
/// In-flight requests drain after `shutdown` fires; renders still waiting
/// for a permit are refused.
pub async fn serve_on(
    listener: TcpListener,
    service: Arc<TileService>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let local: SocketAddr = listener.local_addr()?;
    info!(address = %local, "Serving tiles");

    let app = router(Arc::clone(&service));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Shutdown requested, draining requests");
            service.shutdown();
        })
        .await?;

    info!("Server stopped");
    Ok(())
}
