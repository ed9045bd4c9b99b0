//! HTTP API for Canopeum.
//!
//! [`router`] builds the axum application from an [`AppState`]; [`serve`]
//! binds it to the configured address.

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

pub mod auth;
pub mod error;
pub mod media;
pub mod middleware;
mod routes;
pub mod state;
pub mod views;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;

/// Log to stderr, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,canopeum=debug")
    });
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

/// Serve until ctrl-c.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let listen = state.config.server.listen().to_string();
    let listener = TcpListener::bind(&listen).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        public_url = state.config.server.public_url(),
        "listening"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}
