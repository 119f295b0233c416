//! HTTP server lifecycle.
//!
//! [`start_server`] binds the configured address and serves a router until
//! `Ctrl-C`. On shutdown every live session is stopped first, so open
//! streams end and in-flight requests can finish.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use streamview_core::SessionDirectory;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;

/// Serve `router` on the configured address until `Ctrl-C`.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or cannot be
/// bound, and [`ServerError::Serve`] on a fatal I/O error.
pub async fn start_server(
    config: &ServerConfig,
    router: Router,
    directory: Arc<SessionDirectory>,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "Streamview server listening");
    serve_until(listener, router, directory, ctrl_c()).await
}

/// Serve on an already bound listener until `signal` resolves.
///
/// When it does, every session in `directory` is shut down so that live
/// streams end; the server then waits for open connections to finish.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] on a fatal I/O error.
pub async fn serve_until<F>(
    listener: TcpListener,
    router: Router,
    directory: Arc<SessionDirectory>,
    signal: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signal.await;
            let stopped = directory.shutdown_all();
            info!(sessions = stopped, "shutting down, live sessions stopped");
        })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("Streamview server stopped");
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
    }
}
