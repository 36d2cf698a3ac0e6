//! HTTP server exposing a [`LocalService`] over the JSON API in [`crate::wire`].

pub mod routes;

use crate::engine::LocalService;
use tracing::info;

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: LocalService,
}

impl AppState {
    pub fn new(service: LocalService) -> Self {
        Self { service }
    }
}

pub use routes::router;

/// Bind `addr` and serve `service` until the process is stopped.
pub async fn serve(addr: &str, service: LocalService) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_listener(listener, service).await
}

/// Serve `service` on an already bound listener.
pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    service: LocalService,
) -> anyhow::Result<()> {
    let app = router(AppState::new(service));
    info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
