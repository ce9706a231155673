//! HTTP surface of the relay: the `/sse-events` stream endpoint, a health check and the
//! OpenAPI document, served by Axum.

use log::*;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use service::AppState;

mod controller;
mod error;
mod params;
mod router;
mod sse;

#[cfg(test)]
mod test_support;

/// Binds the configured address and serves until `shutdown` is cancelled.
///
/// Every connection's cancellation token is a child of `shutdown`, so cancelling it
/// also ends all open event streams and lets graceful shutdown complete.
pub async fn init_server(app_state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let address = app_state.config.listen_address();
    let listener = TcpListener::bind(&address).await?;

    info!("Server running on {address}");

    let router = router::define_routes(app_state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Server shut down");
    Ok(())
}
