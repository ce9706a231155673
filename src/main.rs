use log::*;
use service::{config::Config, logging::Logger, AppState};
use sse::Manager;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!("Starting SSE relay on {}", config.listen_address());

    let bus = match service::init_bus(&config).await {
        Ok(bus) => bus,
        Err(e) => {
            error!("Failed to connect to Redis: {e}");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let sse_manager = Arc::new(Manager::new(bus, config.manager_config(), shutdown.clone()));
    info!(
        "Relaying bus messages using the {} topology",
        sse_manager.topology()
    );

    let app_state = AppState::new(config, &sse_manager);

    if let Err(e) = web::init_server(app_state, shutdown).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Cancels `shutdown` on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}
