use config::Config;
use events::RedisBus;
use log::info;
use sse::Manager;
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Connects to the Redis bus and verifies it answers before the server starts taking
/// connections. Any failure here is fatal to the process.
pub async fn init_bus(config: &Config) -> Result<Arc<RedisBus>, events::Error> {
    let bus = RedisBus::open(config.redis_url())?;
    bus.ping().await?;

    info!("Connected to Redis message bus");

    Ok(Arc::new(bus))
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub sse_manager: Arc<Manager>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, sse_manager: &Arc<Manager>) -> Self {
        Self {
            sse_manager: Arc::clone(sse_manager),
            config: app_config,
        }
    }
}
