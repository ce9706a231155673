//! Shared fixtures for router and handler tests.

use clap::Parser;
use events::MemoryBus;
use service::{config::Config, AppState};
use ::sse::{Manager, ManagerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) const TEST_SECRET: &str = "test-secret";

/// Builds an `AppState` backed by an in-memory bus. `extra_args` are appended to the
/// required command line flags, e.g. `&["--topology", "shared"]`.
pub(crate) fn test_app_state(extra_args: &[&str]) -> (AppState, MemoryBus, CancellationToken) {
    let mut args = vec![
        "sse_relay",
        "--redis-url",
        "redis://localhost:6379",
        "--sse-token-secret",
        TEST_SECRET,
    ];
    args.extend_from_slice(extra_args);
    let config = Config::try_parse_from(args).unwrap();

    let bus = MemoryBus::new();
    let shutdown = CancellationToken::new();
    let manager_config: ManagerConfig = config.manager_config();
    let manager = Arc::new(Manager::new(
        Arc::new(bus.clone()),
        manager_config,
        shutdown.clone(),
    ));

    (AppState::new(config, &manager), bus, shutdown)
}
