use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use sse::manager::{
    ManagerConfig, Topology, DEFAULT_BROADCAST_CHANNEL, DEFAULT_CHANNEL_PREFIX,
    DEFAULT_QUEUE_CAPACITY,
};
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Sets the Redis URL (including any credentials) of the message bus to subscribe to
    #[arg(long, env = "GO_SSE_SIDECAR_REDIS_URL")]
    redis_url: String,

    /// The shared secret used to verify the HMAC signature of SSE stream tokens
    #[arg(long, env = "GO_SSE_SIDECAR_TOKEN")]
    sse_token_secret: String,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "0.0.0.0")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env = "GO_SSE_SIDECAR_PORT", default_value_t = 5687)]
    pub port: u16,

    /// Value of the Access-Control-Allow-Origin header sent with every response
    #[arg(long, env, default_value = "*")]
    pub allowed_origin: String,

    /// How connections are attached to the bus: a subscription per user channel, or one
    /// shared broadcast subscription fanned out to every connection.
    #[arg(
        long,
        env,
        default_value_t = Topology::PerUser,
        value_parser = clap::builder::PossibleValuesParser::new([
            "PER-USER", "SHARED", "per-user", "shared"
        ])
            .map(|s| s.parse::<Topology>().unwrap()),
    )]
    pub topology: Topology,

    /// Maximum number of undelivered messages held per connection
    #[arg(
        long,
        env,
        default_value_t = DEFAULT_QUEUE_CAPACITY as u16,
        value_parser = clap::value_parser!(u16).range(1..),
    )]
    pub queue_capacity: u16,

    /// Prefix of the per-user channel; the user's identity is appended to it
    #[arg(long, env, default_value = DEFAULT_CHANNEL_PREFIX)]
    pub channel_prefix: String,

    /// Channel subscribed to when running the shared topology
    #[arg(long, env, default_value = DEFAULT_BROADCAST_CHANNEL)]
    pub broadcast_channel: String,

    /// Seconds between SSE keep-alive comments, 0 disables them
    #[arg(long, env, default_value_t = 15)]
    pub keep_alive_secs: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    pub fn sse_token_secret(&self) -> &[u8] {
        self.sse_token_secret.as_bytes()
    }

    /// Socket address string the server binds to, e.g. `0.0.0.0:5687`.
    pub fn listen_address(&self) -> String {
        format!(
            "{}:{}",
            self.interface.as_deref().unwrap_or("0.0.0.0"),
            self.port
        )
    }

    pub fn keep_alive_interval(&self) -> Option<Duration> {
        match self.keep_alive_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            topology: self.topology,
            queue_capacity: usize::from(self.queue_capacity),
            channel_prefix: self.channel_prefix.clone(),
            broadcast_channel: self.broadcast_channel.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const REQUIRED: [&str; 5] = [
        "sse_relay",
        "--redis-url",
        "redis://localhost:6379",
        "--sse-token-secret",
        "secret",
    ];

    #[test]
    fn test_defaults_apply_when_only_required_values_are_given() {
        let config = Config::try_parse_from(REQUIRED).unwrap();

        assert_eq!(config.redis_url(), "redis://localhost:6379");
        assert_eq!(config.sse_token_secret(), b"secret");
        assert_eq!(config.topology, Topology::PerUser);
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.channel_prefix, "events:user:");
        assert_eq!(config.keep_alive_interval(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_missing_redis_url_is_rejected() {
        let result =
            Config::try_parse_from(["sse_relay", "--sse-token-secret", "secret"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_token_secret_is_rejected() {
        let result =
            Config::try_parse_from(["sse_relay", "--redis-url", "redis://localhost:6379"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_queue_capacity_is_bounded() {
        for capacity in ["0", "65536", "18446744073709551615"] {
            let mut args = REQUIRED.to_vec();
            args.extend(["--queue-capacity", capacity]);
            assert!(
                Config::try_parse_from(args).is_err(),
                "{capacity} should be rejected"
            );
        }

        let mut args = REQUIRED.to_vec();
        args.extend(["--queue-capacity", "500"]);
        let config = Config::try_parse_from(args).unwrap();
        assert_eq!(config.manager_config().queue_capacity, 500);
    }

    #[test]
    fn test_bus_secret_and_port_read_sidecar_environment_names() {
        let command = Config::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .and_then(|env| env.to_str())
                .map(str::to_string)
        };

        assert_eq!(env_of("redis_url").as_deref(), Some("GO_SSE_SIDECAR_REDIS_URL"));
        assert_eq!(env_of("sse_token_secret").as_deref(), Some("GO_SSE_SIDECAR_TOKEN"));
        assert_eq!(env_of("port").as_deref(), Some("GO_SSE_SIDECAR_PORT"));
    }

    #[test]
    fn test_topology_and_keep_alive_overrides() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--topology", "shared", "--keep-alive-secs", "0", "--port", "8080"]);

        let config = Config::try_parse_from(args).unwrap();

        assert_eq!(config.manager_config().topology, Topology::Shared);
        assert_eq!(config.keep_alive_interval(), None);
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
    }
}
