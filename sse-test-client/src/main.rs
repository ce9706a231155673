use anyhow::Result;
use clap::Parser;
use colored::*;

mod auth;
mod output;
mod publisher;
mod scenarios;
mod sse_client;

use auth::TokenIssuer;
use output::{print_test_result, print_test_summary};
use publisher::Publisher;
use scenarios::ScenarioContext;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "End-to-end checks against a running SSE relay")]
struct Cli {
    /// Base URL of the relay (e.g., http://localhost:5687)
    #[arg(long, default_value = "http://localhost:5687")]
    base_url: String,

    /// Redis instance the relay is subscribed to
    #[arg(long, env = "GO_SSE_SIDECAR_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Secret shared with the relay for signing SSE tokens
    #[arg(long, env = "GO_SSE_SIDECAR_TOKEN")]
    secret: String,

    /// Identity carried in minted tokens
    #[arg(long, default_value_t = 42)]
    user_id: i64,

    /// Per-user channel prefix the relay was started with
    #[arg(long, default_value = "events:user:")]
    channel_prefix: String,

    /// Test scenario to run
    #[arg(long, value_enum, default_value = "all")]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Open a stream and confirm the relay subscribed for it
    ConnectionTest,
    /// Publish a ping payload and expect it as a data frame
    Ping,
    /// Publish several payloads and expect them in order
    Order,
    /// Present an expired token and expect 401
    ExpiredToken,
    /// Present a token signed with another secret and expect 401
    WrongSecret,
    /// Run every scenario
    All,
}

impl ScenarioChoice {
    fn names(&self) -> Vec<&'static str> {
        match self {
            Self::ConnectionTest => vec!["connection_test"],
            Self::Ping => vec!["ping"],
            Self::Order => vec!["order"],
            Self::ExpiredToken => vec!["expired_token"],
            Self::WrongSecret => vec!["wrong_secret"],
            Self::All => vec![
                "connection_test",
                "ping",
                "order",
                "expired_token",
                "wrong_secret",
            ],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    println!("{} Connecting to Redis at {}...", "→".blue(), cli.redis_url);
    let publisher = Publisher::connect(&cli.redis_url, cli.channel_prefix.clone()).await?;
    println!("{} Redis connection established", "✓".green());

    let mut ctx = ScenarioContext {
        base_url: cli.base_url.trim_end_matches('/').to_string(),
        user_id: cli.user_id,
        tokens: TokenIssuer::new(cli.secret.clone()),
        publisher,
    };

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();
    for name in cli.scenario.names() {
        let result = scenarios::run(name, &mut ctx).await;
        print_test_result(&result);
        results.push(result);
    }

    print_test_summary(&results);

    if results.iter().all(|r| r.passed) {
        println!("\n{}", "All tests passed! ✓".green().bold());
        Ok(())
    } else {
        println!("\n{}", "Some tests failed ✗".red().bold());
        std::process::exit(1);
    }
}
