use crate::auth::TokenIssuer;
use crate::publisher::Publisher;
use crate::sse_client::Connection;
use anyhow::{bail, Result};
use log::*;
use reqwest::StatusCode;
use serde_json::json;
use std::time::{Duration, Instant};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct TestResult {
    pub scenario_name: String,
    pub passed: bool,
    pub message: Option<String>,
    pub duration: Duration,
}

/// Everything a scenario needs to talk to the relay and the bus.
pub struct ScenarioContext {
    pub base_url: String,
    pub user_id: i64,
    pub tokens: TokenIssuer,
    pub publisher: Publisher,
}

pub async fn run(name: &str, ctx: &mut ScenarioContext) -> TestResult {
    let start = Instant::now();
    info!("Running scenario {name}");

    let outcome = match name {
        "connection_test" => connection_test(ctx).await,
        "ping" => ping(ctx).await,
        "order" => order(ctx).await,
        "expired_token" => expired_token(ctx).await,
        "wrong_secret" => wrong_secret(ctx).await,
        other => Err(anyhow::anyhow!("Unknown scenario {other}")),
    };

    TestResult {
        scenario_name: name.to_string(),
        passed: outcome.is_ok(),
        message: outcome.err().map(|e| format!("{e:#}")),
        duration: start.elapsed(),
    }
}

async fn connect(ctx: &mut ScenarioContext) -> Result<Connection> {
    let token = ctx.tokens.valid_token(ctx.user_id)?;
    let mut connection =
        Connection::establish(&ctx.base_url, &token, format!("user {}", ctx.user_id)).await?;
    wait_for_subscription(ctx, &mut connection).await?;
    Ok(connection)
}

const PROBE: &str = "{\"event\":\"probe\"}";

/// The relay subscribes asynchronously after the stream opens. Publish a marker payload
/// until this connection receives it.
async fn wait_for_subscription(ctx: &mut ScenarioContext, connection: &mut Connection) -> Result<()> {
    let deadline = Instant::now() + SUBSCRIBE_TIMEOUT;
    while Instant::now() < deadline {
        ctx.publisher.publish_to_user(ctx.user_id, PROBE).await?;
        if let Ok(event) = connection.next_event(Duration::from_millis(100)).await {
            if event.data == PROBE {
                connection.drain();
                return Ok(());
            }
        }
    }
    bail!("Relay never delivered on the channel of user {}", ctx.user_id)
}

async fn next_data(connection: &mut Connection) -> Result<String> {
    loop {
        let event = connection.next_event(EVENT_TIMEOUT).await?;
        if event.data != PROBE {
            return Ok(event.data);
        }
    }
}

async fn connection_test(ctx: &mut ScenarioContext) -> Result<()> {
    connect(ctx).await.map(|_| ())
}

async fn ping(ctx: &mut ScenarioContext) -> Result<()> {
    let mut connection = connect(ctx).await?;
    let payload = json!({ "event": "ping" }).to_string();
    ctx.publisher.publish_to_user(ctx.user_id, &payload).await?;

    let received = next_data(&mut connection).await?;
    if received != payload {
        bail!("Expected {payload}, received {received}");
    }
    Ok(())
}

async fn order(ctx: &mut ScenarioContext) -> Result<()> {
    let mut connection = connect(ctx).await?;
    let payloads = ["m1", "m2", "m3"];
    for payload in payloads {
        ctx.publisher.publish_to_user(ctx.user_id, payload).await?;
    }

    for expected in payloads {
        let received = next_data(&mut connection).await?;
        if received != expected {
            bail!("Expected {expected}, received {received}");
        }
    }
    Ok(())
}

async fn expired_token(ctx: &mut ScenarioContext) -> Result<()> {
    let token = ctx.tokens.expired_token(ctx.user_id)?;
    expect_unauthorized(&ctx.base_url, &token).await
}

async fn wrong_secret(ctx: &mut ScenarioContext) -> Result<()> {
    let token = ctx.tokens.foreign_token(ctx.user_id)?;
    expect_unauthorized(&ctx.base_url, &token).await
}

async fn expect_unauthorized(base_url: &str, token: &str) -> Result<()> {
    let response = reqwest::Client::new()
        .get(format!("{base_url}/sse-events"))
        .query(&[("ssetoken", token)])
        .send()
        .await?;

    if response.status() != StatusCode::UNAUTHORIZED {
        bail!("Expected 401, received {}", response.status());
    }
    Ok(())
}
