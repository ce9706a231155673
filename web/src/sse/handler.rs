use crate::error::Error;
use crate::params::sse::SseTokenParams;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use domain::jwt::verify_sse_token;
use log::*;
use service::AppState;
use ::sse::dispatcher;

/// GET a long-lived event stream for the user identified by `ssetoken`.
///
/// Each message published on the user's bus channel is written as one `data:` frame and
/// flushed immediately. The stream stays open until the client disconnects or the server
/// shuts down.
#[utoipa::path(
    get,
    path = "/sse-events",
    params(SseTokenParams),
    responses(
        (status = 200, description = "Event stream opened", body = String, content_type = "text/event-stream"),
        (status = 401, description = "Missing, invalid or expired token"),
    )
)]
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
    query: Option<Query<Vec<(String, String)>>>,
) -> Result<impl IntoResponse, Error> {
    let params = query
        .map(|Query(pairs)| SseTokenParams::from_query_pairs(pairs))
        .unwrap_or_default();
    let token = params.ssetoken.unwrap_or_default();

    let verified = verify_sse_token(&token, app_state.config.sse_token_secret()).map_err(|e| {
        warn!("Token verification failed: {e}");
        e
    })?;

    info!(
        "Authenticated SSE connection for user {} (expires: {})",
        verified.identity, verified.expires_at
    );

    let connection = app_state.sse_manager.open_connection(verified.identity);
    let mut sse = Sse::new(dispatcher::event_stream(connection));
    if let Some(interval) = app_state.config.keep_alive_interval() {
        sse = sse.keep_alive(KeepAlive::new().interval(interval));
    }

    Ok(([(header::CONNECTION, "keep-alive")], sse))
}
