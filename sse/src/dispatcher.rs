//! Stream dispatcher: turns a [`Connection`] into the stream of events written to the client.
//!
//! The loop waits on whichever comes first, the next queued payload or the connection's
//! cancellation. The stream owns the connection, so when the HTTP layer drops the response
//! body (client disconnected) the connection is dropped with it and teardown cascades.

use crate::connection::Connection;
use async_stream::stream;
use axum::response::sse::Event;
use events::Payload;
use futures::{Stream, StreamExt};
use log::*;
use std::convert::Infallible;

/// Yields queued payloads in FIFO order until the connection is cancelled or its queue
/// closes (bridge gone or connection evicted).
pub fn payload_stream(connection: Connection) -> impl Stream<Item = Payload> {
    stream! {
        let mut connection = connection;
        let identity = connection.identity().clone();

        loop {
            let next = tokio::select! {
                _ = connection.lifetime.cancel.cancelled() => {
                    info!("Closing SSE for user {identity}");
                    None
                }
                next = connection.queue.recv() => {
                    if next.is_none() {
                        info!("SSE queue closed for user {identity}, ending stream");
                    }
                    next
                }
            };

            match next {
                Some(payload) => yield payload,
                None => break,
            }
        }
    }
}

/// Same as [`payload_stream`], framed as SSE `data` events for `axum::response::sse::Sse`.
pub fn event_stream(connection: Connection) -> impl Stream<Item = Result<Event, Infallible>> {
    payload_stream(connection).map(|payload| Ok(data_event(&payload)))
}

/// Builds the `data:` event for a payload. Line breaks of any style become separate
/// `data` lines, which clients join back with `\n`.
pub fn data_event(payload: &str) -> Event {
    if payload.contains('\r') {
        Event::default().data(payload.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Event::default().data(payload)
    }
}
