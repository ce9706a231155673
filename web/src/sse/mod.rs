//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the event stream endpoint.
//! The fan-out machinery (Manager, bridges, broadcaster, dispatcher) lives in the
//! `sse` crate.

pub mod handler;
