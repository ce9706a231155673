//! Domain layer of the SSE relay.
//!
//! Holds the credential handling that decides whether an inbound stream request
//! may be attached to the bus, and the error types the `web` layer translates
//! into HTTP responses.
//!
//! The `Identity` type is re-exported from the `events` crate so consumers of
//! `domain` do not need to depend on `events` directly.
pub use events::Identity;

pub mod error;
pub mod jwt;
