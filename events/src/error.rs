//! Error types for the `events` crate.
//!
//! Follows the same pattern as domain::error with a root Error struct and an error kind enum.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for bus operations.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Categories of errors raised while talking to the bus.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The bus connection URL could not be parsed.
    InvalidUrl,
    /// The bus could not be reached or did not answer a health check.
    Connection,
    /// The bus refused or failed to confirm a channel subscription.
    Subscribe,
}

impl Error {
    pub fn new<E>(error_kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self {
            source: Some(source.into()),
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Bus Error ({:?}): {source}", self.error_kind),
            None => write!(f, "Bus Error ({:?})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
