//! This module defines the claims carried by SSE stream tokens.
//!
//! The issuer (the backend application) signs a short-lived token for the logged in
//! user and hands it to the browser, which presents it as the `ssetoken` query
//! parameter when opening the event stream.
//!
//! # Example
//!
//! ```rust,ignore
//! // This is an internal module example - not accessible from outside the crate
//! let claims: SseTokenClaims =
//!     serde_json::from_str(r#"{"user_id": 42, "exp": 1825247600}"#).unwrap();
//! assert_eq!(claims.identity(), Some(Identity::Numeric(42)));
//! ```

use events::Identity;
use serde::{Deserialize, Deserializer, Serialize};

/// Represents the claims for an SSE stream token.
///
/// The subject is read from `user_id` (number or string) and falls back to the
/// registered `sub` claim. `exp` is mandatory.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SseTokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) user_id: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) sub: Option<String>,
    #[serde(deserialize_with = "numeric_date")]
    pub(crate) exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) iat: Option<i64>,
}

impl SseTokenClaims {
    pub(crate) fn identity(&self) -> Option<Identity> {
        self.user_id
            .clone()
            .or_else(|| self.sub.clone().map(Identity::Text))
    }
}

/// Reads a NumericDate, which may be fractional, as whole seconds.
fn numeric_date<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumericDate {
        Seconds(i64),
        Fractional(f64),
    }

    match NumericDate::deserialize(deserializer)? {
        NumericDate::Seconds(seconds) => Ok(seconds),
        NumericDate::Fractional(seconds) if seconds.is_finite() => Ok(seconds.trunc() as i64),
        NumericDate::Fractional(_) => Err(serde::de::Error::custom("exp is not a finite number")),
    }
}
