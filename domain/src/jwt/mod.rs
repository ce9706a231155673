//! This module provides functionality for handling JSON Web Tokens (JWTs) within the domain layer.
//!
//! The primary use case is verifying the short-lived SSE tokens that browsers present when
//! opening an event stream. A token is accepted only when it is signed with one of the
//! HMAC algorithms using the shared secret and has not yet expired. Tokens declaring any
//! other algorithm in their header are rejected, so an attacker cannot substitute an
//! asymmetric or unsigned algorithm.
//!
//! Tokens are normally issued by the backend application. `generate_sse_token` exists for
//! tooling and tests that need to mint one with the same secret.
//!
//! # Example
//!
//! ```rust
//! use domain::jwt::{generate_sse_token, verify_sse_token};
//! use domain::Identity;
//!
//! let secret = b"shared-secret";
//! let token = generate_sse_token(&Identity::Numeric(42), chrono::Duration::minutes(5), secret).unwrap();
//! let verified = verify_sse_token(&token, secret).unwrap();
//! assert_eq!(verified.identity, Identity::Numeric(42));
//! ```

use crate::error::{AuthErrorKind, DomainErrorKind, Error, InternalErrorKind};
use chrono::{DateTime, Utc};
use claims::SseTokenClaims;
use events::Identity;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;

pub(crate) mod claims;

/// The only signing algorithms accepted for SSE tokens.
const SYMMETRIC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// The result of a successful token verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// Verifies an SSE token against the shared secret.
///
/// Fails with a `DomainErrorKind::Auth` error when the token is malformed, signed with a
/// different secret or a non-HMAC algorithm, expired, or carries no subject.
pub fn verify_sse_token(token: &str, secret: &[u8]) -> Result<VerifiedToken, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = SYMMETRIC_ALGORITHMS.to_vec();
    validation.leeway = 0;
    // Audience belongs to the issuer, it is not checked here
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    let token_data = decode::<SseTokenClaims>(token, &DecodingKey::from_secret(secret), &validation)?;
    let claims = token_data.claims;

    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
        .ok_or_else(|| Error::auth(AuthErrorKind::MalformedToken))?;

    // The library compares whole seconds with `<`, a token expiring this very second is
    // refused here as well.
    if expires_at <= Utc::now() {
        return Err(Error::auth(AuthErrorKind::Expired));
    }

    let identity = claims
        .identity()
        .ok_or_else(|| Error::auth(AuthErrorKind::MissingIdentity))?;

    Ok(VerifiedToken {
        identity,
        expires_at,
    })
}

/// Generates an HS256 SSE token for `identity` that expires `ttl` from now.
pub fn generate_sse_token(
    identity: &Identity,
    ttl: chrono::Duration,
    secret: &[u8],
) -> Result<String, Error> {
    let now = Utc::now();
    let claims = SseTokenClaims {
        user_id: Some(identity.clone()),
        sub: Some(identity.to_string()),
        exp: (now + ttl).timestamp(),
        iat: Some(now.timestamp()),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| {
        warn!("Failed to encode SSE token: {e}");
        Error {
            source: Some(Box::new(e)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::TokenEncoding),
        }
    })
}
