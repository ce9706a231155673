use anyhow::{anyhow, Result};
use chrono::Duration;
use domain::jwt::generate_sse_token;
use domain::Identity;

/// Mints SSE tokens the same way the backend application does.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    secret: String,
}

impl TokenIssuer {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    pub fn valid_token(&self, user_id: i64) -> Result<String> {
        self.token(user_id, Duration::minutes(5), &self.secret)
    }

    pub fn expired_token(&self, user_id: i64) -> Result<String> {
        self.token(user_id, Duration::minutes(-5), &self.secret)
    }

    pub fn foreign_token(&self, user_id: i64) -> Result<String> {
        self.token(user_id, Duration::minutes(5), "not-the-relay-secret")
    }

    fn token(&self, user_id: i64, ttl: Duration, secret: &str) -> Result<String> {
        generate_sse_token(&Identity::Numeric(user_id), ttl, secret.as_bytes())
            .map_err(|e| anyhow!("Failed to mint SSE token: {e}"))
    }
}
