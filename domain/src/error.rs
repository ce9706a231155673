//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer.
/// The `source` field is used to hold the original error that caused the domain
/// error. `web` uses the `error_kind` to pick the HTTP status returned to the client,
/// while the `source` is only ever logged.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Auth(AuthErrorKind),
    Internal(InternalErrorKind),
}

/// Reasons a stream credential was refused. The reason is kept for logging only;
/// clients receive the same unauthorized response for every variant.
#[derive(Debug, PartialEq)]
pub enum AuthErrorKind {
    MalformedToken,
    InvalidSignature,
    DisallowedAlgorithm,
    Expired,
    MissingIdentity,
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    TokenEncoding,
    Other(String),
}

impl Error {
    pub(crate) fn auth(kind: AuthErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Auth(kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Domain Error: {:?} ({source})", self.error_kind),
            None => write!(f, "Domain Error: {:?}", self.error_kind),
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

// Every failure while decoding or validating a token is an authentication failure.
// Encoding failures are mapped explicitly where tokens are issued.
impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as JwtErrorKind;

        let auth_error_kind = match err.kind() {
            JwtErrorKind::InvalidSignature => AuthErrorKind::InvalidSignature,
            JwtErrorKind::InvalidAlgorithm | JwtErrorKind::InvalidAlgorithmName => {
                AuthErrorKind::DisallowedAlgorithm
            }
            JwtErrorKind::ExpiredSignature => AuthErrorKind::Expired,
            _ => AuthErrorKind::MalformedToken,
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Auth(auth_error_kind),
        }
    }
}
