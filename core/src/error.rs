//! Error types for the Intercom client.
//!
//! # Design
//! Only connection-level failures are errors. A response that is not JSON
//! decodes to `None`, and a 4xx/5xx response is returned to the caller as its
//! decoded body, so neither has a variant here.

use thiserror::Error;

/// Category of a connection-level failure.
///
/// Codes follow libcurl's error numbering so callers that used to compare
/// against `curl_errno` values keep working. `0` is reserved for "no error".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The URL could not be parsed or contained invalid header values.
    InvalidUrl,
    /// DNS lookup of the host failed.
    ResolveFailed,
    /// The TCP connection could not be established.
    ConnectFailed,
    /// The 5 s connect or 60 s overall deadline passed.
    TimedOut,
    Tls,
    TooManyRedirects,
    SendFailed,
    /// The connection broke while reading the response.
    ReceiveFailed,
    Other,
}

impl TransportErrorKind {
    pub fn code(self) -> i32 {
        match self {
            TransportErrorKind::Other => 2,
            TransportErrorKind::InvalidUrl => 3,
            TransportErrorKind::ResolveFailed => 6,
            TransportErrorKind::ConnectFailed => 7,
            TransportErrorKind::TimedOut => 28,
            TransportErrorKind::Tls => 35,
            TransportErrorKind::TooManyRedirects => 47,
            TransportErrorKind::SendFailed => 55,
            TransportErrorKind::ReceiveFailed => 56,
        }
    }
}

/// A request that never produced a complete HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error {code}: {message}", code = .kind.code())]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }
}

/// Outcome of the most recent transport call on a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastError {
    pub code: i32,
    pub message: String,
}

impl LastError {
    /// The record left behind by a call that reached the server.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

impl From<&TransportError> for LastError {
    fn from(err: &TransportError) -> Self {
        Self {
            code: err.code(),
            message: err.message.clone(),
        }
    }
}

/// Invalid or incomplete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}
