//! The seam between request building and the network.
//!
//! # Design
//! `Transport` executes one `HttpRequest` and returns whatever the server
//! sent back, whatever the status. It makes exactly one attempt. Failures are
//! reported only when no complete response was received.
//!
//! `UreqTransport` is the production engine. ureq never sends
//! `Expect: 100-continue`, so JSON bodies go out in the same exchange as the
//! headers.

use std::fmt;
use std::io;

use ureq::Agent;

use crate::config::{CALL_TIMEOUT, CONNECT_TIMEOUT};
use crate::error::{TransportError, TransportErrorKind};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes a fully-formed request.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Body read limit. Replaces ureq's 10 MiB default; any complete response
/// is returned whole.
const MAX_RESPONSE_BYTES: u64 = u64::MAX;

/// Blocking transport backed by a ureq `Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("connect_timeout", &CONNECT_TIMEOUT)
            .field("call_timeout", &CALL_TIMEOUT)
            .finish()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        // Status codes are data here; only connection-level problems are errors.
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .timeout_global(Some(CALL_TIMEOUT))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let body = request.body.as_deref();

        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), headers).call(),
            HttpMethod::Post => {
                let builder = with_headers(self.agent.post(url), headers);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = with_headers(self.agent.put(url), headers);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(map_ureq_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_to_string()
            .map_err(map_read_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn map_ureq_error(err: ureq::Error) -> TransportError {
    TransportError::new(classify(&err), err.to_string())
}

/// A failure after the status line arrived is a receive failure unless it
/// was the deadline.
fn map_read_error(err: ureq::Error) -> TransportError {
    let kind = match classify(&err) {
        TransportErrorKind::TimedOut => TransportErrorKind::TimedOut,
        _ => TransportErrorKind::ReceiveFailed,
    };
    TransportError::new(kind, err.to_string())
}

fn classify(err: &ureq::Error) -> TransportErrorKind {
    match err {
        ureq::Error::Timeout(_) => TransportErrorKind::TimedOut,
        ureq::Error::HostNotFound => TransportErrorKind::ResolveFailed,
        ureq::Error::ConnectionFailed => TransportErrorKind::ConnectFailed,
        ureq::Error::BadUri(_) | ureq::Error::Http(_) => TransportErrorKind::InvalidUrl,
        ureq::Error::TooManyRedirects | ureq::Error::RedirectFailed => {
            TransportErrorKind::TooManyRedirects
        }
        ureq::Error::Io(io_err) => classify_io(io_err),
        other => {
            // TLS variants are feature-gated in ureq, so match on the message.
            let message = other.to_string().to_ascii_lowercase();
            if message.contains("tls") || message.contains("certificate") {
                TransportErrorKind::Tls
            } else {
                TransportErrorKind::Other
            }
        }
    }
}

fn classify_io(err: &io::Error) -> TransportErrorKind {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::NotConnected => TransportErrorKind::ConnectFailed,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::TimedOut,
        io::ErrorKind::BrokenPipe | io::ErrorKind::WriteZero => TransportErrorKind::SendFailed,
        _ => TransportErrorKind::ReceiveFailed,
    }
}
