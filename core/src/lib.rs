//! Blocking client for the Intercom user API.
//!
//! # Overview
//! Covers the handful of operations the API offers for users: list, look up,
//! create, update, delete, and record an impression. Every call is a single
//! authenticated request whose JSON response is handed back as a
//! `serde_json::Value` without imposing a schema on it.
//!
//! # Design
//! - `IntercomClient::build_*` methods produce `HttpRequest` values with no
//!   I/O, so request shapes are testable on their own.
//! - `IntercomClient::execute` is the single call path: Basic auth, debug
//!   tracing, one attempt through a `Transport`, last-error bookkeeping and
//!   lenient JSON decoding.
//! - `UreqTransport` is the default engine; tests swap in their own.
//!
//! ```no_run
//! use intercom_core::{ClientConfig, IntercomClient, UserRequest};
//!
//! let client = IntercomClient::new(ClientConfig::new("app-id", "api-key"))?;
//! let user = client.create_user(&UserRequest::new("u1").email("u1@example.com"))?;
//! println!("{user:?}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use client::{decode_body, IntercomClient};
pub use config::ClientConfig;
pub use error::{ConfigError, LastError, TransportError, TransportErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::{Impression, UserRef, UserRequest};
