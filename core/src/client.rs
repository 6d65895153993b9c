//! Request builders and the authenticated call path for the Intercom API.
//!
//! # Design
//! Each operation is split in two. A `build_*` method produces an
//! `HttpRequest` without touching the network, and `execute` runs any request
//! through the configured `Transport`. `execute` is the one place that adds
//! Basic credentials, traces the exchange in debug mode, records the last
//! transport error and decodes the JSON body.
//!
//! Every operation returns its own outcome: `Err` for a transport failure,
//! `Ok(None)` for a body that is not JSON, and `Ok(Some(value))` otherwise,
//! including API error bodies sent with a 4xx/5xx status. `last_error` is kept
//! for callers that poll it after the fact; it is shared by every call on the
//! instance, so concurrent callers see whichever call finished last.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::error::{ConfigError, LastError, TransportError, TransportErrorKind};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{Impression, UserRef, UserRequest};

const WIRE_TARGET: &str = "intercom_core::wire";

/// Blocking client for the Intercom user API.
pub struct IntercomClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
    last_error: Mutex<Option<LastError>>,
}

impl IntercomClient<UreqTransport> {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> IntercomClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            last_error: Mutex::new(None),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    /// `GET users/?page=N[&per_page=M]`. Page numbers start at 1; the page is
    /// sent as given and the server decides what page 0 means.
    pub fn build_list_users(&self, page: u32, per_page: Option<u32>) -> HttpRequest {
        let mut path = format!("users/?page={page}");
        if let Some(per_page) = per_page.filter(|n| *n > 0) {
            path.push_str(&format!("&per_page={per_page}"));
        }
        HttpRequest::new(HttpMethod::Get, self.url(&path))
    }

    pub fn build_get_user(&self, user: &UserRef) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.user_query_url(user))
    }

    pub fn build_delete_user(&self, user: &UserRef) -> HttpRequest {
        HttpRequest::new(HttpMethod::Delete, self.user_query_url(user))
    }

    pub fn build_create_user(&self, user: &UserRequest) -> Result<HttpRequest, TransportError> {
        self.build_user_write(user, HttpMethod::Post)
    }

    /// Same path and body as `build_create_user`, sent with PUT.
    pub fn build_update_user(&self, user: &UserRequest) -> Result<HttpRequest, TransportError> {
        self.build_user_write(user, HttpMethod::Put)
    }

    pub fn build_create_impression(
        &self,
        impression: &Impression,
    ) -> Result<HttpRequest, TransportError> {
        let body = encode_body(impression)?;
        Ok(HttpRequest::new(HttpMethod::Post, self.url("users/impressions")).with_json_body(body))
    }

    fn build_user_write(
        &self,
        user: &UserRequest,
        method: HttpMethod,
    ) -> Result<HttpRequest, TransportError> {
        let mut payload = user.clone();
        payload.created_at = Some(payload.created_at.unwrap_or_else(unix_now));
        let body = encode_body(&payload)?;
        Ok(HttpRequest::new(method, self.url("users")).with_json_body(body))
    }

    fn user_query_url(&self, user: &UserRef) -> String {
        let (key, value) = user.query_pair();
        let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
        self.url(&format!("users/?{key}={encoded}"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url())
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub fn list_users(
        &self,
        page: u32,
        per_page: Option<u32>,
    ) -> Result<Option<Value>, TransportError> {
        self.execute(self.build_list_users(page, per_page))
    }

    /// First page at the server's default page size.
    pub fn list_all_users(&self) -> Result<Option<Value>, TransportError> {
        self.list_users(1, None)
    }

    pub fn get_user(&self, user: impl Into<UserRef>) -> Result<Option<Value>, TransportError> {
        self.execute(self.build_get_user(&user.into()))
    }

    pub fn create_user(&self, user: &UserRequest) -> Result<Option<Value>, TransportError> {
        let request = self.build_create_user(user)?;
        self.execute(request)
    }

    pub fn update_user(&self, user: &UserRequest) -> Result<Option<Value>, TransportError> {
        let request = self.build_update_user(user)?;
        self.execute(request)
    }

    pub fn delete_user(&self, user: impl Into<UserRef>) -> Result<Option<Value>, TransportError> {
        self.execute(self.build_delete_user(&user.into()))
    }

    pub fn create_impression(
        &self,
        impression: &Impression,
    ) -> Result<Option<Value>, TransportError> {
        let request = self.build_create_impression(impression)?;
        self.execute(request)
    }

    // -----------------------------------------------------------------------
    // Transport primitive
    // -----------------------------------------------------------------------

    /// Authenticate and send `request`, then decode the response body.
    pub fn execute(&self, mut request: HttpRequest) -> Result<Option<Value>, TransportError> {
        request.set_header("authorization", self.authorization());

        if self.config.debug {
            debug!(
                target: WIRE_TARGET,
                method = %request.method,
                url = %request.url,
                body = request.body.as_deref().unwrap_or(""),
                "sending request"
            );
        }

        let outcome = self.transport.execute(&request);
        self.record(&outcome);

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                if self.config.debug {
                    debug!(
                        target: WIRE_TARGET,
                        method = %request.method,
                        url = %request.url,
                        code = err.code(),
                        error = %err.message,
                        "transport call failed"
                    );
                } else {
                    debug!(code = err.code(), error = %err.message, "transport call failed");
                }
                return Err(err);
            }
        };
        if self.config.debug {
            trace_response(&request, &response);
        }
        Ok(decode_body(&response.body))
    }

    /// Outcome of the most recent call, or `None` before the first one.
    pub fn last_error(&self) -> Option<LastError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, outcome: &Result<HttpResponse, TransportError>) {
        let last = match outcome {
            Ok(_) => LastError::ok(),
            Err(err) => LastError::from(err),
        };
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(last);
    }

    fn authorization(&self) -> String {
        let credentials = format!("{}:{}", self.config.app_id, self.config.api_key);
        format!("Basic {}", STANDARD.encode(credentials))
    }
}

impl<T> fmt::Debug for IntercomClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntercomClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn trace_response(request: &HttpRequest, response: &HttpResponse) {
    debug!(
        target: WIRE_TARGET,
        method = %request.method,
        url = %request.url,
        status = response.status,
        content_type = response.header("content-type").unwrap_or(""),
        body = %response.body,
        "received response"
    );
}

fn encode_body<S: serde::Serialize>(payload: &S) -> Result<String, TransportError> {
    serde_json::to_string(payload)
        .map_err(|e| TransportError::new(TransportErrorKind::Other, format!("encode body: {e}")))
}

/// Anything that is not a JSON document (including `null`) decodes to `None`.
pub fn decode_body(body: &str) -> Option<Value> {
    serde_json::from_str::<Value>(body)
        .ok()
        .filter(|value| !value.is_null())
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
