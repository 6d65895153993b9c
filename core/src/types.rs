//! Parameters for the user and impression operations.
//!
//! # Design
//! Optional fields are `Option`s and `None` is never sent. Empty strings and
//! an empty custom-data map carry no information for the API, so they are
//! dropped as well. Timestamps are sent whenever they are `Some`, zero
//! included.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a single user is addressed in a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Email(String),
    Id(String),
}

impl UserRef {
    /// Classify an untyped identifier: anything containing `@` is an email.
    pub fn detect(identifier: &str) -> Self {
        if identifier.contains('@') {
            UserRef::Email(identifier.to_string())
        } else {
            UserRef::Id(identifier.to_string())
        }
    }

    /// The query parameter name and raw (unencoded) value.
    pub fn query_pair(&self) -> (&'static str, &str) {
        match self {
            UserRef::Email(email) => ("email", email),
            UserRef::Id(id) => ("user_id", id),
        }
    }
}

impl From<&str> for UserRef {
    fn from(identifier: &str) -> Self {
        UserRef::detect(identifier)
    }
}

impl From<String> for UserRef {
    fn from(identifier: String) -> Self {
        UserRef::detect(&identifier)
    }
}

/// Payload for creating or updating a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRequest {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub name: Option<String>,
    /// Filled with the current time when the request is built.
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub last_seen_ip: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub last_seen_user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_request_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_data: Map<String, Value>,
}

impl UserRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn created_at(mut self, timestamp: i64) -> Self {
        self.created_at = Some(timestamp);
        self
    }

    pub fn last_seen_ip(mut self, ip: impl Into<String>) -> Self {
        self.last_seen_ip = Some(ip.into());
        self
    }

    pub fn last_seen_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.last_seen_user_agent = Some(user_agent.into());
        self
    }

    pub fn last_request_at(mut self, timestamp: i64) -> Self {
        self.last_request_at = Some(timestamp);
        self
    }

    pub fn custom_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_data.insert(key.into(), value.into());
        self
    }
}

/// Payload for recording a user's visit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impression {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub user_ip: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub current_url: Option<String>,
}

impl Impression {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn user_ip(mut self, ip: impl Into<String>) -> Self {
        self.user_ip = Some(ip.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn current_url(mut self, url: impl Into<String>) -> Self {
        self.current_url = Some(url.into());
        self
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}
