use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_APP_ID: &str = "dummy-app-id";
pub const DEFAULT_API_KEY: &str = "dummy-api-key";
pub const DEFAULT_PER_PAGE: usize = 500;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub intercom_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_request_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_impression_at: Option<i64>,
    pub session_count: u64,
    #[serde(default)]
    pub custom_data: Map<String, Value>,
}

/// Body of `POST /users` and `PUT /users`. Absent fields leave the stored
/// value untouched; `custom_data` keys are merged.
#[derive(Debug, Default, Deserialize)]
pub struct UserInput {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: Option<i64>,
    pub last_seen_ip: Option<String>,
    pub last_seen_user_agent: Option<String>,
    pub last_request_at: Option<i64>,
    pub custom_data: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImpressionInput {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub user_ip: Option<String>,
    pub user_agent: Option<String>,
    pub current_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub email: Option<String>,
    pub user_id: Option<String>,
}

/// The Basic-auth pair every request must present.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub app_id: String,
    pub api_key: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
        }
    }
}

pub type Db = Arc<RwLock<HashMap<Uuid, User>>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    credentials: Arc<Credentials>,
}

/// Error body in the shape the hosted API uses.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound,
    BadRequest(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Access Token Invalid",
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found", "User Not Found"),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
        };
        let body = json!({ "error": { "type": kind, "message": message } });
        (status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    app_with_credentials(Credentials::default())
}

pub fn app_with_credentials(credentials: Credentials) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(HashMap::new())),
        credentials: Arc::new(credentials),
    };
    let users = get(get_or_list_users)
        .post(create_user)
        .put(update_user)
        .delete(delete_user);
    Router::new()
        .route("/v1/users", users.clone())
        .route("/v1/users/", users)
        .route("/v1/users/impressions", post(create_impression))
        .layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(decode_basic);
    match presented {
        Some((app_id, api_key))
            if app_id == state.credentials.app_id && api_key == state.credentials.api_key =>
        {
            next.run(request).await
        }
        _ => {
            tracing::debug!(uri = %request.uri(), "rejecting request with bad credentials");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// Split a `Basic <base64(user:pass)>` header value.
pub fn decode_basic(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

async fn get_or_list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ApiError> {
    let users = state.db.read().await;
    if query.email.is_some() || query.user_id.is_some() {
        let user = find(&users, query.user_id.as_deref(), query.email.as_deref())
            .ok_or(ApiError::NotFound)?;
        return Ok(Json(to_value(user)));
    }

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1);
    let mut all: Vec<&User> = users.values().collect();
    all.sort_by(|a, b| (a.created_at, &a.user_id).cmp(&(b.created_at, &b.user_id)));

    let total_count = all.len();
    let total_pages = total_count.div_ceil(per_page);
    let listed: Vec<Value> = all
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .map(to_value)
        .collect();
    let next_page = (page < total_pages).then_some(page + 1);

    Ok(Json(json!({
        "users": listed,
        "page": page,
        "next_page": next_page,
        "total_pages": total_pages,
        "total_count": total_count,
    })))
}

async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> Result<Json<Value>, ApiError> {
    if input.user_id.is_none() && input.email.is_none() {
        return Err(ApiError::BadRequest("user_id or email is required"));
    }
    let mut users = state.db.write().await;
    let key = find(&users, input.user_id.as_deref(), input.email.as_deref()).map(|u| u.intercom_id);
    let user = match key.and_then(|id| users.get_mut(&id)) {
        Some(existing) => {
            apply(existing, input);
            existing.clone()
        }
        None => {
            let mut user = User {
                intercom_id: Uuid::new_v4(),
                user_id: None,
                email: None,
                name: None,
                created_at: input.created_at.unwrap_or_else(now),
                last_seen_ip: None,
                last_seen_user_agent: None,
                last_request_at: None,
                last_impression_at: None,
                session_count: 0,
                custom_data: Map::new(),
            };
            apply(&mut user, input);
            users.insert(user.intercom_id, user.clone());
            user
        }
    };
    Ok(Json(to_value(&user)))
}

async fn update_user(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> Result<Json<Value>, ApiError> {
    let mut users = state.db.write().await;
    let key = find(&users, input.user_id.as_deref(), input.email.as_deref())
        .map(|u| u.intercom_id)
        .ok_or(ApiError::NotFound)?;
    let user = users.get_mut(&key).ok_or(ApiError::NotFound)?;
    apply(user, input);
    Ok(Json(to_value(user)))
}

async fn delete_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut users = state.db.write().await;
    let key = find(&users, query.user_id.as_deref(), query.email.as_deref())
        .map(|u| u.intercom_id)
        .ok_or(ApiError::NotFound)?;
    let removed = users.remove(&key).ok_or(ApiError::NotFound)?;
    Ok(Json(to_value(&removed)))
}

async fn create_impression(
    State(state): State<AppState>,
    Json(input): Json<ImpressionInput>,
) -> Result<Json<Value>, ApiError> {
    if input.user_id.is_none() && input.email.is_none() {
        return Err(ApiError::BadRequest("user_id or email is required"));
    }
    let mut users = state.db.write().await;
    let key = find(&users, input.user_id.as_deref(), input.email.as_deref()).map(|u| u.intercom_id);
    let timestamp = now();
    let id = match key {
        Some(id) => id,
        None => {
            let user = User {
                intercom_id: Uuid::new_v4(),
                user_id: input.user_id.clone(),
                email: input.email.clone(),
                name: None,
                created_at: timestamp,
                last_seen_ip: None,
                last_seen_user_agent: None,
                last_request_at: None,
                last_impression_at: None,
                session_count: 0,
                custom_data: Map::new(),
            };
            let id = user.intercom_id;
            users.insert(id, user);
            id
        }
    };
    let user = users.get_mut(&id).ok_or(ApiError::NotFound)?;
    user.session_count += 1;
    user.last_impression_at = Some(timestamp);
    user.last_request_at = Some(timestamp);
    if input.user_ip.is_some() {
        user.last_seen_ip = input.user_ip;
    }
    if input.user_agent.is_some() {
        user.last_seen_user_agent = input.user_agent;
    }
    tracing::debug!(
        user_id = ?user.user_id,
        current_url = ?input.current_url,
        "recorded impression"
    );
    Ok(Json(json!({ "unread_messages": 0 })))
}

/// `user_id` wins over `email` when both are given.
fn find<'a>(
    users: &'a HashMap<Uuid, User>,
    user_id: Option<&str>,
    email: Option<&str>,
) -> Option<&'a User> {
    if let Some(user_id) = user_id {
        return users
            .values()
            .find(|u| u.user_id.as_deref() == Some(user_id));
    }
    let email = email?;
    users.values().find(|u| u.email.as_deref() == Some(email))
}

fn apply(user: &mut User, input: UserInput) {
    if input.user_id.is_some() {
        user.user_id = input.user_id;
    }
    if input.email.is_some() {
        user.email = input.email;
    }
    if input.name.is_some() {
        user.name = input.name;
    }
    if let Some(created_at) = input.created_at {
        user.created_at = created_at;
    }
    if input.last_seen_ip.is_some() {
        user.last_seen_ip = input.last_seen_ip;
    }
    if input.last_seen_user_agent.is_some() {
        user.last_seen_user_agent = input.last_seen_user_agent;
    }
    if input.last_request_at.is_some() {
        user.last_request_at = input.last_request_at;
    }
    if let Some(custom_data) = input.custom_data {
        user.custom_data.extend(custom_data);
    }
}

fn to_value(user: &User) -> Value {
    serde_json::to_value(user).unwrap_or(Value::Null)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
