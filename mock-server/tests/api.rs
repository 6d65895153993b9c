use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with_credentials, Credentials};
use serde_json::{json, Value};
use tower::ServiceExt;

// base64("dummy-app-id:dummy-api-key")
const AUTH: &str = "Basic ZHVtbXktYXBwLWlkOmR1bW15LWFwaS1rZXk=";

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, AUTH)
        .body(String::new())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, AUTH)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_credentials_returns_401() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/v1/users/?page=1")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["type"], "unauthorized");
}

#[tokio::test]
async fn wrong_credentials_return_401() {
    let app = app_with_credentials(Credentials {
        app_id: "other".to_string(),
        api_key: "secret".to_string(),
    });
    let resp = app.oneshot(request("GET", "/v1/users/?page=1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- list ---

#[tokio::test]
async fn list_users_empty() {
    let resp = app()
        .oneshot(request("GET", "/v1/users/?page=1"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["users"], json!([]));
    assert_eq!(body["page"], 1);
    assert_eq!(body["total_count"], 0);
    assert_eq!(body["next_page"], Value::Null);
}

// --- create ---

#[tokio::test]
async fn create_user_returns_record() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/v1/users",
            json!({"user_id": "u1", "email": "u1@example.com", "created_at": 1_300_000_000}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let user = body_json(resp).await;
    assert_eq!(user["user_id"], "u1");
    assert_eq!(user["email"], "u1@example.com");
    assert_eq!(user["created_at"], 1_300_000_000);
    assert!(user["intercom_id"].is_string());
}

#[tokio::test]
async fn create_user_without_identity_returns_400() {
    let resp = app()
        .oneshot(json_request("POST", "/v1/users", json!({"name": "Nobody"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["type"], "bad_request");
}

// --- get ---

#[tokio::test]
async fn get_unknown_user_returns_404_body() {
    let resp = app()
        .oneshot(request("GET", "/v1/users/?email=ghost%40example.com"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["type"], "not_found");
}

// --- update ---

#[tokio::test]
async fn update_unknown_user_returns_404() {
    let resp = app()
        .oneshot(json_request("PUT", "/v1/users", json!({"user_id": "nope"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- delete ---

#[tokio::test]
async fn delete_unknown_user_returns_404() {
    let resp = app()
        .oneshot(request("DELETE", "/v1/users/?user_id=nope"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- impressions ---

#[tokio::test]
async fn impression_reports_unread_messages() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/v1/users/impressions",
            json!({"user_id": "u1"}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body, json!({"unread_messages": 0}));
}

// --- full lifecycle ---

#[tokio::test]
async fn user_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/v1/users",
            json!({
                "user_id": "u1",
                "email": "u1@example.com",
                "created_at": 100,
                "custom_data": {"plan": "free"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body_json(resp).await;
    let intercom_id = created["intercom_id"].clone();

    // a second create with the same user_id merges instead of duplicating
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/v1/users",
            json!({"user_id": "u1", "name": "Ada", "custom_data": {"seats": 2}}),
        ))
        .await
        .unwrap();
    let merged = body_json(resp).await;
    assert_eq!(merged["intercom_id"], intercom_id);
    assert_eq!(merged["email"], "u1@example.com");
    assert_eq!(merged["custom_data"], json!({"plan": "free", "seats": 2}));

    // list
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/v1/users/?page=1&per_page=10"))
        .await
        .unwrap();
    let listed = body_json(resp).await;
    assert_eq!(listed["total_count"], 1);
    assert_eq!(listed["users"][0]["user_id"], "u1");

    // get by email
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/v1/users/?email=u1%40example.com"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched = body_json(resp).await;
    assert_eq!(fetched["user_id"], "u1");
    assert_eq!(fetched["name"], "Ada");

    // update
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PUT",
            "/v1/users",
            json!({"user_id": "u1", "last_request_at": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = body_json(resp).await;
    assert_eq!(updated["last_request_at"], 0);
    assert_eq!(updated["name"], "Ada");

    // impression bumps the session count
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/v1/users/impressions",
            json!({"user_id": "u1", "user_ip": "10.0.0.9"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // delete returns the removed record
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("DELETE", "/v1/users/?user_id=u1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let deleted = body_json(resp).await;
    assert_eq!(deleted["session_count"], 1);
    assert_eq!(deleted["last_seen_ip"], "10.0.0.9");

    // get after delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/v1/users/?user_id=u1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_paginates() {
    use tower::Service;

    let mut app = app().into_service();
    for (i, id) in ["a", "b", "c"].iter().enumerate() {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(json_request(
                "POST",
                "/v1/users",
                json!({"user_id": id, "created_at": i}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/v1/users/?page=2&per_page=2"))
        .await
        .unwrap();
    let page = body_json(resp).await;
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["next_page"], Value::Null);
    assert_eq!(page["users"].as_array().unwrap().len(), 1);
    assert_eq!(page["users"][0]["user_id"], "c");
}
