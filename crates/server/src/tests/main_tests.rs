use super::*;
use axum::{
    body::{self, Body},
    http::Request,
    response::Response,
};
use serde::de::DeserializeOwned;
use shared::domain::ContainerId;
use tower::ServiceExt;

use crate::token::TokenConfig;

async fn test_app() -> Router {
    let api = ApiContext {
        storage: Storage::demo().await,
        tokens: TokenConfig {
            secret: "route-secret".into(),
            access_ttl_seconds: 60,
            refresh_ttl_seconds: 600,
        },
    };
    build_router(Arc::new(AppState { api }))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn post_json(uri: &str, value: serde_json::Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(value.to_string())).expect("request")
}

fn get_with(uri: &str, bearer: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {bearer}"))
        .body(Body::empty())
        .expect("request")
}

async fn login(app: &Router) -> TokenPair {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/token/",
            serde_json::json!({ "email": "admin@example.com", "password": "admin123" }),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

#[tokio::test]
async fn healthz_is_public() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn bad_credentials_return_unauthorized_body() {
    let app = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/token/",
            serde_json::json!({ "email": "admin@example.com", "password": "nope" }),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn board_routes_require_bearer_token() {
    let app = test_app().await;
    for uri in ["/api/tasks/", "/api/tasks/columns/", "/api/users/me/"] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = app
        .oneshot(get_with("/api/tasks/", "not-a-jwt"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_then_list_board() {
    let app = test_app().await;
    let pair = login(&app).await;

    let me: User = read_json(
        app.clone()
            .oneshot(get_with("/api/users/me/", &pair.access))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(me.email, "admin@example.com");

    let columns: Page<Container> = read_json(
        app.clone()
            .oneshot(get_with("/api/tasks/columns/", &pair.access))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(columns.count, 4);
    assert!(columns.results.iter().all(|column| column.task_count.is_some()));

    let tasks: Page<Item> = read_json(
        app.oneshot(get_with("/api/tasks/", &pair.access))
            .await
            .expect("response"),
    )
    .await;
    assert_eq!(tasks.count as usize, tasks.results.len());
}

#[tokio::test]
async fn refresh_issues_access_but_rejects_access_tokens() {
    let app = test_app().await;
    let pair = login(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/token/refresh/",
            serde_json::json!({ "refresh": pair.refresh }),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed: AccessToken = read_json(response).await;
    let response = app
        .clone()
        .oneshot(get_with("/api/users/me/", &refreshed.access))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post_json(
            "/api/token/refresh/",
            serde_json::json!({ "refresh": pair.access }),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn move_route_updates_task_and_reports_missing_targets() {
    let app = test_app().await;
    let pair = login(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/tasks/1/move/",
            serde_json::json!({ "column_id": 3, "position": 0 }),
            Some(&pair.access),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let moved: Item = read_json(response).await;
    assert_eq!(moved.column.map(|column| column.id), Some(ContainerId::Remote(3)));
    assert_eq!(moved.position, 0);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/tasks/1/move/",
            serde_json::json!({ "column_id": 99, "position": 0 }),
            Some(&pair.access),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = read_json(response).await;
    assert_eq!(err.message, "Column not found");

    let response = app
        .oneshot(post_json(
            "/api/tasks/999/move/",
            serde_json::json!({ "column_id": 3, "position": 0 }),
            Some(&pair.access),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_bodies_are_refused() {
    let app = test_app().await;
    let body = serde_json::json!({
        "email": "admin@example.com",
        "password": "x".repeat(MAX_BODY_BYTES + 1),
    })
    .to_string();
    let request = Request::post("/api/token/")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn move_without_column_only_repositions() {
    let app = test_app().await;
    let pair = login(&app).await;

    let response = app
        .oneshot(post_json(
            "/api/tasks/1/move/",
            serde_json::json!({ "position": 4 }),
            Some(&pair.access),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let moved: Item = read_json(response).await;
    assert_eq!(moved.column.map(|column| column.id), Some(ContainerId::Remote(1)));
    assert_eq!(moved.position, 4);
}
