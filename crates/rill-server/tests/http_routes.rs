//! HTTP routes served by the router.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use rill_playground::PlaygroundConfig;
use rill_server::{AppState, create_router};
use tower::ServiceExt;

#[tokio::test]
async fn health_reports_ok() {
    let app = create_router(Arc::new(AppState::new(PlaygroundConfig::default())));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), 1024).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn ws_requires_upgrade() {
    let app = create_router(Arc::new(AppState::new(PlaygroundConfig::default())));
    let response = app
        .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = create_router(Arc::new(AppState::new(PlaygroundConfig::default())));
    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
