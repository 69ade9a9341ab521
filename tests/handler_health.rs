mod common;

use axum::{Router, routing::get};
use axum_test::TestServer;
use cep_locator::api::handlers::health_handler;
use common::StackBuilder;

#[tokio::test]
async fn test_health_endpoint_success() {
    let stack = StackBuilder::new().build();
    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(common::create_test_state(&stack));

    let server = TestServer::new(app).unwrap();

    let response = server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["store"]["status"], "ok");
}

#[tokio::test]
async fn test_health_endpoint_structure() {
    let stack = StackBuilder::new().build();
    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(common::create_test_state(&stack));

    let server = TestServer::new(app).unwrap();

    let response = server.get("/health").await;

    let json = response.json::<serde_json::Value>();

    assert!(json.get("status").is_some());
    assert!(json.get("version").is_some());
    assert!(json["checks"].get("store").is_some());
    assert!(json["checks"]["store"].get("message").is_some());
}
