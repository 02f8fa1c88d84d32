//! HTTP tests for the public catalog surfaces.
//!
//! These tests require a migrated database and the server running.
//!
//! Run with: cargo test -p best-wishes-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};

use best_wishes_integration_tests::{TestContext, is_success};

async fn get_json(ctx: &TestContext, path: &str) -> (StatusCode, Value) {
    let resp = ctx.client.get(ctx.url(path)).send().await.expect("request failed");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_product_listing_is_public() {
    let ctx = TestContext::new();
    let (status, body) = get_json(&ctx, "/api/products?page=1&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert!(is_success(&body));
    assert!(body["data"].as_array().is_some_and(|d| d.len() <= 5));
    assert_eq!(body["pagination"]["limit"], json!(5));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_unknown_product_is_not_found() {
    let ctx = TestContext::new();
    let (status, body) = get_json(&ctx, "/api/products/999999999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!is_success(&body));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_recommendations() {
    let ctx = TestContext::new();
    let (status, body) = get_json(&ctx, "/api/recommendations/occasions").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["occasions"].as_array().is_some_and(|o| !o.is_empty()));

    let (status, body) = get_json(&ctx, "/api/recommendations?occasion=birthday&limit=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["occasion"], json!("birthday"));
    assert!(body["recommendations"].as_array().is_some_and(|r| r.len() <= 3));

    let (status, _) = get_json(&ctx, "/api/recommendations?occasion=halloween").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_chatbot_first_question() {
    let ctx = TestContext::new();
    let resp = ctx.client.post(ctx.url("/api/chatbot/start")).send().await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["data"]["state"], json!("occasion"));

    let resp = ctx
        .client
        .post(ctx.url("/api/chatbot/process"))
        .json(&json!({ "userInput": "Birthday", "currentState": "occasion" }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["data"]["state"], json!("recipient"));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_quotes_and_events_are_public() {
    let ctx = TestContext::new();
    let (status, body) = get_json(&ctx, "/api/customization/quotes?type=mug").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["quotes"].is_array());

    let (status, _) = get_json(&ctx, "/api/customization/quotes?type=poster").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_json(&ctx, "/api/events/upcoming").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["events"].is_array());
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_notifications_require_login() {
    let ctx = TestContext::new();
    let (status, _) = get_json(&ctx, "/api/notifications").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
