//! HTTP tests for accounts, sessions and staff management.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`bw-cli migrate`)
//! - The server running (`cargo run -p best-wishes-server`)
//! - `BW_TEST_ADMIN_EMAIL` / `BW_TEST_ADMIN_PASSWORD` for the staff tests
//!
//! Run with: cargo test -p best-wishes-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};

use best_wishes_integration_tests::{TEST_PASSWORD, TestContext, is_success, unique_email};

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_health() {
    let ctx = TestContext::new();
    let resp = ctx.client.get(ctx.url("/health")).send().await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");

    let ready = ctx.client.get(ctx.url("/health/ready")).send().await.expect("request failed");
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_register_login_logout() {
    let ctx = TestContext::new();
    let (email, resp) = ctx.register_customer().await.expect("register failed");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("json");
    assert!(is_success(&body));
    assert_eq!(body["user"]["email"], json!(email));
    assert!(body["user"].get("passwordHash").is_none());

    // Registration starts a session.
    let me = ctx.client.get(ctx.url("/api/myprofile")).send().await.expect("request failed");
    assert_eq!(me.status(), StatusCode::OK);

    let out = ctx.client.post(ctx.url("/api/logout")).send().await.expect("request failed");
    assert_eq!(out.status(), StatusCode::OK);
    let me = ctx.client.get(ctx.url("/api/myprofile")).send().await.expect("request failed");
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let login = ctx.login(&email, TEST_PASSWORD).await.expect("login failed");
    assert_eq!(login.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_duplicate_registration_rejected() {
    let ctx = TestContext::new();
    let (email, first) = ctx.register_customer().await.expect("register failed");
    assert_eq!(first.status(), StatusCode::CREATED);

    let again = TestContext::new()
        .client
        .post(ctx.url("/api/register"))
        .json(&json!({
            "firstName": "Test",
            "lastName": "Again",
            "email": email,
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_wrong_password_is_unauthorized() {
    let ctx = TestContext::new();
    let (email, _) = ctx.register_customer().await.expect("register failed");
    let resp = TestContext::new()
        .login(&email, "not-the-password")
        .await
        .expect("login failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_forgot_password_does_not_reveal_accounts() {
    let ctx = TestContext::new();
    let resp = ctx
        .client
        .post(ctx.url("/api/forgot-password"))
        .json(&json!({ "email": unique_email("nobody") }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_customer_cannot_reach_staff_routes() {
    let ctx = TestContext::new();
    ctx.register_customer().await.expect("register failed");

    for path in ["/api/admin/users", "/api/orders/all", "/api/delivery/orders"] {
        let resp = ctx.client.get(ctx.url(path)).send().await.expect("request failed");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running server, database and an admin account"]
async fn test_admin_creates_and_removes_staff() {
    let ctx = TestContext::new();
    let Some(status) = ctx.login_admin().await.expect("login failed") else {
        return;
    };
    assert_eq!(status, StatusCode::OK);

    let email = unique_email("rider");
    let check: Value = ctx
        .client
        .get(ctx.url(&format!("/api/admin/users/check-email/{email}")))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("json");
    assert_eq!(check["available"], json!(true));

    let created = ctx
        .client
        .post(ctx.url("/api/admin/users"))
        .json(&json!({
            "firstName": "Sam",
            "lastName": "Rider",
            "email": email,
            "password": "r1der#pass",
            "role": "deliveryStaff",
        }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(created.status(), StatusCode::CREATED);
    let body: Value = created.json().await.expect("json");
    assert_eq!(body["user"]["role"], json!("deliveryStaff"));
    let id = body["user"]["id"].clone();

    let deactivated = ctx
        .client
        .post(ctx.url("/api/admin/users/deactivate"))
        .json(&json!({ "userIds": [id] }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(deactivated.status(), StatusCode::OK);

    let deleted = ctx
        .client
        .delete(ctx.url("/api/admin/users"))
        .json(&json!({ "userIds": [id] }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(deleted.status(), StatusCode::OK);
}
