//! Integration tests for Best Wishes.
//!
//! # Running Tests
//!
//! ```bash
//! # Pure workflow tests run with the rest of the workspace
//! cargo test -p best-wishes-integration-tests
//!
//! # Database workflow tests create a scratch database per test
//! DATABASE_URL=postgres://localhost/best_wishes cargo test -p best-wishes-integration-tests \
//!     --test db_workflows -- --ignored
//!
//! # HTTP tests need a migrated database and a running server
//! cargo run -p best-wishes-cli -- migrate
//! cargo run -p best-wishes-server &
//! cargo test -p best-wishes-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - Postgres server used by the database workflow tests
//! - `BW_TEST_BASE_URL` - Server under test (default `http://localhost:5000`)
//! - `BW_TEST_ADMIN_EMAIL`, `BW_TEST_ADMIN_PASSWORD` - An admin account for
//!   staff tests (create one with `bw-cli user create`)

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password used for every account the tests register.
pub const TEST_PASSWORD: &str = "gift#wrap2024";

/// A cookie-carrying client pointed at the server under test.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl TestContext {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn new() -> Self {
        let base_url = std::env::var("BW_TEST_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string())
            .trim_end_matches('/')
            .to_string();
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");
        Self { client, base_url }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Register a fresh customer; the session cookie is kept by the client.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the request fails.
    pub async fn register_customer(&self) -> Result<(String, Response), reqwest::Error> {
        let email = unique_email("customer");
        let resp = self
            .client
            .post(self.url("/api/register"))
            .json(&json!({
                "firstName": "Test",
                "lastName": "Customer",
                "email": email,
                "password": TEST_PASSWORD,
            }))
            .send()
            .await?;
        Ok((email, resp))
    }

    /// # Errors
    ///
    /// Returns the transport error if the request fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<Response, reqwest::Error> {
        self.client
            .post(self.url("/api/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
    }

    /// Log in as the configured admin. `None` when no admin is configured.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the request fails.
    pub async fn login_admin(&self) -> Result<Option<StatusCode>, reqwest::Error> {
        let (Ok(email), Ok(password)) = (
            std::env::var("BW_TEST_ADMIN_EMAIL"),
            std::env::var("BW_TEST_ADMIN_PASSWORD"),
        ) else {
            return Ok(None);
        };
        Ok(Some(self.login(&email, &password).await?.status()))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A throwaway address that will not collide with earlier runs.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@bestwishes.test", Uuid::new_v4().simple())
}

/// Read the `success` flag of an API body.
#[must_use]
pub fn is_success(body: &Value) -> bool {
    body.get("success").and_then(Value::as_bool).unwrap_or(false)
}
