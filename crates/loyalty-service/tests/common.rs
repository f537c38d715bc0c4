//! Common test utilities for loyalty service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use rust_decimal::Decimal;
use serde_json::json;

use loyalty_accrual::AccrualClient;
use loyalty_core::{OrderStatus, UserId};
use loyalty_service::{create_router, AppState, Reconciler, ReconcilerConfig, ServiceConfig};
use loyalty_store::{MemoryStore, Store};

/// A registered user and the credentials to act as them.
pub struct TestUser {
    /// The user's ID.
    pub user_id: UserId,
    /// `Authorization: Bearer ...` value.
    pub bearer: HeaderValue,
    /// `Cookie: session_token=...` value.
    pub cookie: HeaderValue,
}

impl TestUser {
    /// Header pair authenticating through the bearer token.
    pub fn auth(&self) -> (HeaderName, HeaderValue) {
        (AUTHORIZATION, self.bearer.clone())
    }

    /// Header pair authenticating through the session cookie.
    pub fn cookie_auth(&self) -> (HeaderName, HeaderValue) {
        (COOKIE, self.cookie.clone())
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server.
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    /// Create a new test harness with an empty in-memory store.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            auth_secret: "test-secret".into(),
            ..ServiceConfig::default()
        };

        let state = AppState::new(store.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, store }
    }

    /// Register `login` and return its session credentials.
    pub async fn register(&self, login: &str) -> TestUser {
        let response = self
            .server
            .post("/api/user/register")
            .json(&json!({ "login": login, "password": "correct horse" }))
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        let user_id = body["user_id"]
            .as_str()
            .expect("user_id in body")
            .parse()
            .expect("valid user id");

        let bearer = response
            .headers()
            .get(AUTHORIZATION)
            .expect("authorization header")
            .clone();

        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .expect("set-cookie header")
            .to_str()
            .expect("ascii cookie")
            .to_string();
        let pair = set_cookie.split(';').next().expect("cookie pair");
        let cookie = HeaderValue::from_str(pair).expect("valid cookie header");

        TestUser {
            user_id,
            bearer,
            cookie,
        }
    }

    /// Submit an order for `user` and return the status code.
    pub async fn submit_order(&self, user: &TestUser, number: &str) -> axum::http::StatusCode {
        let (name, value) = user.auth();
        self.server
            .post("/api/user/orders")
            .add_header(name, value)
            .text(number)
            .await
            .status_code()
    }

    /// Settle `number` as `PROCESSED` with `points`, bypassing the reconciler.
    pub async fn settle(&self, number: &str, points: Decimal) {
        self.store
            .apply_accrual(number, OrderStatus::Processed, points)
            .await
            .expect("apply accrual");
    }

    /// A reconciler over this harness's store, pointed at `accrual_url`.
    pub fn reconciler(&self, accrual_url: &str) -> Reconciler {
        let client =
            AccrualClient::new(accrual_url, Duration::from_secs(5)).expect("accrual client");
        Reconciler::new(
            self.store.clone(),
            client,
            ReconcilerConfig {
                default_interval: Duration::from_millis(50),
            },
        )
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
