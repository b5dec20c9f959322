//! Shared harness for the API end-to-end tests.
//!
//! Drives the real router over the in-memory store with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use spendgate_api::{AppState, create_router};
use spendgate_core::auth::hash_password;
use spendgate_core::identity::NewUser;
use spendgate_db::{MemoryStore, UserStore};
use spendgate_shared::config::RateLimitConfig;
use spendgate_shared::{TokenConfig, TokenService};
use tower::ServiceExt;

/// Satisfies the password policy.
pub const PASSWORD: &str = "Passw0rd!";
pub const SUPER_ADMIN_EMAIL: &str = "ops@spendgate.test";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `code` field of an error body.
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

/// A registered company and its admin's access token.
pub struct Registered {
    pub company_id: String,
    pub admin_id: String,
    pub admin_email: String,
    pub admin_token: String,
}

pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    /// Signs with the same secret as the router.
    pub tokens: TokenService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        })
    }

    pub fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            store.clone(),
            TokenService::new(TokenConfig::default()),
            rate_limit,
        );
        Self {
            router: create_router(state),
            store,
            tokens: TokenService::new(TokenConfig::default()),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn token_for(&self, email: &str) -> String {
        let res = self.login(email, PASSWORD).await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
        res.body["token"].as_str().unwrap().to_string()
    }

    /// Self-registers a trial company with code `code` and logs its admin in.
    pub async fn register(&self, code: &str) -> Registered {
        let domain = format!("{}.test", code.to_lowercase());
        let admin_email = format!("admin@{domain}");
        let res = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "name": format!("{code} Foods"),
                    "code": code,
                    "domain": domain,
                    "admin": {
                        "first_name": "Ada",
                        "last_name": "Admin",
                        "email": admin_email,
                        "password": PASSWORD,
                    }
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.body);

        Registered {
            company_id: res.body["data"]["company"]["id"].as_str().unwrap().to_string(),
            admin_id: res.body["data"]["user"]["id"].as_str().unwrap().to_string(),
            admin_token: self.token_for(&admin_email).await,
            admin_email,
        }
    }

    /// Creates a tenant user through the API and returns its id.
    pub async fn create_user(&self, admin_token: &str, body: Value) -> String {
        let res = self.post("/api/v1/users", admin_token, body).await;
        assert_eq!(res.status, StatusCode::CREATED, "create user failed: {}", res.body);
        res.body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Creates a trade spend as `token` and returns its id.
    pub async fn create_spend(&self, token: &str, customer_id: &str, amount: &str) -> String {
        let res = self
            .post(
                "/api/v1/trade-spends",
                token,
                json!({
                    "customer_id": customer_id,
                    "category": "cash_coop",
                    "amount": amount,
                    "description": "end cap",
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "create spend failed: {}", res.body);
        res.body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Seeds the platform super-admin and logs it in.
    pub async fn super_admin_token(&self) -> String {
        if self
            .store
            .find_user_by_email(SUPER_ADMIN_EMAIL)
            .await
            .unwrap()
            .is_none()
        {
            let hash = hash_password(PASSWORD).unwrap();
            self.store
                .create_platform_user(NewUser::super_admin(SUPER_ADMIN_EMAIL, hash))
                .await
                .unwrap();
        }
        self.token_for(SUPER_ADMIN_EMAIL).await
    }
}

/// Body for a field user with the given role, permissions and customers.
pub fn field_user(
    employee_id: &str,
    email: &str,
    role: &str,
    permissions: Value,
    customers: &[&str],
) -> Value {
    json!({
        "employee_id": employee_id,
        "email": email,
        "password": PASSWORD,
        "first_name": "Field",
        "last_name": "User",
        "role": role,
        "department": "sales",
        "permissions": permissions,
        "assigned": { "customers": customers },
    })
}
