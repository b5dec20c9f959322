//! End-to-end tests for login, registration, refresh and password rotation.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{PASSWORD, TestApp, field_user};
use serde_json::json;
use spendgate_shared::TokenKind;
use uuid::Uuid;

#[tokio::test]
async fn test_login_normalises_email_and_hides_hash() {
    let app = TestApp::new();
    let acme = app.register("ACME").await;

    let res = app.login("  ADMIN@Acme.Test ", PASSWORD).await;

    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["user"]["email"], acme.admin_email);
    assert_eq!(res.body["user"]["role"], "admin");
    assert!(res.body["user"].get("password_hash").is_none());
    assert!(!res.body["user"]["last_login_at"].is_null());
    assert_eq!(res.body["expires_in"], 7 * 24 * 60 * 60);
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_the_same() {
    let app = TestApp::new();
    let acme = app.register("ACME").await;

    let wrong_password = app.login(&acme.admin_email, "Wr0ngPass!").await;
    let unknown = app.login("nobody@acme.test", PASSWORD).await;

    for res in [&wrong_password, &unknown] {
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.code(), "INVALID_CREDENTIALS");
    }
    assert_eq!(wrong_password.body["message"], unknown.body["message"]);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_input() {
    let app = TestApp::new();
    app.register("ACME").await;

    let body = |code: &str, domain: &str, email: &str, password: &str| {
        json!({
            "name": format!("{code} Holdings"),
            "code": code,
            "domain": domain,
            "admin": {
                "first_name": "Bo",
                "last_name": "Boss",
                "email": email,
                "password": password,
            }
        })
    };

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(body("OTHER", "acme.test", "boss@other.test", PASSWORD)),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "DUPLICATE_ENTRY");

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(body("OTHER", "other.test", "admin@acme.test", PASSWORD)),
        )
        .await;
    assert_eq!(res.code(), "DUPLICATE_ENTRY");

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(body("OTHER", "other_co.test", "boss@other.test", PASSWORD)),
        )
        .await;
    assert_eq!(res.code(), "VALIDATION_ERROR");

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(body("OTHER", "other.test", "boss@other.test", "password")),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let app = TestApp::new();
    let acme = app.register("ACME").await;
    let login = app.login(&acme.admin_email, PASSWORD).await;
    let refresh_token = login.body["refresh_token"].as_str().unwrap();

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let token = res.body["token"].as_str().unwrap();
    assert_eq!(app.get("/api/v1/auth/me", token).await.status, StatusCode::OK);

    let res = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": acme.admin_token })),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.code(), "INVALID_TOKEN");
}

#[tokio::test]
async fn test_password_change_rotates_older_tokens() {
    let app = TestApp::new();
    let acme = app.register("ACME").await;
    let old_token = app
        .tokens
        .generate_at(
            Uuid::parse_str(&acme.admin_id).unwrap(),
            Some(Uuid::parse_str(&acme.company_id).unwrap()),
            "admin",
            TokenKind::Access,
            Utc::now() - Duration::seconds(30),
        )
        .unwrap();
    assert_eq!(app.get("/api/v1/auth/me", &old_token).await.status, StatusCode::OK);

    let res = app
        .post(
            "/api/v1/auth/change-password",
            &acme.admin_token,
            json!({ "current_password": PASSWORD, "new_password": "N3wSecret!" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let fresh = res.body["token"].as_str().unwrap().to_string();

    let res = app.get("/api/v1/auth/me", &old_token).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.code(), "CREDENTIALS_ROTATED");

    assert_eq!(app.get("/api/v1/auth/me", &fresh).await.status, StatusCode::OK);
    assert_eq!(
        app.login(&acme.admin_email, PASSWORD).await.code(),
        "INVALID_CREDENTIALS"
    );
    assert_eq!(
        app.login(&acme.admin_email, "N3wSecret!").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_password_change_checks_current_and_policy() {
    let app = TestApp::new();
    let acme = app.register("ACME").await;

    let res = app
        .post(
            "/api/v1/auth/change-password",
            &acme.admin_token,
            json!({ "current_password": "Wr0ngPass!", "new_password": "N3wSecret!" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "VALIDATION_ERROR");

    let res = app
        .post(
            "/api/v1/auth/change-password",
            &acme.admin_token,
            json!({ "current_password": PASSWORD, "new_password": "short" }),
        )
        .await;
    assert_eq!(res.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_me_returns_live_company_summary() {
    let app = TestApp::new();
    let acme = app.register("ACME").await;

    let res = app.get("/api/v1/auth/me", &acme.admin_token).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["user"]["id"], acme.admin_id.as_str());
    let company = &res.body["data"]["company"];
    assert_eq!(company["id"], acme.company_id.as_str());
    assert_eq!(company["code"], "ACME");
    assert_eq!(company["plan"], "trial");
    assert_eq!(company["subscription_status"], "trial");
    assert!(
        !company["modules"]
            .as_array()
            .unwrap()
            .iter()
            .any(|m| m["module"] == "analytics")
    );
}

#[tokio::test]
async fn test_deactivated_user_is_locked_out() {
    let app = TestApp::new();
    let acme = app.register("ACME").await;
    let rep_id = app
        .create_user(
            &acme.admin_token,
            field_user("E-1", "rep@acme.test", "sales_rep", json!([]), &[]),
        )
        .await;
    let rep = app.token_for("rep@acme.test").await;

    let res = app
        .put(&format!("/api/v1/users/{rep_id}/deactivate"), &acme.admin_token, json!({}))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["is_active"], false);

    let res = app.get("/api/v1/auth/me", &rep).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.code(), "ACCOUNT_DEACTIVATED");
    assert_eq!(
        app.login("rep@acme.test", PASSWORD).await.code(),
        "ACCOUNT_DEACTIVATED"
    );

    let res = app
        .put(
            &format!("/api/v1/users/{}/deactivate", acme.admin_id),
            &acme.admin_token,
            json!({}),
        )
        .await;
    assert_eq!(res.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_profile_update_only_touches_names() {
    let app = TestApp::new();
    let acme = app.register("ACME").await;
    app.create_user(
        &acme.admin_token,
        field_user("E-1", "rep@acme.test", "sales_rep", json!([]), &[]),
    )
    .await;
    let rep = app.token_for("rep@acme.test").await;

    let res = app
        .put(
            "/api/v1/auth/me",
            &rep,
            json!({
                "first_name": " Grace ",
                "role": "admin",
                "approval_limits": { "marketing": "1000000" },
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["first_name"], "Grace");
    assert_eq!(res.body["data"]["last_name"], "User");
    assert_eq!(res.body["data"]["role"], "sales_rep");
    assert_eq!(res.body["data"]["approval_limits"]["marketing"], "0");

    let res = app.put("/api/v1/auth/me", &rep, json!({ "last_name": "X" })).await;
    assert_eq!(res.code(), "VALIDATION_ERROR");

    let root = app.super_admin_token().await;
    let res = app
        .put("/api/v1/auth/me", &root, json!({ "last_name": "Operator" }))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["last_name"], "Operator");

    let res = app
        .request(Method::PUT, "/api/v1/auth/me", None, Some(json!({ "first_name": "Anon" })))
        .await;
    assert_eq!(res.code(), "MISSING_TOKEN");
}
