use axum::http::StatusCode;
use serde_json::json;

use crate::common::{self, get, patch_json, post_empty, post_json, register, PASSWORD};

#[tokio::test]
async fn register_returns_session_and_unverified_user() {
    let Some(app) = common::test_app().await else { return };

    let (status, body) = post_json(
        &app.router,
        "/api/auth/register",
        &json!({
            "email": "Asha.Rao@Example.IN",
            "password": PASSWORD,
            "advocateCode": "KA/2001/2012",
            "advocateName": "Asha Rao",
        }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let data = &body["data"];
    assert_eq!(data["user"]["email"], "asha.rao@example.in");
    assert_eq!(data["user"]["isVerified"], false);
    assert_eq!(data["user"]["role"], "ADVOCATE");
    assert!(data["accessToken"].as_str().is_some());
    assert!(data["refreshToken"].as_str().is_some());
    assert_eq!(data["expiresIn"], 15 * 60);

    let plan: String = sqlx::query_scalar(
        "SELECT s.plan FROM subscriptions s JOIN users u ON u.id = s.advocate_id WHERE u.email = $1",
    )
    .bind("asha.rao@example.in")
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(plan, "FREE");
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let Some(app) = common::test_app().await else { return };
    register(&app.router, "dup@example.in").await;

    let (status, body) = post_json(
        &app.router,
        "/api/auth/register",
        &json!({
            "email": "DUP@example.in",
            "password": PASSWORD,
            "advocateCode": "KA/9/2019",
            "advocateName": "Someone Else",
        }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "Conflict");
}

#[tokio::test]
async fn register_validates_fields() {
    let Some(app) = common::test_app().await else { return };

    let (status, body) = post_json(
        &app.router,
        "/api/auth/register",
        &json!({
            "email": "not-an-email",
            "password": "short",
            "advocateCode": "",
            "advocateName": "X",
        }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = &body["error"]["fieldErrors"];
    assert!(fields.get("email").is_some());
    assert!(fields.get("password").is_some());
    assert!(fields.get("advocateCode").is_some());
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let Some(app) = common::test_app().await else { return };
    register(&app.router, "lawyer@example.in").await;

    let (status, body) = post_json(
        &app.router,
        "/api/auth/login",
        &json!({ "email": "lawyer@example.in", "password": "wrong-password" }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid email or password");

    let (status, _) = post_json(
        &app.router,
        "/api/auth/login",
        &json!({ "email": "nobody@example.in", "password": PASSWORD }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn inactive_account_cannot_log_in() {
    let Some(app) = common::test_app().await else { return };
    register(&app.router, "gone@example.in").await;
    sqlx::query("UPDATE users SET is_active = FALSE WHERE email = 'gone@example.in'")
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, _) = post_json(
        &app.router,
        "/api/auth/login",
        &json!({ "email": "gone@example.in", "password": PASSWORD }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn refresh_token_is_single_use() {
    let Some(app) = common::test_app().await else { return };
    register(&app.router, "rotate@example.in").await;
    let session = common::login(&app.router, "rotate@example.in").await;
    let refresh = session["refreshToken"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &app.router,
        "/api/auth/refresh",
        &json!({ "refreshToken": refresh }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["refreshToken"].as_str().unwrap(), refresh);

    let (status, _) = post_json(
        &app.router,
        "/api/auth/refresh",
        &json!({ "refreshToken": refresh }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_without_token_is_rejected() {
    let Some(app) = common::test_app().await else { return };

    let (status, body) = post_json(&app.router, "/api/auth/refresh", &json!({}), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Refresh token required");
}

#[tokio::test]
async fn logout_revokes_refresh_tokens() {
    let Some(app) = common::test_app().await else { return };
    register(&app.router, "out@example.in").await;
    let session = common::login(&app.router, "out@example.in").await;
    let access = session["accessToken"].as_str().unwrap();
    let refresh = session["refreshToken"].as_str().unwrap();

    let (status, _) = post_empty(&app.router, "/api/auth/logout", access).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = post_json(
        &app.router,
        "/api/auth/refresh",
        &json!({ "refreshToken": refresh }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_authentication() {
    let Some(app) = common::test_app().await else { return };

    let (status, _) = get(&app.router, "/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, token) = register(&app.router, "me@example.in").await;
    let (status, body) = get(&app.router, "/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "me@example.in");
}

#[tokio::test]
async fn profile_update_changes_only_given_fields() {
    let Some(app) = common::test_app().await else { return };
    register(&app.router, "taken@example.in").await;
    let (_, token) = register(&app.router, "me@example.in").await;

    let (status, body) = patch_json(
        &app.router,
        "/api/auth/me",
        &json!({ "advocateName": " Anjali Rao ", "mobile": "9847012345" }),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["advocateName"], "Anjali Rao");
    assert_eq!(body["data"]["mobile"], "9847012345");
    assert_eq!(body["data"]["email"], "me@example.in");

    let (status, body) =
        patch_json(&app.router, "/api/auth/me", &json!({ "email": "Taken@Example.in" }), &token)
            .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "Conflict");

    let (status, body) =
        patch_json(&app.router, "/api/auth/me", &json!({ "email": "not-an-email" }), &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fieldErrors"].get("email").is_some());

    let (status, body) = patch_json(
        &app.router,
        "/api/auth/me",
        &json!({ "email": "New@Example.in", "mobile": "" }),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "new@example.in");
    assert!(body["data"]["mobile"].is_null());
    assert_eq!(body["data"]["advocateName"], "Anjali Rao");

    let (status, _) = post_json(
        &app.router,
        "/api/auth/login",
        &json!({ "email": "new@example.in", "password": PASSWORD }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
        patch_json(&app.router, "/api/auth/me", &json!({ "mobile": "1" }), "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unverified_advocate_cannot_manage_cases() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = register(&app.router, "new@example.in").await;

    let (status, _) = get(&app.router, "/api/cases", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Usage is open to unverified accounts.
    let (status, _) = get(&app.router, "/api/usage", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_verifies_advocate() {
    let Some(app) = common::test_app().await else { return };
    let (user_id, token) = register(&app.router, "pending@example.in").await;
    let admin = common::admin(&app, "admin@example.in").await;

    let (status, _) = post_empty(&app.router, &format!("/api/auth/verify/{user_id}"), &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
        post_empty(&app.router, &format!("/api/auth/verify/{user_id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isVerified"], true);

    // The flag reaches the token on the next login.
    let session = common::login(&app.router, "pending@example.in").await;
    let (status, _) = get(
        &app.router,
        "/api/cases",
        session["accessToken"].as_str(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn verify_unknown_user_is_not_found() {
    let Some(app) = common::test_app().await else { return };
    let admin = common::admin(&app, "admin@example.in").await;

    let (status, _) = post_empty(
        &app.router,
        &format!("/api/auth/verify/{}", uuid::Uuid::new_v4()),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
