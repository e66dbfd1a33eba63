use axum::http::StatusCode;
use serde_json::json;

use crate::common::{self, case_body, create_case, delete, get, post_json, put_json};

#[tokio::test]
async fn fresh_account_reports_free_plan() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    create_case(&app.router, &token, "KHC/WP/2024/1001").await;
    create_case(&app.router, &token, "KHC/WP/2024/1002").await;

    let (status, body) = get(&app.router, "/api/usage", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let usage = &body["data"];
    assert_eq!(usage["plan"], "FREE");
    assert_eq!(usage["counters"]["casesCount"], 2);
    assert_eq!(usage["cases"]["used"], 2);
    assert_eq!(usage["cases"]["limit"], 5);
    assert_eq!(usage["cases"]["reached"], false);
    assert_eq!(usage["cases"]["percentage"], 40.0);
    assert_eq!(usage["aiAnalyses"]["limit"], 10);

    let snapshots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_tracking")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(snapshots, 1);
}

#[tokio::test]
async fn case_limit_blocks_creation_until_upgrade() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let mut ids = Vec::new();
    for n in 0..5 {
        ids.push(create_case(&app.router, &token, &format!("KHC/WP/2024/11{n}")).await);
    }

    let (status, body) =
        post_json(&app.router, "/api/cases", &case_body("KHC/WP/2024/1199"), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "Forbidden");

    // Hidden cases no longer count.
    delete(&app.router, &format!("/api/cases/{}", ids[0]), &token).await;
    let (status, _) =
        post_json(&app.router, "/api/cases", &case_body("KHC/WP/2024/1199"), Some(&token)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) =
        post_json(&app.router, "/api/cases", &case_body("KHC/WP/2024/1200"), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = put_json(
        &app.router,
        "/api/subscription/plan",
        &json!({ "plan": "PROFESSIONAL", "billingCycle": "MONTHLY" }),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["plan"], "PROFESSIONAL");
    assert_eq!(body["data"]["amount"], 99_900);

    let (status, _) =
        post_json(&app.router, "/api/cases", &case_body("KHC/WP/2024/1200"), Some(&token)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = get(&app.router, "/api/usage", Some(&token)).await;
    assert!(body["data"]["cases"]["limit"].is_null());
    assert_eq!(body["data"]["cases"]["percentage"], 0.0);
    assert_eq!(body["data"]["storage"]["limit"], 50_i64 * 1024 * 1024 * 1024);
}

fn upload_body(file_name: &str, file_size: i64) -> serde_json::Value {
    json!({
        "fileName": file_name,
        "contentType": "application/pdf",
        "fileSize": file_size,
        "category": "CASE_FILE",
    })
}

#[tokio::test]
async fn upload_that_would_overflow_storage_is_refused() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/1300").await;
    let uri = format!("/api/cases/{case_id}/documents");
    const MIB: i64 = 1024 * 1024;

    // Larger than any single upload may be.
    let (status, body) =
        post_json(&app.router, &uri, &upload_body("huge.pdf", 5 * 1024 * MIB), Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fieldErrors"].get("fileSize").is_some());

    let (status, body) =
        post_json(&app.router, &uri, &upload_body("bundle.pdf", 40 * MIB), Some(&token)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let doc_id = body["data"]["document"]["id"].as_str().unwrap().to_string();

    // Leave 10 MiB of the 1 GiB free plan.
    sqlx::query("UPDATE documents SET file_size = $1 WHERE id = $2::uuid")
        .bind(1024 * MIB - 10 * MIB)
        .bind(&doc_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, body) =
        post_json(&app.router, &uri, &upload_body("annexure.pdf", 20 * MIB), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "Forbidden");

    let (status, _) =
        post_json(&app.router, &uri, &upload_body("vakalat.pdf", 10 * MIB), Some(&token)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = get(&app.router, "/api/usage", Some(&token)).await;
    assert_eq!(body["data"]["storage"]["used"], 1024 * MIB);
    assert_eq!(body["data"]["storage"]["reached"], true);
}

#[tokio::test]
async fn subscription_defaults_and_annual_switch() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::register(&app.router, "adv@example.in").await;

    let (status, body) = get(&app.router, "/api/subscription", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["plan"], "FREE");
    assert_eq!(body["data"]["status"], "ACTIVE");
    assert_eq!(body["data"]["currency"], "INR");

    let (status, body) = put_json(
        &app.router,
        "/api/subscription/plan",
        &json!({ "plan": "ENTERPRISE", "billingCycle": "ANNUAL" }),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["billingCycle"], "ANNUAL");
    assert_eq!(body["data"]["amount"], 4_999_000);

    let start = chrono::DateTime::parse_from_rfc3339(body["data"]["startDate"].as_str().unwrap()).unwrap();
    let end = chrono::DateTime::parse_from_rfc3339(body["data"]["endDate"].as_str().unwrap()).unwrap();
    assert!((end - start).num_days() >= 365);

    let (status, _) = put_json(
        &app.router,
        "/api/subscription/plan",
        &json!({ "plan": "PLATINUM" }),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn usage_requires_authentication() {
    let Some(app) = common::test_app().await else { return };

    let (status, _) = get(&app.router, "/api/usage", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = get(&app.router, "/api/subscription", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_database_and_model() {
    let Some(app) = common::test_app().await else { return };

    let (status, body) = get(&app.router, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db"], "connected");
    assert_eq!(body["reasoningModel"], "test-model");
}
