use axum::http::StatusCode;

use crate::common::{self, create_case, delete, get, post_empty, ANALYSIS_REPLY};

#[tokio::test]
async fn analysis_needs_extracted_text() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/901").await;
    common::initiate_upload(&app, &token, &case_id, "unscanned.pdf").await;

    let (status, body) =
        post_empty(&app.router, &format!("/api/cases/{case_id}/analysis"), &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fieldErrors"].get("documents").is_some());

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_analyses")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn worker_completes_queued_analysis() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/902").await;
    common::document_with_text(&app, &token, &case_id, "Tender notice dated 2 Feb 2024 was cancelled.")
        .await;
    let uri = format!("/api/cases/{case_id}/analysis");

    let (status, body) = post_empty(&app.router, &uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "PROCESSING");
    assert_eq!(body["data"]["modelVersion"], "test-model");
    assert_eq!(body["data"]["retryCount"], 0);

    // A second request while one is running is refused.
    let (status, _) = post_empty(&app.router, &uri, &token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The refused request holds no lock on the job row.
    let claimable: Option<uuid::Uuid> = sqlx::query_scalar(
        "SELECT id FROM ai_analyses WHERE case_id = $1::uuid FOR UPDATE SKIP LOCKED",
    )
    .bind(&case_id)
    .fetch_optional(&app.pool)
    .await
    .unwrap();
    assert!(claimable.is_some());

    app.reasoner.reply(ANALYSIS_REPLY);
    assert!(app.run_worker_once().await.is_some());
    assert!(app.run_worker_once().await.is_none());

    let (status, body) = get(&app.router, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let analysis = &body["data"];
    assert_eq!(analysis["status"], "COMPLETED");
    assert_eq!(analysis["urgencyLevel"], "HIGH");
    assert_eq!(analysis["caseSummary"], "Challenge to a tender cancellation.");
    assert_eq!(analysis["analysis"]["keyLegalIssues"][0], "Arbitrary cancellation of tender");
    assert!(analysis["processedAt"].is_string());
    assert!(analysis["tokenCount"].as_i64().unwrap() > 0);

    let prompts = app.reasoner.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].1.contains("Tender notice dated 2 Feb 2024 was cancelled."));

    let (_, detail) = get(&app.router, &format!("/api/cases/{case_id}"), Some(&token)).await;
    assert_eq!(detail["data"]["analysis"]["status"], "COMPLETED");
}

#[tokio::test]
async fn failed_analysis_can_be_retried() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/903").await;
    common::document_with_text(&app, &token, &case_id, "Order dated 1 April 2024.").await;
    let uri = format!("/api/cases/{case_id}/analysis");

    post_empty(&app.router, &uri, &token).await;
    app.reasoner.fail("connection refused");
    app.run_worker_once().await;

    let (_, body) = get(&app.router, &uri, Some(&token)).await;
    assert_eq!(body["data"]["status"], "FAILED");
    assert!(body["data"]["errorMessage"]
        .as_str()
        .unwrap()
        .contains("connection refused"));

    let (status, body) = post_empty(&app.router, &format!("{uri}/retry"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "PROCESSING");
    assert_eq!(body["data"]["retryCount"], 1);
    assert!(body["data"]["errorMessage"].is_null());

    app.reasoner.reply(ANALYSIS_REPLY);
    app.run_worker_once().await;
    let (_, body) = get(&app.router, &uri, Some(&token)).await;
    assert_eq!(body["data"]["status"], "COMPLETED");
}

#[tokio::test]
async fn unparseable_reply_fails_the_job() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/904").await;
    common::document_with_text(&app, &token, &case_id, "Some pleading.").await;
    let uri = format!("/api/cases/{case_id}/analysis");

    post_empty(&app.router, &uri, &token).await;
    app.reasoner.reply("I am unable to analyse this case.");
    app.run_worker_once().await;

    let (_, body) = get(&app.router, &uri, Some(&token)).await;
    assert_eq!(body["data"]["status"], "FAILED");
    assert!(body["data"]["errorMessage"]
        .as_str()
        .unwrap()
        .starts_with("Invalid analysis reply"));
    assert!(body["data"]["analysis"].is_null());
}

#[tokio::test]
async fn deleting_analysis_resets_it() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/905").await;
    common::document_with_text(&app, &token, &case_id, "Counter affidavit.").await;
    let uri = format!("/api/cases/{case_id}/analysis");

    let (status, _) = get(&app.router, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    post_empty(&app.router, &uri, &token).await;
    let (status, _) = delete(&app.router, &uri, &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&app.router, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = delete(&app.router, &uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = post_empty(&app.router, &uri, &token).await;
    assert_eq!(body["data"]["retryCount"], 0);

    // Both requests count toward the period's usage.
    let (_, usage) = common::get(&app.router, "/api/usage", Some(&token)).await;
    assert_eq!(usage["data"]["counters"]["aiAnalysesUsed"], 2);
}

#[tokio::test]
async fn analysis_of_foreign_case_is_not_found() {
    let Some(app) = common::test_app().await else { return };
    let (_, owner) = common::verified_advocate(&app, "owner@example.in").await;
    let (_, other) = common::verified_advocate(&app, "other@example.in").await;
    let case_id = create_case(&app.router, &owner, "KHC/WP/2024/906").await;
    common::document_with_text(&app, &owner, &case_id, "Writ petition text.").await;

    let (status, _) =
        post_empty(&app.router, &format!("/api/cases/{case_id}/analysis"), &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
