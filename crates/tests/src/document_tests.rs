use axum::http::StatusCode;
use serde_json::json;

use crate::common::{self, create_case, delete, get, patch_json, post_empty, post_json, post_multipart};

#[tokio::test]
async fn initiate_returns_presigned_slot() {
    let Some(app) = common::test_app().await else { return };
    let (user_id, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/801").await;

    let (status, body) = post_json(
        &app.router,
        &format!("/api/cases/{case_id}/documents"),
        &json!({ "fileName": "Writ Petition.pdf", "fileSize": 2048, "category": "CASE_FILE" }),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let slot = &body["data"];
    assert_eq!(slot["document"]["uploadStatus"], "PENDING");
    assert_eq!(slot["document"]["title"], "Writ Petition.pdf");
    assert_eq!(slot["document"]["contentType"], "application/pdf");
    assert_eq!(slot["requiredHeaders"]["Content-Type"], "application/pdf");
    assert_eq!(slot["expiresInSecs"], 900);

    let url = slot["uploadUrl"].as_str().unwrap();
    assert!(url.starts_with(&format!("https://storage.test/{user_id}/cases/{case_id}/")));
}

#[tokio::test]
async fn upload_lifecycle_completes_with_stored_size() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/802").await;
    let (doc_id, key) = common::initiate_upload(&app, &token, &case_id, "annexure.pdf").await;

    let (status, body) =
        post_empty(&app.router, &format!("/api/documents/{doc_id}/uploading"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["uploadStatus"], "UPLOADING");

    app.store.insert(&key, &[7u8; 300]);
    let (status, body) =
        post_empty(&app.router, &format!("/api/documents/{doc_id}/confirm"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["uploadStatus"], "COMPLETED");
    assert_eq!(body["data"]["fileSize"], 300);
    assert!(body["data"]["uploadedAt"].is_string());

    // COMPLETED is terminal.
    let (status, _) =
        post_empty(&app.router, &format!("/api/documents/{doc_id}/uploading"), &token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) =
        get(&app.router, &format!("/api/documents/{doc_id}/download"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["url"].as_str().unwrap().ends_with("signature=get"));
}

#[tokio::test]
async fn confirm_without_object_marks_failed() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/803").await;
    let (doc_id, _) = common::initiate_upload(&app, &token, &case_id, "lost.pdf").await;

    let (status, body) =
        post_empty(&app.router, &format!("/api/documents/{doc_id}/confirm"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["uploadStatus"], "FAILED");
    assert_eq!(body["data"]["uploadError"], "Object not found in storage");

    let (status, _) =
        get(&app.router, &format!("/api/documents/{doc_id}/download"), Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // FAILED uploads can be retried with a fresh key.
    let (status, body) =
        post_empty(&app.router, &format!("/api/documents/{doc_id}/reinitiate"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["document"]["uploadStatus"], "PENDING");
    assert!(body["data"]["document"]["uploadError"].is_null());
    assert!(body["data"]["uploadUrl"].as_str().unwrap().contains("/lost.pdf"));
}

#[tokio::test]
async fn client_reported_failure_requires_message() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/804").await;
    let (doc_id, _) = common::initiate_upload(&app, &token, &case_id, "a.pdf").await;
    let uri = format!("/api/documents/{doc_id}/fail");

    let (status, _) = post_json(&app.router, &uri, &json!({ "error": "" }), Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        post_json(&app.router, &uri, &json!({ "error": "network reset" }), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["uploadStatus"], "FAILED");
    assert_eq!(body["data"]["uploadError"], "network reset");
}

#[tokio::test]
async fn direct_upload_stores_bytes() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/805").await;

    let (status, body) = post_multipart(
        &app.router,
        &format!("/api/cases/{case_id}/documents/direct"),
        &[
            ("file", Some("order-12-04.pdf"), "%PDF-1.7 order"),
            ("category", None, "ORDER"),
            ("isOcrRequired", None, "true"),
        ],
        &token,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    let doc = &body["data"];
    assert_eq!(doc["uploadStatus"], "COMPLETED");
    assert_eq!(doc["category"], "ORDER");
    assert_eq!(doc["title"], "order-12-04.pdf");
    assert_eq!(doc["isOcrRequired"], true);
    assert_eq!(doc["fileSize"], 14);

    let key: String = sqlx::query_scalar("SELECT s3_key FROM documents WHERE id = $1::uuid")
        .bind(doc["id"].as_str().unwrap())
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert!(app.store.contains(&key));
}

#[tokio::test]
async fn direct_upload_rejects_missing_file_and_bad_category() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/806").await;
    let uri = format!("/api/cases/{case_id}/documents/direct");

    let (status, body) = post_multipart(&app.router, &uri, &[("title", None, "x")], &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fieldErrors"].get("file").is_some());

    let (status, body) = post_multipart(
        &app.router,
        &uri,
        &[("category", None, "AFFIDAVIT"), ("file", Some("a.pdf"), "%PDF")],
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fieldErrors"].get("category").is_some());
}

#[tokio::test]
async fn direct_upload_storage_failure_marks_document_failed() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/807").await;
    app.store.fail_puts();

    let (status, body) = post_multipart(
        &app.router,
        &format!("/api/cases/{case_id}/documents/direct"),
        &[("file", Some("a.pdf"), "%PDF")],
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["kind"], "ExternalService");

    let status: String = sqlx::query_scalar("SELECT upload_status FROM documents")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(status, "FAILED");
}

#[tokio::test]
async fn ocr_state_machine() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/808").await;
    let (doc_id, _) = common::initiate_upload(&app, &token, &case_id, "scan.pdf").await;
    let base = format!("/api/documents/{doc_id}/ocr");

    // Cannot start before it is requested.
    let (status, _) = post_json(&app.router, &format!("{base}/start"), &json!({}), Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = post_empty(&app.router, &format!("{base}/request"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ocrStatus"], "PENDING");
    assert_eq!(body["data"]["isOcrRequired"], true);

    let (status, body) = post_json(
        &app.router,
        &format!("{base}/start"),
        &json!({ "jobId": "textract-42" }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ocrJobId"], "textract-42");

    let (status, body) = post_json(
        &app.router,
        &format!("{base}/fail"),
        &json!({ "error": "page 3 unreadable" }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ocrStatus"], "FAILED");

    // FAILED may go straight back to PROCESSING.
    let (status, _) = post_json(&app.router, &format!("{base}/start"), &json!({}), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(
        &app.router,
        &format!("{base}/complete"),
        &json!({ "extractedText": "IN THE HIGH COURT", "confidence": 1.5 }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &app.router,
        &format!("{base}/complete"),
        &json!({ "extractedText": "IN THE HIGH COURT", "confidence": 0.88 }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ocrStatus"], "COMPLETED");
    assert!(body["data"]["ocrError"].is_null());
    assert_eq!(body["data"]["extractedText"], "IN THE HIGH COURT");
    assert_eq!(body["data"]["classificationConfidence"], 0.88);
}

#[tokio::test]
async fn locked_document_refuses_changes() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/809").await;
    let (doc_id, _) = common::initiate_upload(&app, &token, &case_id, "final.pdf").await;
    let uri = format!("/api/documents/{doc_id}");

    let (status, body) = post_json(
        &app.router,
        &format!("{uri}/lock"),
        &json!({ "reason": "Filed copy" }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLocked"], true);
    assert_eq!(body["data"]["lockReason"], "Filed copy");

    let (status, _) = post_json(&app.router, &format!("{uri}/lock"), &json!({}), Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = patch_json(&app.router, &uri, &json!({ "title": "Renamed" }), &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Document is locked: Filed copy");

    let (status, _) = delete(&app.router, &uri, &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post_empty(&app.router, &format!("{uri}/unlock"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLocked"], false);
    assert!(body["data"]["lockReason"].is_null());

    let (status, _) = post_empty(&app.router, &format!("{uri}/unlock"), &token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = patch_json(&app.router, &uri, &json!({ "title": "Renamed" }), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Renamed");
}

#[tokio::test]
async fn delete_removes_row_and_object() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/810").await;
    let (doc_id, key) = common::initiate_upload(&app, &token, &case_id, "tmp.pdf").await;
    app.store.insert(&key, b"%PDF");

    let (status, _) = delete(&app.router, &format!("/api/documents/{doc_id}"), &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!app.store.contains(&key));

    let (status, _) = get(&app.router, &format!("/api/documents/{doc_id}"), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn documents_are_private_to_their_advocate() {
    let Some(app) = common::test_app().await else { return };
    let (_, owner) = common::verified_advocate(&app, "owner@example.in").await;
    let (_, other) = common::verified_advocate(&app, "other@example.in").await;
    let case_id = create_case(&app.router, &owner, "KHC/WP/2024/811").await;
    let (doc_id, _) = common::initiate_upload(&app, &owner, &case_id, "brief.pdf").await;

    let (status, _) = get(&app.router, &format!("/api/documents/{doc_id}"), Some(&other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        get(&app.router, &format!("/api/cases/{case_id}/documents"), Some(&other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_filters_and_stats() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/812").await;
    let (_, key) = common::initiate_upload(&app, &token, &case_id, "one.pdf").await;
    common::initiate_upload(&app, &token, &case_id, "two.pdf").await;
    let first_id: uuid::Uuid = sqlx::query_scalar("SELECT id FROM documents WHERE s3_key = $1")
        .bind(&key)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    app.store.insert(&key, &[1u8; 100]);
    post_empty(&app.router, &format!("/api/documents/{first_id}/confirm"), &token).await;

    let base = format!("/api/cases/{case_id}/documents");
    let (status, body) = get(&app.router, &base, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = get(&app.router, &format!("{base}?uploadStatus=COMPLETED"), Some(&token)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = get(&app.router, &format!("{base}/stats"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["byUploadStatus"]["COMPLETED"], 1);
    assert_eq!(stats["byUploadStatus"]["PENDING"], 1);
    assert_eq!(stats["byCategory"]["CASE_FILE"], 2);
    assert_eq!(stats["locked"], 0);
}

#[tokio::test]
async fn chat_answers_from_extracted_text() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/813").await;
    let doc_id =
        common::document_with_text(&app, &token, &case_id, "The tender was cancelled on 4 March.").await;

    app.reasoner.reply("It was cancelled on 4 March.");
    let (status, body) = post_json(
        &app.router,
        &format!("/api/documents/{doc_id}/chat"),
        &json!({ "message": "When was the tender cancelled?" }),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["response"], "It was cancelled on 4 March.");
    assert_eq!(body["data"]["model"], "test-model");
    assert_eq!(body["data"]["documentTitle"], "petition.pdf");
    assert!(body["data"]["tokenCount"].as_i64().unwrap() > 0);

    let prompts = app.reasoner.prompts();
    assert!(prompts[0].1.contains("The tender was cancelled on 4 March."));
    assert!(prompts[0].0.contains("When was the tender cancelled?"));
}

#[tokio::test]
async fn chat_without_text_is_rejected() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/814").await;
    let (doc_id, _) = common::initiate_upload(&app, &token, &case_id, "blank.pdf").await;

    let (status, body) = post_json(
        &app.router,
        &format!("/api/documents/{doc_id}/chat"),
        &json!({ "message": "Summarise" }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fieldErrors"].get("documentId").is_some());
    assert!(app.reasoner.prompts().is_empty());
}
