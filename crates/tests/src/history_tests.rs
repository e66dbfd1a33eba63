use axum::http::StatusCode;
use serde_json::json;

use crate::common::{self, create_case, get, patch_json, post_json};

#[tokio::test]
async fn history_is_newest_first_and_moves_hearing_date() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let case_id = create_case(&app.router, &token, "KHC/WP/2024/701").await;
    patch_json(
        &app.router,
        &format!("/api/cases/{case_id}"),
        &json!({ "judgeName": "Justice M. Iyer", "courtNumber": "14" }),
        &token,
    )
    .await;

    let uri = format!("/api/cases/{case_id}/history");
    let (status, body) = post_json(
        &app.router,
        &uri,
        &json!({
            "eventType": "HEARING",
            "eventDate": "2024-05-02",
            "businessRecorded": "Notice issued to respondents",
            "nextHearingDate": "2024-06-14",
        }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    // Judge and court fall back to the case.
    assert_eq!(body["data"]["judgeName"], "Justice M. Iyer");
    assert_eq!(body["data"]["courtNumber"], "14");

    let (status, _) = post_json(
        &app.router,
        &uri,
        &json!({ "eventType": "ADJOURNMENT", "eventDate": "2024-06-14" }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = get(&app.router, &uri, Some(&token)).await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["eventType"], "ADJOURNMENT");
    assert_eq!(entries[1]["eventType"], "HEARING");

    let (_, case) = get(&app.router, &format!("/api/cases/{case_id}"), Some(&token)).await;
    assert_eq!(case["data"]["nextHearingDate"], "2024-06-14");
}

#[tokio::test]
async fn order_document_must_belong_to_case() {
    let Some(app) = common::test_app().await else { return };
    let (_, token) = common::verified_advocate(&app, "adv@example.in").await;
    let first = create_case(&app.router, &token, "KHC/WP/2024/702").await;
    let second = create_case(&app.router, &token, "KHC/WP/2024/703").await;
    let (doc_id, _) = common::initiate_upload(&app, &token, &second, "order.pdf").await;

    let (status, body) = post_json(
        &app.router,
        &format!("/api/cases/{first}/history"),
        &json!({ "eventType": "ORDER", "eventDate": "2024-05-02", "orderDocumentId": doc_id }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fieldErrors"].get("orderDocumentId").is_some());

    let (status, body) = post_json(
        &app.router,
        &format!("/api/cases/{second}/history"),
        &json!({ "eventType": "ORDER", "eventDate": "2024-05-02", "orderDocumentId": doc_id }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["orderDocumentId"], doc_id.as_str());
}

#[tokio::test]
async fn history_of_foreign_case_is_not_found() {
    let Some(app) = common::test_app().await else { return };
    let (_, owner) = common::verified_advocate(&app, "owner@example.in").await;
    let (_, other) = common::verified_advocate(&app, "other@example.in").await;
    let case_id = create_case(&app.router, &owner, "KHC/WP/2024/704").await;

    let uri = format!("/api/cases/{case_id}/history");
    let (status, _) = get(&app.router, &uri, Some(&other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(
        &app.router,
        &uri,
        &json!({ "eventType": "HEARING", "eventDate": "2024-05-02" }),
        Some(&other),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
