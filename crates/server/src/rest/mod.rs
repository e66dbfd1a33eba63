pub mod analysis;
pub mod auth;
pub mod case;
pub mod document;
pub mod history;
pub mod usage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::db::AppState;

/// Build the REST API router.
pub fn api_router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me).patch(auth::update_me))
        .route("/api/auth/verify/{user_id}", post(auth::verify_advocate))
        // Cases
        .route("/api/cases", get(case::list_cases).post(case::create_case))
        .route("/api/cases/stats", get(case::case_stats))
        .route("/api/cases/upcoming-hearings", get(case::upcoming_hearings))
        .route("/api/cases/sync", post(case::sync_case))
        .route(
            "/api/cases/{id}",
            get(case::get_case)
                .patch(case::update_case)
                .delete(case::delete_case),
        )
        .route("/api/cases/{id}/transfer", post(case::transfer_case))
        // History
        .route(
            "/api/cases/{id}/history",
            get(history::list_history).post(history::create_history),
        )
        // Documents
        .route(
            "/api/cases/{id}/documents",
            get(document::list_documents).post(document::initiate_upload),
        )
        .route(
            "/api/cases/{id}/documents/direct",
            post(document::direct_upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/cases/{id}/documents/stats", get(document::document_stats))
        .route(
            "/api/documents/{id}",
            get(document::get_document)
                .patch(document::update_document)
                .delete(document::delete_document),
        )
        .route("/api/documents/{id}/uploading", post(document::mark_uploading))
        .route("/api/documents/{id}/confirm", post(document::confirm_upload))
        .route("/api/documents/{id}/fail", post(document::fail_upload))
        .route("/api/documents/{id}/reinitiate", post(document::reinitiate_upload))
        .route("/api/documents/{id}/ocr/request", post(document::request_ocr))
        .route("/api/documents/{id}/ocr/start", post(document::start_ocr))
        .route("/api/documents/{id}/ocr/complete", post(document::complete_ocr))
        .route("/api/documents/{id}/ocr/fail", post(document::fail_ocr))
        .route("/api/documents/{id}/lock", post(document::lock_document))
        .route("/api/documents/{id}/unlock", post(document::unlock_document))
        .route("/api/documents/{id}/download", get(document::download_document))
        .route("/api/documents/{id}/chat", post(document::chat_with_document))
        // Analysis
        .route(
            "/api/cases/{id}/analysis",
            get(analysis::get_analysis)
                .post(analysis::request_analysis)
                .delete(analysis::delete_analysis),
        )
        .route("/api/cases/{id}/analysis/retry", post(analysis::retry_analysis))
        // Usage and subscription
        .route("/api/usage", get(usage::get_usage))
        .route("/api/subscription", get(usage::get_subscription))
        .route("/api/subscription/plan", put(usage::change_plan))
}
