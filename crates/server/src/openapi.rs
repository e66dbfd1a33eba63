use axum::Router;
use shared_types::{
    // Envelope and errors
    AppError, AppErrorKind, ErrorEnvelope, SortOrder,
    // Auth
    AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, UpdateProfileRequest,
    UserResponse, UserRole,
    // Cases
    CaseDetailResponse, CaseResponse, CaseSortField, CaseStats, CaseStatus, CreateCaseRequest,
    MonthlyCount, PartyRole, SyncCaseRequest, TransferCaseRequest, UpdateCaseRequest,
    // History
    CaseHistoryResponse, CreateHistoryRequest, HistoryEventType,
    // Documents
    AiMetadata, CompleteOcrRequest, DocumentCategory, DocumentResponse, DocumentStats,
    DownloadUrlResponse, ExtractedEntities, FailRequest, InitiateUploadRequest,
    LockDocumentRequest, OcrStatus, StartOcrRequest, UpdateDocumentRequest, UploadSlotResponse,
    UploadStatus,
    // Analysis and chat
    AiAnalysisResponse, AnalysisPayload, AnalysisStatus, ChatRequest, ChatResponse, ChatRole,
    ChatTurn, DeadlineReminder, PrecedentCase, UrgencyLevel,
    // Billing
    BillingCycle, ChangePlanRequest, MetricUsage, Plan, SubscriptionResponse,
    SubscriptionStatus, UsageCounters, UsageMetric, UsageResponse,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::db::AppState;
use crate::health::{self, HealthResponse};
use crate::rest;

/// OpenAPI documentation for the API.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        // Auth
        rest::auth::register,
        rest::auth::login,
        rest::auth::refresh,
        rest::auth::logout,
        rest::auth::me,
        rest::auth::update_me,
        rest::auth::verify_advocate,
        // Cases
        rest::case::list_cases,
        rest::case::create_case,
        rest::case::case_stats,
        rest::case::upcoming_hearings,
        rest::case::sync_case,
        rest::case::get_case,
        rest::case::update_case,
        rest::case::delete_case,
        rest::case::transfer_case,
        // History
        rest::history::list_history,
        rest::history::create_history,
        // Documents
        rest::document::initiate_upload,
        rest::document::direct_upload,
        rest::document::list_documents,
        rest::document::document_stats,
        rest::document::get_document,
        rest::document::update_document,
        rest::document::delete_document,
        rest::document::mark_uploading,
        rest::document::confirm_upload,
        rest::document::fail_upload,
        rest::document::reinitiate_upload,
        rest::document::request_ocr,
        rest::document::start_ocr,
        rest::document::complete_ocr,
        rest::document::fail_ocr,
        rest::document::lock_document,
        rest::document::unlock_document,
        rest::document::download_document,
        rest::document::chat_with_document,
        // Analysis
        rest::analysis::get_analysis,
        rest::analysis::request_analysis,
        rest::analysis::retry_analysis,
        rest::analysis::delete_analysis,
        // Billing
        rest::usage::get_usage,
        rest::usage::get_subscription,
        rest::usage::change_plan,
    ),
    components(schemas(
        AppError, AppErrorKind, ErrorEnvelope, SortOrder, HealthResponse,
        AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, UpdateProfileRequest,
        UserResponse, UserRole,
        CaseDetailResponse, CaseResponse, CaseSortField, CaseStats, CaseStatus, CreateCaseRequest,
        MonthlyCount, PartyRole, SyncCaseRequest, TransferCaseRequest, UpdateCaseRequest,
        CaseHistoryResponse, CreateHistoryRequest, HistoryEventType,
        AiMetadata, CompleteOcrRequest, DocumentCategory, DocumentResponse, DocumentStats,
        DownloadUrlResponse, ExtractedEntities, FailRequest, InitiateUploadRequest,
        LockDocumentRequest, OcrStatus, StartOcrRequest, UpdateDocumentRequest,
        UploadSlotResponse, UploadStatus,
        AiAnalysisResponse, AnalysisPayload, AnalysisStatus, ChatRequest, ChatResponse, ChatRole,
        ChatTurn, DeadlineReminder, PrecedentCase, UrgencyLevel,
        BillingCycle, ChangePlanRequest, MetricUsage, Plan, SubscriptionResponse,
        SubscriptionStatus, UsageCounters, UsageMetric, UsageResponse,
    )),
    tags(
        (name = "auth", description = "Registration, login and token rotation"),
        (name = "cases", description = "Case management endpoints"),
        (name = "history", description = "Case timeline endpoints"),
        (name = "documents", description = "Document upload, OCR, locking and chat"),
        (name = "analysis", description = "AI case analysis endpoints"),
        (name = "billing", description = "Subscription and usage endpoints"),
        (name = "health", description = "Health check endpoint")
    ),
    info(
        title = "Advocase API",
        description = "Case management for High Court advocates",
        version = "1.0.0"
    )
)]
pub struct ApiDoc;

/// Build the full application router: REST API, `/health`, the API docs at
/// `/docs`, and the auth, tracing and request-id layers.
pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.uploads.max_upload_bytes;
    let telemetry = state.config.features.telemetry;

    let mut api = Router::new()
        .merge(rest::api_router(max_upload))
        .route("/health", axum::routing::get(health::health_check));

    // Inside the auth layer so spans see the caller's claims.
    if telemetry {
        api = api.layer(crate::telemetry::OtelTraceLayer);
    }

    api.layer(axum::middleware::from_fn_with_state(
        state.pool.clone(),
        crate::auth::middleware::auth_middleware,
    ))
    .with_state(state)
    .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
    .layer(TraceLayer::new_for_http())
    .layer(PropagateRequestIdLayer::x_request_id())
    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
