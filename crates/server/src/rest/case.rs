use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use shared_types::{
    ApiResponse, AppError, CaseDetailResponse, CaseHistoryResponse, CaseListParams,
    CaseResponse, CaseStats, CreateCaseRequest, DocumentListParams, DocumentResponse, Page,
    SyncCaseRequest, TransferCaseRequest, UpcomingHearingsParams, UpdateCaseRequest,
    UsageMetric,
};
use sqlx::{Pool, Postgres};

use crate::auth::extractors::VerifiedAdvocate;
use crate::db::AppState;
use crate::error_convert::ValidateRequest;
use crate::extract::{parse_id, ApiJson, ApiQuery};
use crate::{analysis, repo, usage};

const DEFAULT_UPCOMING_DAYS: i64 = 7;
const MAX_UPCOMING_DAYS: i64 = 90;

// GET /api/cases
#[utoipa::path(
    get,
    path = "/api/cases",
    params(CaseListParams),
    responses(
        (status = 200, description = "Page of visible cases", body = Page<CaseResponse>),
        (status = 400, description = "Invalid filter", body = AppError)
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
pub async fn list_cases(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    ApiQuery(params): ApiQuery<CaseListParams>,
) -> Result<ApiResponse<Page<CaseResponse>>, AppError> {
    let page = repo::case::list(&pool, auth.advocate_id, &params).await?;
    Ok(ApiResponse::ok(page.map(CaseResponse::from)))
}

// POST /api/cases
#[utoipa::path(
    post,
    path = "/api/cases",
    request_body = CreateCaseRequest,
    responses(
        (status = 201, description = "Case created", body = CaseResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Plan limit reached", body = AppError),
        (status = 409, description = "Duplicate e-filing number", body = AppError)
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, auth, body), fields(advocate_id = %auth.advocate_id))]
pub async fn create_case(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    ApiJson(body): ApiJson<CreateCaseRequest>,
) -> Result<ApiResponse<CaseResponse>, AppError> {
    body.validate_request()?;
    usage::ensure_within_limit(&pool, auth.advocate_id, &[UsageMetric::Cases]).await?;

    let case = repo::case::create(&pool, auth.advocate_id, &body).await?;
    tracing::info!(case_id = %case.id, "case created");
    Ok(ApiResponse::created(CaseResponse::from(case)))
}

// GET /api/cases/stats
#[utoipa::path(
    get,
    path = "/api/cases/stats",
    responses((status = 200, description = "Dashboard counters", body = CaseStats)),
    tag = "cases",
    security(("bearer_auth" = []))
)]
pub async fn case_stats(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
) -> Result<ApiResponse<CaseStats>, AppError> {
    let stats = repo::case::stats(&pool, auth.advocate_id).await?;
    Ok(ApiResponse::ok(stats))
}

// GET /api/cases/upcoming-hearings
#[utoipa::path(
    get,
    path = "/api/cases/upcoming-hearings",
    params(UpcomingHearingsParams),
    responses(
        (status = 200, description = "Cases with a hearing in the window", body = Vec<CaseResponse>),
        (status = 400, description = "Window out of range", body = AppError)
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
pub async fn upcoming_hearings(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    ApiQuery(params): ApiQuery<UpcomingHearingsParams>,
) -> Result<ApiResponse<Vec<CaseResponse>>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    if !(1..=MAX_UPCOMING_DAYS).contains(&days) {
        return Err(AppError::invalid_field(
            "days",
            format!("Days must be between 1 and {MAX_UPCOMING_DAYS}"),
        ));
    }

    let cases = repo::case::upcoming_hearings(&pool, auth.advocate_id, days).await?;
    Ok(ApiResponse::ok(
        cases.into_iter().map(CaseResponse::from).collect(),
    ))
}

// POST /api/cases/sync
#[utoipa::path(
    post,
    path = "/api/cases/sync",
    request_body = SyncCaseRequest,
    responses(
        (status = 200, description = "Case inserted or refreshed", body = CaseResponse),
        (status = 400, description = "Validation error", body = AppError)
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, auth, body), fields(advocate_id = %auth.advocate_id))]
pub async fn sync_case(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    ApiJson(body): ApiJson<SyncCaseRequest>,
) -> Result<ApiResponse<CaseResponse>, AppError> {
    body.validate_request()?;
    let case = repo::case::upsert_synced(&pool, auth.advocate_id, &body).await?;
    tracing::info!(case_id = %case.id, efiling_number = %case.efiling_number, "case synced");
    Ok(ApiResponse::ok(CaseResponse::from(case)))
}

// GET /api/cases/{id}
#[utoipa::path(
    get,
    path = "/api/cases/{id}",
    params(("id" = String, Path, description = "Case UUID")),
    responses(
        (status = 200, description = "Case with documents, history and analysis", body = CaseDetailResponse),
        (status = 404, description = "Case not found", body = AppError)
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
pub async fn get_case(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<CaseDetailResponse>, AppError> {
    let case_id = parse_id(&id, "case")?;
    let case = repo::case::find_owned(&pool, auth.advocate_id, case_id)
        .await?
        .ok_or_else(|| AppError::not_found("Case not found"))?;

    let documents = repo::document::list_for_case(&pool, case_id, &DocumentListParams::default())
        .await?
        .into_iter()
        .map(DocumentResponse::from)
        .collect();
    let history = repo::history::list_for_case(&pool, case_id)
        .await?
        .into_iter()
        .map(CaseHistoryResponse::from)
        .collect();
    let analysis = analysis::find_for_case(&pool, case_id).await?;

    Ok(ApiResponse::ok(CaseDetailResponse {
        case: CaseResponse::from(case),
        documents,
        history,
        analysis,
    }))
}

// PATCH /api/cases/{id}
#[utoipa::path(
    patch,
    path = "/api/cases/{id}",
    params(("id" = String, Path, description = "Case UUID")),
    request_body = UpdateCaseRequest,
    responses(
        (status = 200, description = "Case updated", body = CaseResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 404, description = "Case not found", body = AppError),
        (status = 409, description = "Status change not allowed", body = AppError)
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth, body), fields(advocate_id = %auth.advocate_id))]
pub async fn update_case(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCaseRequest>,
) -> Result<ApiResponse<CaseResponse>, AppError> {
    let case_id = parse_id(&id, "case")?;
    body.validate_request()?;

    let strict = state.config.features.strict_case_transitions;
    let case = repo::case::update(&state.pool, auth.advocate_id, case_id, &body, strict).await?;
    Ok(ApiResponse::ok(CaseResponse::from(case)))
}

// DELETE /api/cases/{id}
#[utoipa::path(
    delete,
    path = "/api/cases/{id}",
    params(("id" = String, Path, description = "Case UUID")),
    responses(
        (status = 204, description = "Case hidden"),
        (status = 404, description = "Case not found", body = AppError)
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, auth), fields(advocate_id = %auth.advocate_id))]
pub async fn delete_case(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let case_id = parse_id(&id, "case")?;
    if !repo::case::soft_delete(&pool, auth.advocate_id, case_id).await? {
        return Err(AppError::not_found("Case not found"));
    }
    tracing::info!(%case_id, "case hidden");
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/cases/{id}/transfer
#[utoipa::path(
    post,
    path = "/api/cases/{id}/transfer",
    params(("id" = String, Path, description = "Case UUID")),
    request_body = TransferCaseRequest,
    responses(
        (status = 200, description = "Transfer recorded", body = CaseResponse),
        (status = 400, description = "Reason missing", body = AppError),
        (status = 404, description = "Case not found", body = AppError)
    ),
    tag = "cases",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, auth, body), fields(advocate_id = %auth.advocate_id))]
pub async fn transfer_case(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<TransferCaseRequest>,
) -> Result<ApiResponse<CaseResponse>, AppError> {
    let case_id = parse_id(&id, "case")?;
    body.validate_request()?;

    let case = repo::case::transfer(&pool, auth.advocate_id, case_id, body.reason.trim())
        .await?
        .ok_or_else(|| AppError::not_found("Case not found"))?;
    Ok(ApiResponse::ok(CaseResponse::from(case)))
}
