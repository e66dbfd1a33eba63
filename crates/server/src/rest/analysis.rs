use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use shared_types::{AiAnalysisResponse, ApiResponse, AppError, UsageMetric};
use sqlx::{Pool, Postgres};

use crate::auth::extractors::VerifiedAdvocate;
use crate::db::AppState;
use crate::extract::parse_id;
use crate::{analysis, usage};

// GET /api/cases/{id}/analysis
#[utoipa::path(
    get,
    path = "/api/cases/{id}/analysis",
    params(("id" = String, Path, description = "Case UUID")),
    responses(
        (status = 200, description = "Current analysis of the case", body = AiAnalysisResponse),
        (status = 404, description = "Case or analysis not found", body = AppError)
    ),
    tag = "analysis",
    security(("bearer_auth" = []))
)]
pub async fn get_analysis(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<AiAnalysisResponse>, AppError> {
    let case_id = parse_id(&id, "case")?;
    Ok(ApiResponse::ok(
        analysis::get(&pool, auth.advocate_id, case_id).await?,
    ))
}

async fn queue(
    state: &AppState,
    auth: &VerifiedAdvocate,
    id: &str,
) -> Result<ApiResponse<AiAnalysisResponse>, AppError> {
    let case_id = parse_id(id, "case")?;
    usage::ensure_within_limit(&state.pool, auth.advocate_id, &[UsageMetric::AiAnalyses]).await?;
    let row = analysis::request(state, auth.advocate_id, case_id).await?;
    Ok(ApiResponse::ok(row))
}

// POST /api/cases/{id}/analysis
#[utoipa::path(
    post,
    path = "/api/cases/{id}/analysis",
    params(("id" = String, Path, description = "Case UUID")),
    responses(
        (status = 200, description = "Analysis queued", body = AiAnalysisResponse),
        (status = 400, description = "No document text to analyze", body = AppError),
        (status = 403, description = "Plan limit reached", body = AppError),
        (status = 404, description = "Case not found", body = AppError),
        (status = 409, description = "Analysis already in progress", body = AppError)
    ),
    tag = "analysis",
    security(("bearer_auth" = []))
)]
pub async fn request_analysis(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<AiAnalysisResponse>, AppError> {
    queue(&state, &auth, &id).await
}

/// Re-queue a finished or failed analysis. Same rules as a fresh request.
#[utoipa::path(
    post,
    path = "/api/cases/{id}/analysis/retry",
    params(("id" = String, Path, description = "Case UUID")),
    responses(
        (status = 200, description = "Analysis re-queued", body = AiAnalysisResponse),
        (status = 403, description = "Plan limit reached", body = AppError),
        (status = 404, description = "Case not found", body = AppError),
        (status = 409, description = "Analysis already in progress", body = AppError)
    ),
    tag = "analysis",
    security(("bearer_auth" = []))
)]
pub async fn retry_analysis(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<AiAnalysisResponse>, AppError> {
    queue(&state, &auth, &id).await
}

// DELETE /api/cases/{id}/analysis
#[utoipa::path(
    delete,
    path = "/api/cases/{id}/analysis",
    params(("id" = String, Path, description = "Case UUID")),
    responses(
        (status = 204, description = "Analysis removed"),
        (status = 404, description = "Case or analysis not found", body = AppError)
    ),
    tag = "analysis",
    security(("bearer_auth" = []))
)]
pub async fn delete_analysis(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let case_id = parse_id(&id, "case")?;
    analysis::delete(&pool, auth.advocate_id, case_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
