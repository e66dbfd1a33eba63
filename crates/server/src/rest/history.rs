use axum::extract::{Path, State};
use shared_types::{ApiResponse, AppError, CaseHistoryResponse, CreateHistoryRequest};
use sqlx::{Pool, Postgres};

use crate::auth::extractors::VerifiedAdvocate;
use crate::extract::{parse_id, ApiJson};
use crate::repo;

// GET /api/cases/{id}/history
#[utoipa::path(
    get,
    path = "/api/cases/{id}/history",
    params(("id" = String, Path, description = "Case UUID")),
    responses(
        (status = 200, description = "Timeline, newest first", body = Vec<CaseHistoryResponse>),
        (status = 404, description = "Case not found", body = AppError)
    ),
    tag = "history",
    security(("bearer_auth" = []))
)]
pub async fn list_history(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<CaseHistoryResponse>>, AppError> {
    let case_id = parse_id(&id, "case")?;
    repo::case::find_owned(&pool, auth.advocate_id, case_id)
        .await?
        .ok_or_else(|| AppError::not_found("Case not found"))?;

    let entries = repo::history::list_for_case(&pool, case_id).await?;
    Ok(ApiResponse::ok(
        entries.into_iter().map(CaseHistoryResponse::from).collect(),
    ))
}

// POST /api/cases/{id}/history
#[utoipa::path(
    post,
    path = "/api/cases/{id}/history",
    params(("id" = String, Path, description = "Case UUID")),
    request_body = CreateHistoryRequest,
    responses(
        (status = 201, description = "Event recorded", body = CaseHistoryResponse),
        (status = 400, description = "Order document belongs to another case", body = AppError),
        (status = 404, description = "Case not found", body = AppError)
    ),
    tag = "history",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, auth, body), fields(advocate_id = %auth.advocate_id))]
pub async fn create_history(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CreateHistoryRequest>,
) -> Result<ApiResponse<CaseHistoryResponse>, AppError> {
    let case_id = parse_id(&id, "case")?;
    let entry = repo::history::record(&pool, auth.advocate_id, case_id, &body).await?;
    tracing::info!(%case_id, event = entry.event_type.as_str(), "history recorded");
    Ok(ApiResponse::created(CaseHistoryResponse::from(entry)))
}
