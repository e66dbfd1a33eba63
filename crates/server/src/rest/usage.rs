use axum::extract::State;
use shared_types::{
    ApiResponse, AppError, ChangePlanRequest, SubscriptionResponse, UsageResponse,
};
use sqlx::{Pool, Postgres};

use crate::auth::extractors::AuthRequired;
use crate::extract::ApiJson;
use crate::{repo, usage};

// GET /api/usage
#[utoipa::path(
    get,
    path = "/api/usage",
    responses(
        (status = 200, description = "Usage against plan limits for the current period", body = UsageResponse),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "billing",
    security(("bearer_auth" = []))
)]
pub async fn get_usage(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
) -> Result<ApiResponse<UsageResponse>, AppError> {
    Ok(ApiResponse::ok(usage::report(&pool, auth.user_id).await?))
}

// GET /api/subscription
#[utoipa::path(
    get,
    path = "/api/subscription",
    responses(
        (status = 200, description = "Current subscription", body = SubscriptionResponse),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "billing",
    security(("bearer_auth" = []))
)]
pub async fn get_subscription(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
) -> Result<ApiResponse<SubscriptionResponse>, AppError> {
    let sub = repo::subscription::get_or_create(&pool, auth.user_id).await?;
    Ok(ApiResponse::ok(SubscriptionResponse::from(sub)))
}

/// Switch plan. No payment is taken; the new term starts immediately.
#[utoipa::path(
    put,
    path = "/api/subscription/plan",
    request_body = ChangePlanRequest,
    responses(
        (status = 200, description = "Plan changed", body = SubscriptionResponse),
        (status = 400, description = "Unknown plan or cycle", body = AppError)
    ),
    tag = "billing",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, auth, body), fields(user_id = %auth.user_id))]
pub async fn change_plan(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    ApiJson(body): ApiJson<ChangePlanRequest>,
) -> Result<ApiResponse<SubscriptionResponse>, AppError> {
    let sub =
        repo::subscription::change_plan(&pool, auth.user_id, body.plan, body.billing_cycle).await?;
    tracing::info!(plan = body.plan.as_db_str(), cycle = body.billing_cycle.as_db_str(), "plan changed");
    Ok(ApiResponse::ok(SubscriptionResponse::from(sub)))
}
