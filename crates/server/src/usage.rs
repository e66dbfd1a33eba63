//! Plan limits and usage reporting.
//!
//! Counting is advisory: handlers that create cases, documents or analyses
//! call [`ensure_within_limit`] first. The repositories never enforce it.

use chrono::Utc;
use shared_types::{billing_period, AppError, UsageMetric, UsageResponse};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::repo;

fn metric_label(metric: UsageMetric) -> &'static str {
    match metric {
        UsageMetric::Cases => "cases",
        UsageMetric::Documents => "documents",
        UsageMetric::Storage => "storage",
        UsageMetric::AiAnalyses => "AI analyses",
    }
}

/// Reject with 403 when the caller's plan has no room left for one more of
/// each of `metrics`.
pub async fn ensure_within_limit(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    metrics: &[UsageMetric],
) -> Result<(), AppError> {
    let demands: Vec<(UsageMetric, i64)> = metrics.iter().map(|&m| (m, 1)).collect();
    ensure_capacity(pool, advocate_id, &demands).await
}

/// Reject with 403 when adding `amount` to any metric would take the caller
/// past their plan limit. Storage demands are in bytes.
pub async fn ensure_capacity(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    demands: &[(UsageMetric, i64)],
) -> Result<(), AppError> {
    let plan = repo::subscription::get_or_create(pool, advocate_id).await?.plan();
    let counters =
        repo::subscription::compute_counters(pool, advocate_id, billing_period(Utc::now())).await?;

    for &(metric, amount) in demands {
        if counters.would_exceed(plan, metric, amount) {
            tracing::info!(
                %advocate_id,
                plan = plan.as_db_str(),
                metric = metric_label(metric),
                used = counters.used(metric),
                incoming = amount,
                "plan limit reached"
            );
            return Err(AppError::forbidden(format!(
                "Plan limit reached for {} on the {} plan",
                metric_label(metric),
                plan.as_db_str()
            )));
        }
    }
    Ok(())
}

/// Usage for the current billing period. The computed counters are also
/// written to `usage_tracking`.
pub async fn report(pool: &Pool<Postgres>, advocate_id: Uuid) -> Result<UsageResponse, AppError> {
    let plan = repo::subscription::get_or_create(pool, advocate_id).await?.plan();
    let period = billing_period(Utc::now());
    let counters = repo::subscription::compute_counters(pool, advocate_id, period).await?;
    repo::subscription::record_usage(pool, advocate_id, period, &counters).await?;
    Ok(UsageResponse::build(plan, period, counters))
}
