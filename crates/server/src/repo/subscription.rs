use chrono::{DateTime, Months, Utc};
use shared_types::{
    billing_period, AppError, BillingCycle, Plan, Subscription, SubscriptionStatus,
    UsageCounters, SUBSCRIPTION_COLUMNS,
};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

/// The advocate's subscription, creating a FREE one if none exists yet.
pub async fn get_or_create(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
) -> Result<Subscription, AppError> {
    let (_, period_end) = billing_period(Utc::now());
    sqlx::query(
        "INSERT INTO subscriptions (advocate_id, plan, end_date) VALUES ($1, $2, $3)
         ON CONFLICT (advocate_id) DO NOTHING",
    )
    .bind(advocate_id)
    .bind(Plan::Free.as_db_str())
    .bind(period_end)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE advocate_id = $1"
    ))
    .bind(advocate_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Switch plan and billing cycle. The new term starts now.
pub async fn change_plan(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    plan: Plan,
    cycle: BillingCycle,
) -> Result<Subscription, AppError> {
    let start = Utc::now();
    let end = start
        .checked_add_months(Months::new(cycle.months()))
        .ok_or_else(|| AppError::internal("Subscription end date out of range"))?;

    sqlx::query_as::<_, Subscription>(&format!(
        "INSERT INTO subscriptions
            (advocate_id, plan, status, billing_cycle, amount, start_date, end_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (advocate_id) DO UPDATE SET
            plan = EXCLUDED.plan,
            status = EXCLUDED.status,
            billing_cycle = EXCLUDED.billing_cycle,
            amount = EXCLUDED.amount,
            start_date = EXCLUDED.start_date,
            end_date = EXCLUDED.end_date,
            updated_at = NOW()
         RETURNING {SUBSCRIPTION_COLUMNS}"
    ))
    .bind(advocate_id)
    .bind(plan.as_db_str())
    .bind(SubscriptionStatus::Active.as_db_str())
    .bind(cycle.as_db_str())
    .bind(plan.price_paise(cycle))
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Live counters: visible cases, their documents and stored bytes, and the
/// analyses requested within `[period_start, period_end)`.
pub async fn compute_counters(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    period: (DateTime<Utc>, DateTime<Utc>),
) -> Result<UsageCounters, AppError> {
    sqlx::query_as::<_, UsageCounters>(
        "SELECT
            (SELECT COUNT(*) FROM cases
              WHERE advocate_id = $1 AND is_visible) AS cases_count,
            (SELECT COUNT(*) FROM documents d JOIN cases c ON c.id = d.case_id
              WHERE c.advocate_id = $1 AND c.is_visible) AS documents_count,
            (SELECT COALESCE(SUM(d.file_size), 0)::BIGINT FROM documents d
              JOIN cases c ON c.id = d.case_id
              WHERE c.advocate_id = $1 AND c.is_visible) AS storage_used_bytes,
            (SELECT COUNT(*) FROM analysis_requests
              WHERE advocate_id = $1 AND requested_at >= $2 AND requested_at < $3)
              AS ai_analyses_used",
    )
    .bind(advocate_id)
    .bind(period.0)
    .bind(period.1)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Persist the counters for the period, replacing any earlier snapshot.
pub async fn record_usage(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    period: (DateTime<Utc>, DateTime<Utc>),
    counters: &UsageCounters,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO usage_tracking
            (advocate_id, period_start, period_end, cases_count, documents_count,
             storage_used_bytes, ai_analyses_used)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (advocate_id, period_start) DO UPDATE SET
            period_end = EXCLUDED.period_end,
            cases_count = EXCLUDED.cases_count,
            documents_count = EXCLUDED.documents_count,
            storage_used_bytes = EXCLUDED.storage_used_bytes,
            ai_analyses_used = EXCLUDED.ai_analyses_used,
            updated_at = NOW()",
    )
    .bind(advocate_id)
    .bind(period.0)
    .bind(period.1)
    .bind(counters.cases_count)
    .bind(counters.documents_count)
    .bind(counters.storage_used_bytes)
    .bind(counters.ai_analyses_used)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}
