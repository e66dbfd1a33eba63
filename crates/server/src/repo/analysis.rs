use shared_types::{AiAnalysis, AnalysisPayload, AppError, ANALYSIS_COLUMNS};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

pub const LEASE_EXPIRED_MESSAGE: &str = "analysis worker lease expired";

/// Start (or restart) the analysis of a case.
///
/// Inserts a PROCESSING row, or flips a COMPLETED/FAILED row back to
/// PROCESSING with `retry_count + 1`. A row that is already PROCESSING is
/// left untouched and `None` is returned. Every accepted request is also
/// logged for usage metering.
pub async fn request(
    conn: &mut PgConnection,
    case_id: Uuid,
    advocate_id: Uuid,
    model_version: &str,
) -> Result<Option<AiAnalysis>, AppError> {
    let row = sqlx::query_as::<_, AiAnalysis>(&format!(
        "INSERT INTO ai_analyses (case_id, advocate_id, status, model_version)
         VALUES ($1, $2, 'PROCESSING', $3)
         ON CONFLICT (case_id) DO UPDATE SET
            status = 'PROCESSING',
            retry_count = ai_analyses.retry_count + 1,
            error_message = NULL,
            model_version = EXCLUDED.model_version,
            lease_owner = NULL,
            lease_expires_at = NULL,
            attempts = 0,
            updated_at = NOW()
         WHERE ai_analyses.status <> 'PROCESSING'
         RETURNING {ANALYSIS_COLUMNS}"
    ))
    .bind(case_id)
    .bind(advocate_id)
    .bind(model_version)
    .fetch_optional(&mut *conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    if row.is_some() {
        sqlx::query("INSERT INTO analysis_requests (advocate_id, case_id) VALUES ($1, $2)")
            .bind(advocate_id)
            .bind(case_id)
            .execute(&mut *conn)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;
    }

    Ok(row)
}

pub async fn find_for_case(
    pool: &Pool<Postgres>,
    case_id: Uuid,
) -> Result<Option<AiAnalysis>, AppError> {
    sqlx::query_as::<_, AiAnalysis>(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM ai_analyses WHERE case_id = $1"
    ))
    .bind(case_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<AiAnalysis>, AppError> {
    sqlx::query_as::<_, AiAnalysis>(&format!(
        "SELECT {ANALYSIS_COLUMNS} FROM ai_analyses WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Remove the analysis of a case. Returns true if a row was deleted.
pub async fn delete_for_case(pool: &Pool<Postgres>, case_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM ai_analyses WHERE case_id = $1")
        .bind(case_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected() > 0)
}

// ── Worker side ─────────────────────────────────────────────────────

/// Fail jobs whose lease ran out after `max_attempts` claims.
pub async fn fail_exhausted(pool: &Pool<Postgres>, max_attempts: i32) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE ai_analyses
         SET status = 'FAILED', error_message = $2,
             lease_owner = NULL, lease_expires_at = NULL, updated_at = NOW()
         WHERE status = 'PROCESSING'
           AND lease_expires_at IS NOT NULL AND lease_expires_at < NOW()
           AND attempts >= $1",
    )
    .bind(max_attempts)
    .bind(LEASE_EXPIRED_MESSAGE)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected())
}

/// Lease the oldest PROCESSING job that nobody holds a live lease on.
pub async fn claim_next(
    pool: &Pool<Postgres>,
    owner: &str,
    lease_secs: u64,
) -> Result<Option<AiAnalysis>, AppError> {
    sqlx::query_as::<_, AiAnalysis>(&format!(
        "UPDATE ai_analyses
         SET lease_owner = $1,
             lease_expires_at = NOW() + make_interval(secs => $2),
             attempts = attempts + 1
         WHERE id = (
             SELECT id FROM ai_analyses
             WHERE status = 'PROCESSING'
               AND (lease_expires_at IS NULL OR lease_expires_at < NOW())
             ORDER BY updated_at
             FOR UPDATE SKIP LOCKED
             LIMIT 1
         )
         RETURNING {ANALYSIS_COLUMNS}"
    ))
    .bind(owner)
    .bind(lease_secs as f64)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub struct CompletedAnalysis<'a> {
    pub payload: &'a AnalysisPayload,
    pub model_version: &'a str,
    pub processing_time_seconds: i32,
    pub token_count: i32,
}

/// Store a successful result. Only the current lease holder can write;
/// returns false when the lease was lost.
pub async fn complete(
    pool: &Pool<Postgres>,
    id: Uuid,
    owner: &str,
    done: CompletedAnalysis<'_>,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE ai_analyses
         SET status = 'COMPLETED', analysis = $3, urgency_level = $4, case_summary = $5,
             model_version = $6, processing_time_seconds = $7, token_count = $8,
             processed_at = NOW(), error_message = NULL,
             lease_owner = NULL, lease_expires_at = NULL, updated_at = NOW()
         WHERE id = $1 AND status = 'PROCESSING' AND lease_owner = $2",
    )
    .bind(id)
    .bind(owner)
    .bind(done.payload.to_stored())
    .bind(done.payload.urgency_level.as_db_str())
    .bind(&done.payload.case_summary)
    .bind(done.model_version)
    .bind(done.processing_time_seconds)
    .bind(done.token_count)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected() > 0)
}

/// Record a failure for the lease holder. Returns false when the lease was lost.
pub async fn fail(
    pool: &Pool<Postgres>,
    id: Uuid,
    owner: &str,
    message: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE ai_analyses
         SET status = 'FAILED', error_message = $3, processed_at = NOW(),
             lease_owner = NULL, lease_expires_at = NULL, updated_at = NOW()
         WHERE id = $1 AND status = 'PROCESSING' AND lease_owner = $2",
    )
    .bind(id)
    .bind(owner)
    .bind(message)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected() > 0)
}
