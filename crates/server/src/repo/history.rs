use shared_types::{AppError, Case, CaseHistory, CreateHistoryRequest, HISTORY_COLUMNS};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

/// Append an event to `case`'s timeline. Judge, bench and court fall back to
/// the case's current values when the request leaves them out.
pub async fn append(
    conn: &mut PgConnection,
    case: &Case,
    req: &CreateHistoryRequest,
) -> Result<CaseHistory, AppError> {
    sqlx::query_as::<_, CaseHistory>(&format!(
        "INSERT INTO case_history
            (case_id, event_type, event_date, business_recorded, judge_name, bench_type,
             court_number, next_hearing_date, order_document_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {HISTORY_COLUMNS}"
    ))
    .bind(case.id)
    .bind(req.event_type.as_db_str())
    .bind(req.event_date)
    .bind(&req.business_recorded)
    .bind(req.judge_name.as_ref().or(case.judge_name.as_ref()))
    .bind(req.bench_type.as_ref().or(case.bench_type.as_ref()))
    .bind(req.court_number.as_ref().or(case.court_number.as_ref()))
    .bind(req.next_hearing_date)
    .bind(req.order_document_id)
    .fetch_one(conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Record an event on a visible case owned by `advocate_id`.
///
/// A referenced order document must belong to the same case. When the event
/// carries a next hearing date the case moves to it.
pub async fn record(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    case_id: Uuid,
    req: &CreateHistoryRequest,
) -> Result<CaseHistory, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;
    let case = super::case::lock_visible(&mut tx, advocate_id, case_id).await?;

    if let Some(doc_id) = req.order_document_id {
        let belongs: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM documents WHERE id = $1 AND case_id = $2)",
        )
        .bind(doc_id)
        .bind(case_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
        if !belongs {
            return Err(AppError::invalid_field(
                "orderDocumentId",
                "Order document does not belong to this case",
            ));
        }
    }

    let entry = append(&mut tx, &case, req).await?;

    if let Some(next) = req.next_hearing_date {
        sqlx::query("UPDATE cases SET next_hearing_date = $2, updated_at = NOW() WHERE id = $1")
            .bind(case_id)
            .bind(next)
            .execute(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;
    }

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(entry)
}

/// Timeline of a case, newest first.
pub async fn list_for_case(
    pool: &Pool<Postgres>,
    case_id: Uuid,
) -> Result<Vec<CaseHistory>, AppError> {
    sqlx::query_as::<_, CaseHistory>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM case_history
         WHERE case_id = $1
         ORDER BY event_date DESC, created_at DESC"
    ))
    .bind(case_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}
