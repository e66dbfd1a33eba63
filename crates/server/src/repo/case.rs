use std::collections::BTreeMap;

use chrono::Utc;
use shared_types::{
    normalize_pagination, AppError, Case, CaseListParams, CaseStats, CaseStatus,
    CreateCaseRequest, CreateHistoryRequest, HistoryEventType, MonthlyCount, Page,
    SyncCaseRequest, UpdateCaseRequest, CASE_COLUMNS,
};
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;
use crate::repo::history;

/// Insert a new case owned by `advocate_id`.
pub async fn create(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    req: &CreateCaseRequest,
) -> Result<Case, AppError> {
    let status = req.status.unwrap_or_default();

    sqlx::query_as::<_, Case>(&format!(
        "INSERT INTO cases
            (advocate_id, case_number, efiling_number, case_type, case_year, party_role,
             petitioner_name, respondent_name, efiling_date, efiling_details, bench_type,
             judge_name, court_number, status, next_hearing_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         RETURNING {CASE_COLUMNS}"
    ))
    .bind(advocate_id)
    .bind(&req.case_number)
    .bind(req.efiling_number.trim())
    .bind(req.case_type.trim())
    .bind(req.case_year)
    .bind(req.party_role.as_db_str())
    .bind(&req.petitioner_name)
    .bind(&req.respondent_name)
    .bind(req.efiling_date)
    .bind(&req.efiling_details)
    .bind(&req.bench_type)
    .bind(&req.judge_name)
    .bind(&req.court_number)
    .bind(status.as_db_str())
    .bind(req.next_hearing_date)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Find a case owned by `advocate_id`, including soft-deleted ones.
pub async fn find_owned(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Option<Case>, AppError> {
    sqlx::query_as::<_, Case>(&format!(
        "SELECT {CASE_COLUMNS} FROM cases WHERE id = $1 AND advocate_id = $2"
    ))
    .bind(id)
    .bind(advocate_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Find a visible case owned by `advocate_id`. Mutations go through this.
pub async fn find_visible(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Option<Case>, AppError> {
    sqlx::query_as::<_, Case>(&format!(
        "SELECT {CASE_COLUMNS} FROM cases WHERE id = $1 AND advocate_id = $2 AND is_visible"
    ))
    .bind(id)
    .bind(advocate_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Lock a visible owned case row for the rest of the transaction.
pub async fn lock_visible(
    conn: &mut PgConnection,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Case, AppError> {
    sqlx::query_as::<_, Case>(&format!(
        "SELECT {CASE_COLUMNS} FROM cases
         WHERE id = $1 AND advocate_id = $2 AND is_visible
         FOR UPDATE"
    ))
    .bind(id)
    .bind(advocate_id)
    .fetch_optional(conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?
    .ok_or_else(|| AppError::not_found("Case not found"))
}

/// Apply a partial update.
///
/// A status change must be allowed by [`CaseStatus::can_transition_to`] when
/// `enforce_transitions` is set, and is recorded in the case history within
/// the same transaction.
pub async fn update(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    patch: &UpdateCaseRequest,
    enforce_transitions: bool,
) -> Result<Case, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;
    let current = lock_visible(&mut tx, advocate_id, id).await?;
    let from = CaseStatus::from_db_str(&current.status);

    let status_change = patch.status.filter(|to| *to != from);
    if let Some(to) = status_change {
        if enforce_transitions && !from.can_transition_to(to) {
            return Err(AppError::conflict(format!(
                "Cannot change case status from {} to {}",
                from.as_db_str(),
                to.as_db_str()
            )));
        }
    }

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE cases SET updated_at = NOW()");
    if let Some(v) = &patch.case_number {
        qb.push(", case_number = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.case_type {
        qb.push(", case_type = ").push_bind(v.trim().to_string());
    }
    if let Some(v) = patch.case_year {
        qb.push(", case_year = ").push_bind(v);
    }
    if let Some(v) = patch.party_role {
        qb.push(", party_role = ").push_bind(v.as_db_str());
    }
    if let Some(v) = &patch.petitioner_name {
        qb.push(", petitioner_name = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.respondent_name {
        qb.push(", respondent_name = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.efiling_details {
        qb.push(", efiling_details = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.bench_type {
        qb.push(", bench_type = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.judge_name {
        qb.push(", judge_name = ").push_bind(v.clone());
    }
    if let Some(v) = &patch.court_number {
        qb.push(", court_number = ").push_bind(v.clone());
    }
    if let Some(v) = patch.status {
        qb.push(", status = ").push_bind(v.as_db_str());
    }
    if let Some(v) = patch.next_hearing_date {
        qb.push(", next_hearing_date = ").push_bind(v);
    }
    qb.push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(CASE_COLUMNS);

    let updated = qb
        .build_query_as::<Case>()
        .fetch_one(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    if let Some(to) = status_change {
        let event = CreateHistoryRequest {
            event_type: HistoryEventType::for_status_change(to),
            event_date: Utc::now().date_naive(),
            business_recorded: Some(format!(
                "Status changed from {} to {}",
                from.as_db_str(),
                to.as_db_str()
            )),
            judge_name: None,
            bench_type: None,
            court_number: None,
            next_hearing_date: updated.next_hearing_date,
            order_document_id: None,
        };
        history::append(&mut tx, &updated, &event).await?;
    }

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(updated)
}

/// Record a transfer. Status and visibility are left alone.
pub async fn transfer(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    reason: &str,
) -> Result<Option<Case>, AppError> {
    sqlx::query_as::<_, Case>(&format!(
        "UPDATE cases
         SET transferred_reason = $3, transferred_at = NOW(), updated_at = NOW()
         WHERE id = $1 AND advocate_id = $2 AND is_visible
         RETURNING {CASE_COLUMNS}"
    ))
    .bind(id)
    .bind(advocate_id)
    .bind(reason)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Hide a case. Returns true if a visible row was hidden.
pub async fn soft_delete(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE cases SET is_visible = FALSE, updated_at = NOW()
         WHERE id = $1 AND advocate_id = $2 AND is_visible",
    )
    .bind(id)
    .bind(advocate_id)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}

fn push_list_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    advocate_id: Uuid,
    params: &CaseListParams,
    status: Option<CaseStatus>,
) {
    qb.push(" WHERE advocate_id = ")
        .push_bind(advocate_id)
        .push(" AND is_visible");

    if let Some(s) = status {
        qb.push(" AND status = ").push_bind(s.as_db_str());
    }
    if let Some(t) = params.case_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        qb.push(" AND case_type = ").push_bind(t.to_string());
    }
    if let Some(y) = params.case_year {
        qb.push(" AND case_year = ").push_bind(y);
    }
    if let Some(r) = params.party_role {
        qb.push(" AND party_role = ").push_bind(r.as_db_str());
    }
    if let Some(q) = params.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q);
        qb.push(" AND (case_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR efiling_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR petitioner_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR respondent_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(d) = params.from_date {
        qb.push(" AND efiling_date >= ").push_bind(d);
    }
    if let Some(d) = params.to_date {
        qb.push(" AND efiling_date <= ").push_bind(d);
    }
}

/// Filtered, sorted, paginated listing of the caller's visible cases.
pub async fn list(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    params: &CaseListParams,
) -> Result<Page<Case>, AppError> {
    let status = params
        .status_filter()
        .map_err(|msg| AppError::invalid_field("status", msg))?;
    let (page, per_page) = normalize_pagination(params.page, params.per_page);

    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM cases");
    push_list_filters(&mut count_qb, advocate_id, params, status);
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    let sort = params.sort.unwrap_or_default();
    let order = params.order.unwrap_or_default();

    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {CASE_COLUMNS} FROM cases"));
    push_list_filters(&mut qb, advocate_id, params, status);
    qb.push(format!(
        " ORDER BY {} {} NULLS LAST, id",
        sort.column(),
        order.as_sql()
    ));
    qb.push(" LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind((page - 1) * per_page);

    let items = qb
        .build_query_as::<Case>()
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(Page::new(items, total, page, per_page))
}

/// Visible cases with a hearing between today and `days` from now.
pub async fn upcoming_hearings(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    days: i64,
) -> Result<Vec<Case>, AppError> {
    sqlx::query_as::<_, Case>(&format!(
        "SELECT {CASE_COLUMNS} FROM cases
         WHERE advocate_id = $1 AND is_visible
           AND next_hearing_date BETWEEN CURRENT_DATE AND CURRENT_DATE + $2::int
         ORDER BY next_hearing_date, id"
    ))
    .bind(advocate_id)
    .bind(days as i32)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Dashboard counters over the caller's visible cases.
pub async fn stats(pool: &Pool<Postgres>, advocate_id: Uuid) -> Result<CaseStats, AppError> {
    let status_rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM cases
         WHERE advocate_id = $1 AND is_visible
         GROUP BY status",
    )
    .bind(advocate_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let type_rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT case_type, COUNT(*) FROM cases
         WHERE advocate_id = $1 AND is_visible
         GROUP BY case_type",
    )
    .bind(advocate_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let upcoming_hearings: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM cases
         WHERE advocate_id = $1 AND is_visible
           AND next_hearing_date BETWEEN CURRENT_DATE AND CURRENT_DATE + 7",
    )
    .bind(advocate_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let total_documents: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM documents d
         JOIN cases c ON c.id = d.case_id
         WHERE c.advocate_id = $1 AND c.is_visible",
    )
    .bind(advocate_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    // Six calendar months ending with the current one, zero-filled.
    let monthly_trend = sqlx::query_as::<_, MonthlyCount>(
        "SELECT to_char(m.month, 'YYYY-MM') AS month, COUNT(c.id) AS count
         FROM generate_series(
                date_trunc('month', CURRENT_DATE) - INTERVAL '5 months',
                date_trunc('month', CURRENT_DATE),
                INTERVAL '1 month') AS m(month)
         LEFT JOIN cases c
           ON c.advocate_id = $1 AND c.is_visible
          AND date_trunc('month', c.efiling_date) = m.month
         GROUP BY m.month
         ORDER BY m.month",
    )
    .bind(advocate_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let mut by_status: BTreeMap<String, i64> = CaseStatus::ALL
        .iter()
        .map(|s| (s.as_db_str().to_string(), 0))
        .collect();
    for (status, count) in status_rows {
        *by_status.entry(status).or_insert(0) += count;
    }

    Ok(CaseStats {
        total: by_status.values().sum(),
        pending: by_status[CaseStatus::Pending.as_db_str()],
        disposed: by_status[CaseStatus::Disposed.as_db_str()],
        upcoming_hearings,
        total_documents,
        by_status,
        by_type: type_rows.into_iter().collect(),
        monthly_trend,
    })
}

/// Upsert a case imported from court records, keyed by e-filing number.
/// Any status is accepted.
pub async fn upsert_synced(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    req: &SyncCaseRequest,
) -> Result<Case, AppError> {
    let c = &req.case;
    sqlx::query_as::<_, Case>(&format!(
        "INSERT INTO cases
            (advocate_id, case_number, efiling_number, case_type, case_year, party_role,
             petitioner_name, respondent_name, efiling_date, efiling_details, bench_type,
             judge_name, court_number, status, next_hearing_date, source_url,
             last_synced_at, sync_status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                 NOW(), 'synced')
         ON CONFLICT (advocate_id, efiling_number) DO UPDATE SET
            case_number = EXCLUDED.case_number,
            case_type = EXCLUDED.case_type,
            case_year = EXCLUDED.case_year,
            party_role = EXCLUDED.party_role,
            petitioner_name = EXCLUDED.petitioner_name,
            respondent_name = EXCLUDED.respondent_name,
            efiling_date = EXCLUDED.efiling_date,
            efiling_details = EXCLUDED.efiling_details,
            bench_type = EXCLUDED.bench_type,
            judge_name = EXCLUDED.judge_name,
            court_number = EXCLUDED.court_number,
            status = EXCLUDED.status,
            next_hearing_date = EXCLUDED.next_hearing_date,
            source_url = EXCLUDED.source_url,
            last_synced_at = NOW(),
            sync_status = 'synced',
            updated_at = NOW()
         RETURNING {CASE_COLUMNS}"
    ))
    .bind(advocate_id)
    .bind(&c.case_number)
    .bind(c.efiling_number.trim())
    .bind(c.case_type.trim())
    .bind(c.case_year)
    .bind(c.party_role.as_db_str())
    .bind(&c.petitioner_name)
    .bind(&c.respondent_name)
    .bind(c.efiling_date)
    .bind(&c.efiling_details)
    .bind(&c.bench_type)
    .bind(&c.judge_name)
    .bind(&c.court_number)
    .bind(req.status.as_db_str())
    .bind(c.next_hearing_date)
    .bind(&req.source_url)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}
