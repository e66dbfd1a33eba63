use std::collections::BTreeMap;

use shared_types::{
    AppError, Document, DocumentCategory, DocumentListParams, DocumentStats,
    OcrStatus, UpdateDocumentRequest, UploadStatus, DOCUMENT_COLUMNS,
};
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

/// Mutation predicate: the parent case is visible and owned by the caller.
const VISIBLE_CASE: &str =
    "case_id IN (SELECT id FROM cases WHERE advocate_id = $2 AND is_visible)";
/// Read predicate: the parent case is owned by the caller, even if hidden.
const OWNED_CASE: &str = "case_id IN (SELECT id FROM cases WHERE advocate_id = $2)";

pub struct NewDocument {
    pub case_id: Uuid,
    pub advocate_id: Uuid,
    pub category: DocumentCategory,
    pub title: String,
    pub description: Option<String>,
    pub s3_key: String,
    pub s3_bucket: String,
    pub file_size: i64,
    pub content_type: String,
    pub checksum_md5: Option<String>,
    pub source_url: Option<String>,
    pub is_ocr_required: bool,
}

/// Insert a document row in upload state PENDING.
pub async fn insert_pending(pool: &Pool<Postgres>, new: NewDocument) -> Result<Document, AppError> {
    sqlx::query_as::<_, Document>(&format!(
        "INSERT INTO documents
            (case_id, advocate_id, category, title, description, s3_key, s3_bucket, file_size,
             content_type, checksum_md5, source_url, is_ocr_required, ocr_status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(new.case_id)
    .bind(new.advocate_id)
    .bind(new.category.as_db_str())
    .bind(new.title)
    .bind(new.description)
    .bind(new.s3_key)
    .bind(new.s3_bucket)
    .bind(new.file_size)
    .bind(new.content_type)
    .bind(new.checksum_md5)
    .bind(new.source_url)
    .bind(new.is_ocr_required)
    .bind(OcrStatus::initial(new.is_ocr_required).as_db_str())
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// A document owned by the caller. Documents of soft-deleted cases are
/// still returned.
pub async fn find_owned(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Option<Document>, AppError> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND {OWNED_CASE}"
    ))
    .bind(id)
    .bind(advocate_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// A document of a visible case owned by the caller.
pub async fn find_visible(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Option<Document>, AppError> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND {VISIBLE_CASE}"
    ))
    .bind(id)
    .bind(advocate_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

async fn lock_owned(
    conn: &mut PgConnection,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Document, AppError> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND {VISIBLE_CASE} FOR UPDATE"
    ))
    .bind(id)
    .bind(advocate_id)
    .fetch_optional(conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?
    .ok_or_else(|| AppError::not_found("Document not found"))
}

/// Every mutation other than unlock is refused while a document is locked.
pub fn ensure_unlocked(doc: &Document) -> Result<(), AppError> {
    if doc.is_locked {
        return Err(AppError::forbidden(match &doc.lock_reason {
            Some(reason) => format!("Document is locked: {reason}"),
            None => "Document is locked".to_string(),
        }));
    }
    Ok(())
}

pub fn ensure_upload_transition(doc: &Document, to: UploadStatus) -> Result<(), AppError> {
    ensure_unlocked(doc)?;
    let from = doc.upload_state();
    if !from.can_transition_to(to) {
        return Err(AppError::conflict(format!(
            "Cannot move upload from {} to {}",
            from.as_db_str(),
            to.as_db_str()
        )));
    }
    Ok(())
}

pub fn ensure_ocr_transition(doc: &Document, to: OcrStatus) -> Result<(), AppError> {
    ensure_unlocked(doc)?;
    let from = doc.ocr_state();
    if !from.can_transition_to(to) {
        return Err(AppError::conflict(format!(
            "Cannot move OCR from {} to {}",
            from.as_db_str(),
            to.as_db_str()
        )));
    }
    Ok(())
}

/// Lock the row, run `guard` against its current state, then apply the
/// assignments pushed by `set`. All in one transaction.
async fn guarded_update<G, S>(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    guard: G,
    set: S,
) -> Result<Document, AppError>
where
    G: FnOnce(&Document) -> Result<(), AppError>,
    S: FnOnce(&mut QueryBuilder<'static, Postgres>),
{
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;
    let current = lock_owned(&mut tx, advocate_id, id).await?;
    guard(&current)?;

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE documents SET updated_at = NOW()");
    set(&mut qb);
    qb.push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(DOCUMENT_COLUMNS);

    let updated = qb
        .build_query_as::<Document>()
        .fetch_one(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(updated)
}

// ── Upload machine ──────────────────────────────────────────────────

pub async fn mark_uploading(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| ensure_upload_transition(d, UploadStatus::Uploading),
        |qb| {
            qb.push(", upload_status = ")
                .push_bind(UploadStatus::Uploading.as_db_str());
        },
    )
    .await
}

/// Mark the upload COMPLETED. `size` replaces the declared size when the
/// object store reported one.
pub async fn complete_upload(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    size: Option<i64>,
    version_id: Option<String>,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| ensure_upload_transition(d, UploadStatus::Completed),
        move |qb| {
            qb.push(", upload_status = ")
                .push_bind(UploadStatus::Completed.as_db_str())
                .push(", uploaded_at = NOW(), upload_error = NULL");
            if let Some(size) = size {
                qb.push(", file_size = ").push_bind(size);
            }
            if let Some(v) = version_id {
                qb.push(", s3_version_id = ").push_bind(v);
            }
        },
    )
    .await
}

pub async fn fail_upload(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    error: String,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| ensure_upload_transition(d, UploadStatus::Failed),
        move |qb| {
            qb.push(", upload_status = ")
                .push_bind(UploadStatus::Failed.as_db_str())
                .push(", upload_error = ")
                .push_bind(error);
        },
    )
    .await
}

/// FAILED back to PENDING under a fresh object key.
pub async fn reinitiate(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    new_key: String,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| ensure_upload_transition(d, UploadStatus::Pending),
        move |qb| {
            qb.push(", upload_status = ")
                .push_bind(UploadStatus::Pending.as_db_str())
                .push(", s3_key = ")
                .push_bind(new_key)
                .push(", s3_version_id = NULL, uploaded_at = NULL, upload_error = NULL");
        },
    )
    .await
}

// ── OCR machine ─────────────────────────────────────────────────────

/// Opt a NOT_REQUIRED document into OCR.
pub async fn request_ocr(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| ensure_ocr_transition(d, OcrStatus::Pending),
        |qb| {
            qb.push(", is_ocr_required = TRUE, ocr_error = NULL, ocr_status = ")
                .push_bind(OcrStatus::Pending.as_db_str());
        },
    )
    .await
}

pub async fn start_ocr(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    job_id: Option<String>,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| ensure_ocr_transition(d, OcrStatus::Processing),
        move |qb| {
            qb.push(", ocr_error = NULL, ocr_status = ")
                .push_bind(OcrStatus::Processing.as_db_str());
            if let Some(job) = job_id {
                qb.push(", ocr_job_id = ").push_bind(job);
            }
        },
    )
    .await
}

pub async fn complete_ocr(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    extracted_text: String,
    confidence: Option<f64>,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| ensure_ocr_transition(d, OcrStatus::Completed),
        move |qb| {
            qb.push(", ocr_error = NULL, ocr_status = ")
                .push_bind(OcrStatus::Completed.as_db_str())
                .push(", extracted_text = ")
                .push_bind(extracted_text)
                .push(", classification_confidence = ")
                .push_bind(confidence);
        },
    )
    .await
}

pub async fn fail_ocr(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    error: String,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| ensure_ocr_transition(d, OcrStatus::Failed),
        move |qb| {
            qb.push(", ocr_status = ")
                .push_bind(OcrStatus::Failed.as_db_str())
                .push(", ocr_error = ")
                .push_bind(error);
        },
    )
    .await
}

// ── Lock ────────────────────────────────────────────────────────────

pub async fn lock(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    reason: Option<String>,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| {
            if d.is_locked {
                return Err(AppError::conflict("Document is already locked"));
            }
            Ok(())
        },
        move |qb| {
            qb.push(", is_locked = TRUE, locked_at = NOW(), lock_reason = ")
                .push_bind(reason);
        },
    )
    .await
}

pub async fn unlock(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Document, AppError> {
    guarded_update(
        pool,
        advocate_id,
        id,
        |d| {
            if !d.is_locked {
                return Err(AppError::conflict("Document is not locked"));
            }
            Ok(())
        },
        |qb| {
            qb.push(", is_locked = FALSE, locked_at = NULL, lock_reason = NULL");
        },
    )
    .await
}

// ── Metadata, delete, reads ─────────────────────────────────────────

pub async fn update_metadata(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
    patch: UpdateDocumentRequest,
) -> Result<Document, AppError> {
    let ai_metadata = patch
        .ai_metadata
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::invalid_field("aiMetadata", e.to_string()))?;

    guarded_update(pool, advocate_id, id, ensure_unlocked, move |qb| {
        if let Some(title) = patch.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = patch.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(category) = patch.category {
            qb.push(", category = ").push_bind(category.as_db_str());
        }
        if let Some(meta) = ai_metadata {
            qb.push(", ai_metadata = ").push_bind(meta);
        }
    })
    .await
}

/// Delete an unlocked document row. The removed row is returned so the
/// caller can drop the stored object.
pub async fn delete(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: Uuid,
) -> Result<Document, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;
    let doc = lock_owned(&mut tx, advocate_id, id).await?;
    ensure_unlocked(&doc)?;

    sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(doc)
}

pub async fn list_for_case(
    pool: &Pool<Postgres>,
    case_id: Uuid,
    params: &DocumentListParams,
) -> Result<Vec<Document>, AppError> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE case_id = "
    ));
    qb.push_bind(case_id);
    if let Some(c) = params.category {
        qb.push(" AND category = ").push_bind(c.as_db_str());
    }
    if let Some(s) = params.upload_status {
        qb.push(" AND upload_status = ").push_bind(s.as_db_str());
    }
    if let Some(s) = params.ocr_status {
        qb.push(" AND ocr_status = ").push_bind(s.as_db_str());
    }
    qb.push(" ORDER BY created_at DESC, id");

    qb.build_query_as::<Document>()
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// COMPLETED documents of a case that carry extracted text, oldest first.
pub async fn analyzable_for_case(
    conn: &mut PgConnection,
    case_id: Uuid,
) -> Result<Vec<Document>, AppError> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents
         WHERE case_id = $1 AND upload_status = 'COMPLETED'
           AND extracted_text IS NOT NULL AND btrim(extracted_text) <> ''
         ORDER BY created_at, id"
    ))
    .bind(case_id)
    .fetch_all(conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

async fn grouped(
    pool: &Pool<Postgres>,
    case_id: Uuid,
    column: &str,
    keys: impl Iterator<Item = &'static str>,
) -> Result<BTreeMap<String, i64>, AppError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
        "SELECT {column}, COUNT(*) FROM documents WHERE case_id = $1 GROUP BY {column}"
    ))
    .bind(case_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let mut map: BTreeMap<String, i64> = keys.map(|k| (k.to_string(), 0)).collect();
    for (key, count) in rows {
        *map.entry(key).or_insert(0) += count;
    }
    Ok(map)
}

pub async fn stats_for_case(pool: &Pool<Postgres>, case_id: Uuid) -> Result<DocumentStats, AppError> {
    let (total, total_size, locked, requires_ocr): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(file_size), 0)::BIGINT,
                COUNT(*) FILTER (WHERE is_locked),
                COUNT(*) FILTER (WHERE is_ocr_required)
         FROM documents WHERE case_id = $1",
    )
    .bind(case_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let by_category = grouped(
        pool,
        case_id,
        "category",
        DocumentCategory::ALL.iter().map(|c| c.as_db_str()),
    )
    .await?;
    let by_upload_status = grouped(
        pool,
        case_id,
        "upload_status",
        UploadStatus::ALL.iter().map(|s| s.as_db_str()),
    )
    .await?;
    let by_ocr_status = grouped(
        pool,
        case_id,
        "ocr_status",
        OcrStatus::ALL.iter().map(|s| s.as_db_str()),
    )
    .await?;

    Ok(DocumentStats {
        total,
        by_category,
        by_upload_status,
        by_ocr_status,
        total_size,
        average_size: if total > 0 { total_size / total } else { 0 },
        locked,
        requires_ocr,
    })
}

