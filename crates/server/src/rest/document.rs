use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use shared_types::{
    ApiResponse, AppError, ChatRequest, ChatResponse, CompleteOcrRequest, Document,
    DocumentCategory, DocumentListParams, DocumentResponse, DocumentStats, DownloadUrlResponse,
    FailRequest, InitiateUploadRequest, LockDocumentRequest, StartOcrRequest,
    UpdateDocumentRequest, UploadSlotResponse, UploadStatus, UsageMetric, DEFAULT_CONTENT_TYPE,
};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::auth::extractors::VerifiedAdvocate;
use crate::db::AppState;
use crate::error_convert::ValidateRequest;
use crate::extract::{parse_id, ApiJson, ApiQuery};
use crate::repo::document::{self as doc_repo, NewDocument};
use crate::storage::{self, ObjectStore};
use crate::{analysis, repo, usage};

/// One more document of `bytes` bytes.
fn upload_demand(bytes: i64) -> [(UsageMetric, i64); 2] {
    [(UsageMetric::Documents, 1), (UsageMetric::Storage, bytes)]
}

async fn visible_case(pool: &Pool<Postgres>, advocate_id: Uuid, case_id: Uuid) -> Result<(), AppError> {
    repo::case::find_visible(pool, advocate_id, case_id)
        .await?
        .ok_or_else(|| AppError::not_found("Case not found"))?;
    Ok(())
}

/// Readable document, including those of soft-deleted cases.
async fn owned_document(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: &str,
) -> Result<Document, AppError> {
    let document_id = parse_id(id, "document")?;
    doc_repo::find_owned(pool, advocate_id, document_id)
        .await?
        .ok_or_else(|| AppError::not_found("Document not found"))
}

/// Document of a visible case, for handlers about to change it.
async fn visible_document(
    pool: &Pool<Postgres>,
    advocate_id: Uuid,
    id: &str,
) -> Result<Document, AppError> {
    let document_id = parse_id(id, "document")?;
    doc_repo::find_visible(pool, advocate_id, document_id)
        .await?
        .ok_or_else(|| AppError::not_found("Document not found"))
}

async fn upload_slot(store: &dyn ObjectStore, doc: Document) -> Result<UploadSlotResponse, AppError> {
    let presigned = store.presign_put(&doc.s3_key, &doc.content_type).await?;
    Ok(UploadSlotResponse {
        document: DocumentResponse::from(doc),
        upload_url: presigned.url,
        required_headers: presigned.required_headers,
        expires_in_secs: store.presign_expiry_secs(),
    })
}

// ── Upload ──────────────────────────────────────────────────────────

// POST /api/cases/{id}/documents
#[utoipa::path(
    post,
    path = "/api/cases/{id}/documents",
    params(("id" = String, Path, description = "Case UUID")),
    request_body = InitiateUploadRequest,
    responses(
        (status = 201, description = "Document row created with a presigned upload URL", body = UploadSlotResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Plan limit reached", body = AppError),
        (status = 404, description = "Case not found", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth, body), fields(advocate_id = %auth.advocate_id))]
pub async fn initiate_upload(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<InitiateUploadRequest>,
) -> Result<ApiResponse<UploadSlotResponse>, AppError> {
    let case_id = parse_id(&id, "case")?;
    body.validate_request()?;
    let max_upload = state.config.uploads.max_upload_bytes;
    if body.file_size > i64::try_from(max_upload).unwrap_or(i64::MAX) {
        return Err(AppError::invalid_field(
            "fileSize",
            format!("File size must not exceed {max_upload} bytes"),
        ));
    }
    visible_case(&state.pool, auth.advocate_id, case_id).await?;
    usage::ensure_capacity(&state.pool, auth.advocate_id, &upload_demand(body.file_size)).await?;

    let title = body
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| body.file_name.clone());

    let doc = doc_repo::insert_pending(
        &state.pool,
        NewDocument {
            case_id,
            advocate_id: auth.advocate_id,
            category: body.category,
            title,
            description: body.description,
            s3_key: storage::document_key(auth.advocate_id, case_id, &body.file_name),
            s3_bucket: state.store.bucket().to_string(),
            file_size: body.file_size,
            content_type: body.content_type,
            checksum_md5: body.checksum_md5,
            source_url: body.source_url,
            is_ocr_required: body.is_ocr_required,
        },
    )
    .await?;

    tracing::info!(document_id = %doc.id, %case_id, "upload initiated");
    Ok(ApiResponse::created(upload_slot(state.store.as_ref(), doc).await?))
}

/// Fields collected from a direct multipart upload.
#[derive(Default)]
struct DirectUpload {
    file: Option<(String, String, Vec<u8>)>,
    category: DocumentCategory,
    title: Option<String>,
    description: Option<String>,
    is_ocr_required: bool,
}

async fn read_multipart(mut multipart: Multipart) -> Result<DirectUpload, AppError> {
    let mut upload = DirectUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(e.to_string()))?;
                upload.file = Some((file_name, content_type, data.to_vec()));
            }
            "category" | "title" | "description" | "isOcrRequired" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(e.to_string()))?;
                match name.as_str() {
                    "category" => {
                        upload.category =
                            serde_json::from_value(serde_json::Value::String(text.trim().to_string()))
                                .map_err(|_| {
                                    AppError::invalid_field("category", "Unknown document category")
                                })?;
                    }
                    "title" => upload.title = Some(text).filter(|t| !t.trim().is_empty()),
                    "description" => upload.description = Some(text),
                    _ => upload.is_ocr_required = text.trim().eq_ignore_ascii_case("true"),
                }
            }
            _ => {}
        }
    }
    Ok(upload)
}

// POST /api/cases/{id}/documents/direct
#[utoipa::path(
    post,
    path = "/api/cases/{id}/documents/direct",
    params(("id" = String, Path, description = "Case UUID")),
    request_body(content_type = "multipart/form-data", description = "`file` plus optional `category`, `title`, `description`, `isOcrRequired`"),
    responses(
        (status = 201, description = "Document stored", body = DocumentResponse),
        (status = 400, description = "No file provided", body = AppError),
        (status = 403, description = "Plan limit reached", body = AppError),
        (status = 404, description = "Case not found", body = AppError),
        (status = 500, description = "Object storage error", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth, multipart), fields(advocate_id = %auth.advocate_id))]
pub async fn direct_upload(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let case_id = parse_id(&id, "case")?;
    visible_case(&state.pool, auth.advocate_id, case_id).await?;

    let upload = read_multipart(multipart).await?;
    let (file_name, content_type, bytes) = upload
        .file
        .ok_or_else(|| AppError::invalid_field("file", "No file provided"))?;
    if bytes.is_empty() {
        return Err(AppError::invalid_field("file", "File is empty"));
    }

    let size = bytes.len() as i64;
    usage::ensure_capacity(&state.pool, auth.advocate_id, &upload_demand(size)).await?;

    let key = storage::document_key(auth.advocate_id, case_id, &file_name);
    let doc = doc_repo::insert_pending(
        &state.pool,
        NewDocument {
            case_id,
            advocate_id: auth.advocate_id,
            category: upload.category,
            title: upload.title.unwrap_or_else(|| file_name.clone()),
            description: upload.description,
            s3_key: key.clone(),
            s3_bucket: state.store.bucket().to_string(),
            file_size: size,
            content_type: content_type.clone(),
            checksum_md5: None,
            source_url: None,
            is_ocr_required: upload.is_ocr_required,
        },
    )
    .await?;
    doc_repo::mark_uploading(&state.pool, auth.advocate_id, doc.id).await?;

    if let Err(e) = state.store.put(&key, &content_type, bytes).await {
        doc_repo::fail_upload(&state.pool, auth.advocate_id, doc.id, e.to_string()).await?;
        return Err(e.into());
    }

    let version_id = state.store.head(&key).await?.and_then(|m| m.version_id);
    let doc =
        doc_repo::complete_upload(&state.pool, auth.advocate_id, doc.id, None, version_id).await?;

    tracing::info!(document_id = %doc.id, %case_id, size = doc.file_size, "document uploaded");
    Ok(ApiResponse::created(DocumentResponse::from(doc)))
}

// POST /api/documents/{id}/uploading
#[utoipa::path(
    post,
    path = "/api/documents/{id}/uploading",
    params(("id" = String, Path, description = "Document UUID")),
    responses(
        (status = 200, description = "Upload in progress", body = DocumentResponse),
        (status = 409, description = "Not PENDING", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn mark_uploading(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    let doc = doc_repo::mark_uploading(&pool, auth.advocate_id, document_id).await?;
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

/// Check the object landed in storage and mark the upload COMPLETED.
/// A missing object marks the upload FAILED instead.
#[utoipa::path(
    post,
    path = "/api/documents/{id}/confirm",
    params(("id" = String, Path, description = "Document UUID")),
    responses(
        (status = 200, description = "Upload COMPLETED, or FAILED if the object is missing", body = DocumentResponse),
        (status = 403, description = "Document locked", body = AppError),
        (status = 409, description = "Upload cannot complete from its current state", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth), fields(advocate_id = %auth.advocate_id))]
pub async fn confirm_upload(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let doc = visible_document(&state.pool, auth.advocate_id, &id).await?;
    doc_repo::ensure_upload_transition(&doc, UploadStatus::Completed)?;

    let doc = match state.store.head(&doc.s3_key).await? {
        Some(meta) => {
            doc_repo::complete_upload(&state.pool, auth.advocate_id, doc.id, meta.size, meta.version_id)
                .await?
        }
        None => {
            tracing::warn!(document_id = %doc.id, key = %doc.s3_key, "confirmed object is missing");
            doc_repo::fail_upload(
                &state.pool,
                auth.advocate_id,
                doc.id,
                "Object not found in storage".to_string(),
            )
            .await?
        }
    };
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// POST /api/documents/{id}/fail
#[utoipa::path(
    post,
    path = "/api/documents/{id}/fail",
    params(("id" = String, Path, description = "Document UUID")),
    request_body = FailRequest,
    responses(
        (status = 200, description = "Upload FAILED", body = DocumentResponse),
        (status = 409, description = "Upload already finished", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn fail_upload(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<FailRequest>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    body.validate_request()?;
    let doc = doc_repo::fail_upload(&pool, auth.advocate_id, document_id, body.error).await?;
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// POST /api/documents/{id}/reinitiate
#[utoipa::path(
    post,
    path = "/api/documents/{id}/reinitiate",
    params(("id" = String, Path, description = "Document UUID")),
    responses(
        (status = 200, description = "Fresh upload slot for a FAILED upload", body = UploadSlotResponse),
        (status = 409, description = "Upload is not FAILED", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth), fields(advocate_id = %auth.advocate_id))]
pub async fn reinitiate_upload(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<UploadSlotResponse>, AppError> {
    let doc = visible_document(&state.pool, auth.advocate_id, &id).await?;
    let new_key = storage::document_key(
        auth.advocate_id,
        doc.case_id,
        storage::file_name_from_key(&doc.s3_key),
    );

    let doc = doc_repo::reinitiate(&state.pool, auth.advocate_id, doc.id, new_key).await?;
    Ok(ApiResponse::ok(upload_slot(state.store.as_ref(), doc).await?))
}

// ── OCR ─────────────────────────────────────────────────────────────

// POST /api/documents/{id}/ocr/request
#[utoipa::path(
    post,
    path = "/api/documents/{id}/ocr/request",
    params(("id" = String, Path, description = "Document UUID")),
    responses(
        (status = 200, description = "OCR PENDING", body = DocumentResponse),
        (status = 409, description = "OCR already requested", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn request_ocr(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    let doc = doc_repo::request_ocr(&pool, auth.advocate_id, document_id).await?;
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// POST /api/documents/{id}/ocr/start
#[utoipa::path(
    post,
    path = "/api/documents/{id}/ocr/start",
    params(("id" = String, Path, description = "Document UUID")),
    request_body = StartOcrRequest,
    responses(
        (status = 200, description = "OCR PROCESSING", body = DocumentResponse),
        (status = 409, description = "OCR not PENDING or FAILED", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn start_ocr(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StartOcrRequest>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    let doc = doc_repo::start_ocr(&pool, auth.advocate_id, document_id, body.job_id).await?;
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// POST /api/documents/{id}/ocr/complete
#[utoipa::path(
    post,
    path = "/api/documents/{id}/ocr/complete",
    params(("id" = String, Path, description = "Document UUID")),
    request_body = CompleteOcrRequest,
    responses(
        (status = 200, description = "Extracted text stored", body = DocumentResponse),
        (status = 409, description = "OCR not PROCESSING", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(pool, auth, body), fields(advocate_id = %auth.advocate_id, chars = body.extracted_text.len()))]
pub async fn complete_ocr(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CompleteOcrRequest>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    body.validate_request()?;
    let doc = doc_repo::complete_ocr(
        &pool,
        auth.advocate_id,
        document_id,
        body.extracted_text,
        body.confidence,
    )
    .await?;
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// POST /api/documents/{id}/ocr/fail
#[utoipa::path(
    post,
    path = "/api/documents/{id}/ocr/fail",
    params(("id" = String, Path, description = "Document UUID")),
    request_body = FailRequest,
    responses(
        (status = 200, description = "OCR FAILED", body = DocumentResponse),
        (status = 409, description = "OCR not PROCESSING", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn fail_ocr(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<FailRequest>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    body.validate_request()?;
    let doc = doc_repo::fail_ocr(&pool, auth.advocate_id, document_id, body.error).await?;
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// ── Lock ────────────────────────────────────────────────────────────

// POST /api/documents/{id}/lock
#[utoipa::path(
    post,
    path = "/api/documents/{id}/lock",
    params(("id" = String, Path, description = "Document UUID")),
    request_body = LockDocumentRequest,
    responses(
        (status = 200, description = "Document locked", body = DocumentResponse),
        (status = 409, description = "Already locked", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn lock_document(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<LockDocumentRequest>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    let doc = doc_repo::lock(&pool, auth.advocate_id, document_id, body.reason).await?;
    tracing::info!(%document_id, "document locked");
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// POST /api/documents/{id}/unlock
#[utoipa::path(
    post,
    path = "/api/documents/{id}/unlock",
    params(("id" = String, Path, description = "Document UUID")),
    responses(
        (status = 200, description = "Document unlocked", body = DocumentResponse),
        (status = 409, description = "Not locked", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn unlock_document(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    let doc = doc_repo::unlock(&pool, auth.advocate_id, document_id).await?;
    tracing::info!(%document_id, "document unlocked");
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// ── Reads, metadata, delete ─────────────────────────────────────────

// GET /api/cases/{id}/documents
#[utoipa::path(
    get,
    path = "/api/cases/{id}/documents",
    params(("id" = String, Path, description = "Case UUID"), DocumentListParams),
    responses(
        (status = 200, description = "Documents of the case, newest first", body = Vec<DocumentResponse>),
        (status = 404, description = "Case not found", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn list_documents(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<DocumentListParams>,
) -> Result<ApiResponse<Vec<DocumentResponse>>, AppError> {
    let case_id = parse_id(&id, "case")?;
    visible_case(&pool, auth.advocate_id, case_id).await?;

    let docs = doc_repo::list_for_case(&pool, case_id, &params).await?;
    Ok(ApiResponse::ok(
        docs.into_iter().map(DocumentResponse::from).collect(),
    ))
}

// GET /api/cases/{id}/documents/stats
#[utoipa::path(
    get,
    path = "/api/cases/{id}/documents/stats",
    params(("id" = String, Path, description = "Case UUID")),
    responses(
        (status = 200, description = "Document counters for the case", body = DocumentStats),
        (status = 404, description = "Case not found", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn document_stats(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<DocumentStats>, AppError> {
    let case_id = parse_id(&id, "case")?;
    visible_case(&pool, auth.advocate_id, case_id).await?;
    Ok(ApiResponse::ok(doc_repo::stats_for_case(&pool, case_id).await?))
}

// GET /api/documents/{id}
#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    params(("id" = String, Path, description = "Document UUID")),
    responses(
        (status = 200, description = "Document", body = DocumentResponse),
        (status = 404, description = "Document not found", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn get_document(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let doc = owned_document(&pool, auth.advocate_id, &id).await?;
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// PATCH /api/documents/{id}
#[utoipa::path(
    patch,
    path = "/api/documents/{id}",
    params(("id" = String, Path, description = "Document UUID")),
    request_body = UpdateDocumentRequest,
    responses(
        (status = 200, description = "Metadata updated", body = DocumentResponse),
        (status = 403, description = "Document locked", body = AppError),
        (status = 404, description = "Document not found", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn update_document(
    State(pool): State<Pool<Postgres>>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateDocumentRequest>,
) -> Result<ApiResponse<DocumentResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    body.validate_request()?;
    let doc = doc_repo::update_metadata(&pool, auth.advocate_id, document_id, body).await?;
    Ok(ApiResponse::ok(DocumentResponse::from(doc)))
}

// DELETE /api/documents/{id}
#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    params(("id" = String, Path, description = "Document UUID")),
    responses(
        (status = 204, description = "Document and stored object removed"),
        (status = 403, description = "Document locked", body = AppError),
        (status = 404, description = "Document not found", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth), fields(advocate_id = %auth.advocate_id))]
pub async fn delete_document(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let document_id = parse_id(&id, "document")?;
    let doc = doc_repo::delete(&state.pool, auth.advocate_id, document_id).await?;

    // Best effort: the row is already gone.
    if let Err(e) = state.store.delete(&doc.s3_key).await {
        tracing::warn!(%document_id, key = %doc.s3_key, error = %e, "stored object not removed");
    }
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/documents/{id}/download
#[utoipa::path(
    get,
    path = "/api/documents/{id}/download",
    params(("id" = String, Path, description = "Document UUID")),
    responses(
        (status = 200, description = "Presigned download URL", body = DownloadUrlResponse),
        (status = 404, description = "Document not found", body = AppError),
        (status = 409, description = "Upload not completed", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn download_document(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
) -> Result<ApiResponse<DownloadUrlResponse>, AppError> {
    let doc = owned_document(&state.pool, auth.advocate_id, &id).await?;
    if doc.upload_state() != UploadStatus::Completed {
        return Err(AppError::conflict("Document upload has not completed"));
    }

    let url = state.store.presign_get(&doc.s3_key).await?;
    Ok(ApiResponse::ok(DownloadUrlResponse {
        url,
        expires_in_secs: state.store.presign_expiry_secs(),
    }))
}

// POST /api/documents/{id}/chat
#[utoipa::path(
    post,
    path = "/api/documents/{id}/chat",
    params(("id" = String, Path, description = "Document UUID")),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer grounded in the document text", body = ChatResponse),
        (status = 400, description = "Document has no extracted text", body = AppError),
        (status = 404, description = "Document not found", body = AppError),
        (status = 500, description = "Reasoning service error", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn chat_with_document(
    State(state): State<AppState>,
    auth: VerifiedAdvocate,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<ApiResponse<ChatResponse>, AppError> {
    let document_id = parse_id(&id, "document")?;
    body.validate_request()?;
    let reply = analysis::chat(&state, auth.advocate_id, document_id, &body).await?;
    Ok(ApiResponse::ok(reply))
}
