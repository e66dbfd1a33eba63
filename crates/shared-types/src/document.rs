use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums and state machines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentCategory {
    CaseFile,
    Annexure,
    Order,
    Judgment,
    #[default]
    Misc,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 5] = [
        DocumentCategory::CaseFile,
        DocumentCategory::Annexure,
        DocumentCategory::Order,
        DocumentCategory::Judgment,
        DocumentCategory::Misc,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            DocumentCategory::CaseFile => "CASE_FILE",
            DocumentCategory::Annexure => "ANNEXURE",
            DocumentCategory::Order => "ORDER",
            DocumentCategory::Judgment => "JUDGMENT",
            DocumentCategory::Misc => "MISC",
        }
    }

    /// Parse from database TEXT column. Unknown values default to Misc.
    pub fn from_db_str(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_db_str() == s)
            .unwrap_or_default()
    }
}

/// Progress of the binary transfer into object storage.
///
/// ```text
/// PENDING ──► UPLOADING ──► COMPLETED
///    │            │
///    └────────────┴───────► FAILED ──► PENDING (fresh slot)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    #[default]
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub const ALL: [UploadStatus; 4] = [
        UploadStatus::Pending,
        UploadStatus::Uploading,
        UploadStatus::Completed,
        UploadStatus::Failed,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "PENDING",
            UploadStatus::Uploading => "UPLOADING",
            UploadStatus::Completed => "COMPLETED",
            UploadStatus::Failed => "FAILED",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|u| u.as_db_str() == s)
            .unwrap_or_default()
    }

    pub fn can_transition_to(&self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        matches!(
            (self, next),
            (Pending, Uploading | Completed | Failed)
                | (Uploading, Completed | Failed)
                | (Failed, Pending)
        )
    }
}

/// Progress of text extraction. Independent of [`UploadStatus`].
///
/// ```text
/// NOT_REQUIRED ──► PENDING ──► PROCESSING ──► COMPLETED
///                                  │
///                                  ▼
///                               FAILED ──► PROCESSING | PENDING
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OcrStatus {
    #[default]
    NotRequired,
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OcrStatus {
    pub const ALL: [OcrStatus; 5] = [
        OcrStatus::NotRequired,
        OcrStatus::Pending,
        OcrStatus::Processing,
        OcrStatus::Completed,
        OcrStatus::Failed,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            OcrStatus::NotRequired => "NOT_REQUIRED",
            OcrStatus::Pending => "PENDING",
            OcrStatus::Processing => "PROCESSING",
            OcrStatus::Completed => "COMPLETED",
            OcrStatus::Failed => "FAILED",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|o| o.as_db_str() == s)
            .unwrap_or_default()
    }

    /// Initial OCR state for a new document.
    pub fn initial(is_ocr_required: bool) -> Self {
        if is_ocr_required {
            OcrStatus::Pending
        } else {
            OcrStatus::NotRequired
        }
    }

    pub fn can_transition_to(&self, next: OcrStatus) -> bool {
        use OcrStatus::*;
        matches!(
            (self, next),
            (NotRequired, Pending)
                | (Pending, Processing)
                | (Processing, Completed | Failed)
                | (Failed, Processing | Pending)
        )
    }
}

// ---------------------------------------------------------------------------
// AI-derived metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEntities {
    #[serde(default)]
    pub persons: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub dates: Vec<String>,
}

/// Classification output attached to a document.
///
/// Unknown keys are preserved so metadata written by newer classifiers
/// survives a read-modify-write cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AiMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_category: Option<DocumentCategory>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub entities: ExtractedEntities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<i32>,
    #[serde(flatten)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document stored in the system (metadata only, no blob).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct Document {
    pub id: Uuid,
    pub case_id: Uuid,
    pub advocate_id: Uuid,
    /// DocumentCategory stored as text.
    pub category: String,
    pub title: String,
    pub description: Option<String>,
    pub s3_key: String,
    pub s3_bucket: String,
    pub s3_version_id: Option<String>,
    pub file_size: i64,
    pub content_type: String,
    pub checksum_md5: Option<String>,
    /// UploadStatus stored as text.
    pub upload_status: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub upload_error: Option<String>,
    pub source_url: Option<String>,
    pub is_ocr_required: bool,
    /// OcrStatus stored as text.
    pub ocr_status: String,
    pub ocr_job_id: Option<String>,
    pub ocr_error: Option<String>,
    pub extracted_text: Option<String>,
    pub classification_confidence: Option<f64>,
    pub ai_metadata: Option<serde_json::Value>,
    pub is_locked: bool,
    pub lock_reason: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DOCUMENT_COLUMNS: &str = "id, case_id, advocate_id, category, title, description, s3_key, \
     s3_bucket, s3_version_id, file_size, content_type, checksum_md5, upload_status, uploaded_at, \
     upload_error, source_url, is_ocr_required, ocr_status, ocr_job_id, ocr_error, extracted_text, \
     classification_confidence, ai_metadata, is_locked, lock_reason, locked_at, created_at, updated_at";

impl Document {
    pub fn upload_state(&self) -> UploadStatus {
        UploadStatus::from_db_str(&self.upload_status)
    }

    pub fn ocr_state(&self) -> OcrStatus {
        OcrStatus::from_db_str(&self.ocr_status)
    }

    pub fn has_extracted_text(&self) -> bool {
        self.extracted_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// Wire shape of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub advocate_id: Uuid,
    pub category: DocumentCategory,
    pub title: String,
    pub description: Option<String>,
    pub s3_key: String,
    pub s3_bucket: String,
    pub s3_version_id: Option<String>,
    pub file_size: i64,
    pub content_type: String,
    pub checksum_md5: Option<String>,
    pub upload_status: UploadStatus,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub upload_error: Option<String>,
    pub source_url: Option<String>,
    pub is_ocr_required: bool,
    pub ocr_status: OcrStatus,
    pub ocr_job_id: Option<String>,
    pub ocr_error: Option<String>,
    pub extracted_text: Option<String>,
    pub classification_confidence: Option<f64>,
    pub ai_metadata: Option<AiMetadata>,
    pub is_locked: bool,
    pub lock_reason: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(d: Document) -> Self {
        // Metadata that no longer matches the typed shape is dropped from the wire view.
        let ai_metadata = d
            .ai_metadata
            .and_then(|v| serde_json::from_value::<AiMetadata>(v).ok());
        Self {
            id: d.id,
            case_id: d.case_id,
            advocate_id: d.advocate_id,
            category: DocumentCategory::from_db_str(&d.category),
            title: d.title,
            description: d.description,
            s3_key: d.s3_key,
            s3_bucket: d.s3_bucket,
            s3_version_id: d.s3_version_id,
            file_size: d.file_size,
            content_type: d.content_type,
            checksum_md5: d.checksum_md5,
            upload_status: UploadStatus::from_db_str(&d.upload_status),
            uploaded_at: d.uploaded_at,
            upload_error: d.upload_error,
            source_url: d.source_url,
            is_ocr_required: d.is_ocr_required,
            ocr_status: OcrStatus::from_db_str(&d.ocr_status),
            ocr_job_id: d.ocr_job_id,
            ocr_error: d.ocr_error,
            extracted_text: d.extracted_text,
            classification_confidence: d.classification_confidence,
            ai_metadata,
            is_locked: d.is_locked,
            lock_reason: d.lock_reason,
            locked_at: d.locked_at,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

impl From<DocumentResponse> for Document {
    fn from(d: DocumentResponse) -> Self {
        Self {
            id: d.id,
            case_id: d.case_id,
            advocate_id: d.advocate_id,
            category: d.category.as_db_str().to_string(),
            title: d.title,
            description: d.description,
            s3_key: d.s3_key,
            s3_bucket: d.s3_bucket,
            s3_version_id: d.s3_version_id,
            file_size: d.file_size,
            content_type: d.content_type,
            checksum_md5: d.checksum_md5,
            upload_status: d.upload_status.as_db_str().to_string(),
            uploaded_at: d.uploaded_at,
            upload_error: d.upload_error,
            source_url: d.source_url,
            is_ocr_required: d.is_ocr_required,
            ocr_status: d.ocr_status.as_db_str().to_string(),
            ocr_job_id: d.ocr_job_id,
            ocr_error: d.ocr_error,
            extracted_text: d.extracted_text,
            classification_confidence: d.classification_confidence,
            ai_metadata: d
                .ai_metadata
                .and_then(|m| serde_json::to_value(m).ok()),
            is_locked: d.is_locked,
            lock_reason: d.lock_reason,
            locked_at: d.locked_at,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

/// Per-case document figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub total: i64,
    pub by_category: std::collections::BTreeMap<String, i64>,
    pub by_upload_status: std::collections::BTreeMap<String, i64>,
    pub by_ocr_status: std::collections::BTreeMap<String, i64>,
    pub total_size: i64,
    pub average_size: i64,
    pub locked: i64,
    pub requires_ocr: i64,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

pub const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

/// Request an upload slot for a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct InitiateUploadRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 255, message = "File name is required"))
    )]
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 1, message = "File size must be positive"))
    )]
    pub file_size: i64,
    #[serde(default)]
    pub category: DocumentCategory,
    /// Defaults to the file name.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_ocr_required: bool,
    #[serde(default)]
    pub checksum_md5: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// A document row plus the presigned destination the client writes the bytes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UploadSlotResponse {
    pub document: DocumentResponse,
    pub upload_url: String,
    pub required_headers: HashMap<String, String>,
    pub expires_in_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlResponse {
    pub url: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct FailRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Error message is required"))
    )]
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct StartOcrRequest {
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct CompleteOcrRequest {
    pub extracted_text: String,
    #[serde(default)]
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 0.0, max = 1.0, message = "Confidence must be between 0 and 1"))
    )]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct LockDocumentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 255, message = "Title cannot be empty"))
    )]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DocumentCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_metadata: Option<AiMetadata>,
}

/// Query parameters for the per-case document listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[serde(rename_all = "camelCase")]
pub struct DocumentListParams {
    pub category: Option<DocumentCategory>,
    pub upload_status: Option<UploadStatus>,
    pub ocr_status: Option<OcrStatus>,
}

/// Turn a client-supplied file name into a safe object-key segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}
