use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current version of the stored analysis payload.
pub const ANALYSIS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Processing => "PROCESSING",
            AnalysisStatus::Completed => "COMPLETED",
            AnalysisStatus::Failed => "FAILED",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "COMPLETED" => AnalysisStatus::Completed,
            "FAILED" => AnalysisStatus::Failed,
            _ => AnalysisStatus::Processing,
        }
    }
}

/// AI-assigned priority of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum UrgencyLevel {
    #[serde(rename = "LOW", alias = "low", alias = "Low")]
    Low,
    #[serde(rename = "MEDIUM", alias = "medium", alias = "Medium")]
    Medium,
    #[serde(rename = "HIGH", alias = "high", alias = "High")]
    High,
    #[serde(rename = "CRITICAL", alias = "critical", alias = "Critical")]
    Critical,
}

impl UrgencyLevel {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Low => "LOW",
            UrgencyLevel::Medium => "MEDIUM",
            UrgencyLevel::High => "HIGH",
            UrgencyLevel::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(UrgencyLevel::Low),
            "MEDIUM" => Some(UrgencyLevel::Medium),
            "HIGH" => Some(UrgencyLevel::High),
            "CRITICAL" => Some(UrgencyLevel::Critical),
            _ => None,
        }
    }
}

// ── Payload ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PrecedentCase {
    pub name: String,
    #[serde(default)]
    pub citation: String,
    #[serde(default)]
    pub relevance: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DeadlineReminder {
    pub task: String,
    /// Free-form as returned by the model (usually `YYYY-MM-DD`).
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub description: String,
}

fn default_schema_version() -> u32 {
    ANALYSIS_SCHEMA_VERSION
}

/// Structured legal analysis of a case. Validated before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    /// Absent in replies from older prompts; read as version 1.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub case_type_classification: String,
    #[serde(default)]
    pub key_legal_issues: Vec<String>,
    #[serde(default)]
    pub relevant_statutes: Vec<String>,
    #[serde(default)]
    pub precedent_cases: Vec<PrecedentCase>,
    #[serde(default)]
    pub action_items: Vec<String>,
    pub urgency_level: UrgencyLevel,
    #[serde(default)]
    pub deadline_reminders: Vec<DeadlineReminder>,
    pub case_summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error("model reply contained no JSON object")]
    NoJson,
    #[error("malformed analysis JSON: {0}")]
    Malformed(String),
    #[error("unsupported analysis schema version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid analysis: {0}")]
    Invalid(&'static str),
}

impl AnalysisPayload {
    /// Parse the reasoning service's reply.
    ///
    /// Accepts a bare JSON object, one wrapped in a Markdown code fence, or one
    /// surrounded by prose. The outermost `{ ... }` span is used.
    pub fn parse_model_reply(reply: &str) -> Result<Self, PayloadError> {
        let body = strip_code_fence(reply.trim());
        let start = body.find('{').ok_or(PayloadError::NoJson)?;
        let end = body.rfind('}').ok_or(PayloadError::NoJson)?;
        if end < start {
            return Err(PayloadError::NoJson);
        }
        let payload: Self = serde_json::from_str(&body[start..=end])
            .map_err(|e| PayloadError::Malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Decode a payload previously written to the `analysis` column.
    pub fn from_stored(value: serde_json::Value) -> Result<Self, PayloadError> {
        let payload: Self =
            serde_json::from_value(value).map_err(|e| PayloadError::Malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn to_stored(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.schema_version != ANALYSIS_SCHEMA_VERSION {
            return Err(PayloadError::UnsupportedVersion(self.schema_version));
        }
        if self.case_summary.trim().is_empty() {
            return Err(PayloadError::Invalid("caseSummary is empty"));
        }
        Ok(())
    }
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string (```json) on the opening line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    match rest.rfind("```") {
        Some(end) => &rest[..end],
        None => rest,
    }
}

/// Rough token count used for metering: one token per four characters.
pub fn estimate_tokens(chars: usize) -> i32 {
    i32::try_from(chars.div_ceil(4)).unwrap_or(i32::MAX)
}

// ── Row + wire ──────────────────────────────────────────────────────

/// The single analysis record of a case. Doubles as the worker's job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct AiAnalysis {
    pub id: Uuid,
    pub case_id: Uuid,
    pub advocate_id: Uuid,
    pub status: String,
    pub model_version: String,
    pub analysis: Option<serde_json::Value>,
    pub urgency_level: Option<String>,
    pub case_summary: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processing_time_seconds: Option<i32>,
    pub token_count: Option<i32>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ANALYSIS_COLUMNS: &str = "id, case_id, advocate_id, status, model_version, analysis, \
     urgency_level, case_summary, processed_at, processing_time_seconds, token_count, \
     error_message, retry_count, lease_owner, lease_expires_at, attempts, created_at, updated_at";

impl AiAnalysis {
    pub fn state(&self) -> AnalysisStatus {
        AnalysisStatus::from_db_str(&self.status)
    }
}

/// Wire shape of an analysis. Worker lease bookkeeping is not exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysisResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub status: AnalysisStatus,
    pub model_version: String,
    pub analysis: Option<AnalysisPayload>,
    pub urgency_level: Option<UrgencyLevel>,
    pub case_summary: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processing_time_seconds: Option<i32>,
    pub token_count: Option<i32>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AiAnalysis> for AiAnalysisResponse {
    type Error = PayloadError;

    fn try_from(a: AiAnalysis) -> Result<Self, Self::Error> {
        let analysis = a.analysis.map(AnalysisPayload::from_stored).transpose()?;
        Ok(Self {
            id: a.id,
            case_id: a.case_id,
            status: AnalysisStatus::from_db_str(&a.status),
            model_version: a.model_version,
            analysis,
            urgency_level: a.urgency_level.as_deref().and_then(UrgencyLevel::parse),
            case_summary: a.case_summary,
            processed_at: a.processed_at,
            processing_time_seconds: a.processing_time_seconds,
            token_count: a.token_count,
            error_message: a.error_message,
            retry_count: a.retry_count,
            created_at: a.created_at,
            updated_at: a.updated_at,
        })
    }
}

// ── Document chat ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Question about a single document's extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 4000, message = "Message must be 1 to 4000 characters"))
    )]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub document_title: String,
    pub model: String,
    /// Estimated from prompt, context and reply lengths.
    pub token_count: i32,
}
