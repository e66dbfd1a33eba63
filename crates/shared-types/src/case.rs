use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "validation")]
use validator::Validate;

use crate::common::SortOrder;

// ── Enums ───────────────────────────────────────────────────────────

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    #[default]
    Filed,
    Registered,
    Pending,
    Disposed,
    Transferred,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 5] = [
        CaseStatus::Filed,
        CaseStatus::Registered,
        CaseStatus::Pending,
        CaseStatus::Disposed,
        CaseStatus::Transferred,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            CaseStatus::Filed => "FILED",
            CaseStatus::Registered => "REGISTERED",
            CaseStatus::Pending => "PENDING",
            CaseStatus::Disposed => "DISPOSED",
            CaseStatus::Transferred => "TRANSFERRED",
        }
    }

    /// Parse from database TEXT column. Unknown values default to Filed.
    pub fn from_db_str(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    /// Strict parse, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_db_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Whether an advocate may move a case from `self` to `next`.
    ///
    /// Keeping the same status is always allowed. Disposed and transferred
    /// cases can only come back as pending (restoration) or registered.
    pub fn can_transition_to(&self, next: CaseStatus) -> bool {
        use CaseStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Filed, Registered | Pending | Disposed | Transferred)
                | (Registered, Pending | Disposed | Transferred)
                | (Pending, Registered | Disposed | Transferred)
                | (Disposed, Pending)
                | (Transferred, Registered | Pending)
        )
    }
}

/// Which side of the matter the advocate appears for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyRole {
    #[default]
    Petitioner,
    Respondent,
    Appellant,
    Appellee,
    Intervenor,
    Other,
}

impl PartyRole {
    pub const ALL: [PartyRole; 6] = [
        PartyRole::Petitioner,
        PartyRole::Respondent,
        PartyRole::Appellant,
        PartyRole::Appellee,
        PartyRole::Intervenor,
        PartyRole::Other,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            PartyRole::Petitioner => "PETITIONER",
            PartyRole::Respondent => "RESPONDENT",
            PartyRole::Appellant => "APPELLANT",
            PartyRole::Appellee => "APPELLEE",
            PartyRole::Intervenor => "INTERVENOR",
            PartyRole::Other => "OTHER",
        }
    }

    /// Parse from database TEXT column. Unknown values default to Other.
    pub fn from_db_str(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|r| r.as_db_str() == s)
            .unwrap_or(PartyRole::Other)
    }
}

/// Columns a case listing may be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum CaseSortField {
    #[default]
    UpdatedAt,
    CreatedAt,
    EfilingDate,
    NextHearingDate,
    CaseYear,
    CaseNumber,
    EfilingNumber,
}

impl CaseSortField {
    pub fn column(&self) -> &'static str {
        match self {
            CaseSortField::UpdatedAt => "updated_at",
            CaseSortField::CreatedAt => "created_at",
            CaseSortField::EfilingDate => "efiling_date",
            CaseSortField::NextHearingDate => "next_hearing_date",
            CaseSortField::CaseYear => "case_year",
            CaseSortField::CaseNumber => "case_number",
            CaseSortField::EfilingNumber => "efiling_number",
        }
    }
}

// ── DB row struct ───────────────────────────────────────────────────

/// A case record as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct Case {
    pub id: Uuid,
    pub advocate_id: Uuid,
    pub case_number: Option<String>,
    pub efiling_number: String,
    pub case_type: String,
    pub case_year: i32,
    /// PartyRole stored as text.
    pub party_role: String,
    pub petitioner_name: String,
    pub respondent_name: String,
    pub efiling_date: NaiveDate,
    pub efiling_details: Option<String>,
    pub bench_type: Option<String>,
    pub judge_name: Option<String>,
    pub court_number: Option<String>,
    /// CaseStatus stored as text.
    pub status: String,
    pub next_hearing_date: Option<NaiveDate>,
    pub is_visible: bool,
    pub transferred_reason: Option<String>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const CASE_COLUMNS: &str = "id, advocate_id, case_number, efiling_number, case_type, case_year, \
     party_role, petitioner_name, respondent_name, efiling_date, efiling_details, bench_type, \
     judge_name, court_number, status, next_hearing_date, is_visible, transferred_reason, \
     transferred_at, source_url, last_synced_at, sync_status, created_at, updated_at";

// ── API response types ──────────────────────────────────────────────

/// Wire shape of a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CaseResponse {
    pub id: Uuid,
    pub advocate_id: Uuid,
    pub case_number: Option<String>,
    pub efiling_number: String,
    pub case_type: String,
    pub case_year: i32,
    pub party_role: PartyRole,
    pub petitioner_name: String,
    pub respondent_name: String,
    pub efiling_date: NaiveDate,
    pub efiling_details: Option<String>,
    pub bench_type: Option<String>,
    pub judge_name: Option<String>,
    pub court_number: Option<String>,
    pub status: CaseStatus,
    pub next_hearing_date: Option<NaiveDate>,
    pub is_visible: bool,
    pub transferred_reason: Option<String>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Case> for CaseResponse {
    fn from(c: Case) -> Self {
        Self {
            id: c.id,
            advocate_id: c.advocate_id,
            case_number: c.case_number,
            efiling_number: c.efiling_number,
            case_type: c.case_type,
            case_year: c.case_year,
            party_role: PartyRole::from_db_str(&c.party_role),
            petitioner_name: c.petitioner_name,
            respondent_name: c.respondent_name,
            efiling_date: c.efiling_date,
            efiling_details: c.efiling_details,
            bench_type: c.bench_type,
            judge_name: c.judge_name,
            court_number: c.court_number,
            status: CaseStatus::from_db_str(&c.status),
            next_hearing_date: c.next_hearing_date,
            is_visible: c.is_visible,
            transferred_reason: c.transferred_reason,
            transferred_at: c.transferred_at,
            source_url: c.source_url,
            last_synced_at: c.last_synced_at,
            sync_status: c.sync_status,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl From<CaseResponse> for Case {
    fn from(c: CaseResponse) -> Self {
        Self {
            id: c.id,
            advocate_id: c.advocate_id,
            case_number: c.case_number,
            efiling_number: c.efiling_number,
            case_type: c.case_type,
            case_year: c.case_year,
            party_role: c.party_role.as_db_str().to_string(),
            petitioner_name: c.petitioner_name,
            respondent_name: c.respondent_name,
            efiling_date: c.efiling_date,
            efiling_details: c.efiling_details,
            bench_type: c.bench_type,
            judge_name: c.judge_name,
            court_number: c.court_number,
            status: c.status.as_db_str().to_string(),
            next_hearing_date: c.next_hearing_date,
            is_visible: c.is_visible,
            transferred_reason: c.transferred_reason,
            transferred_at: c.transferred_at,
            source_url: c.source_url,
            last_synced_at: c.last_synced_at,
            sync_status: c.sync_status,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Aggregate figures for the advocate's dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CaseStats {
    pub total: i64,
    pub pending: i64,
    pub disposed: i64,
    pub upcoming_hearings: i64,
    pub total_documents: i64,
    /// Keyed by status; every status is present, zero when unused.
    pub by_status: std::collections::BTreeMap<String, i64>,
    pub by_type: std::collections::BTreeMap<String, i64>,
    pub monthly_trend: Vec<MonthlyCount>,
}

/// Cases filed in one calendar month (`YYYY-MM`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct MonthlyCount {
    pub month: String,
    pub count: i64,
}

/// A case together with everything attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CaseDetailResponse {
    #[serde(flatten)]
    pub case: CaseResponse,
    pub documents: Vec<crate::DocumentResponse>,
    /// Newest first.
    pub history: Vec<crate::CaseHistoryResponse>,
    pub analysis: Option<crate::AiAnalysisResponse>,
}

// ── Request types ───────────────────────────────────────────────────

/// Request to create a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 100, message = "E-filing number is required"))
    )]
    pub efiling_number: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 50, message = "Case type is required"))
    )]
    pub case_type: String,
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 1950, max = 2100, message = "Case year must be between 1950 and 2100"))
    )]
    pub case_year: i32,
    pub party_role: PartyRole,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Petitioner name is required"))
    )]
    pub petitioner_name: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Respondent name is required"))
    )]
    pub respondent_name: String,
    pub efiling_date: NaiveDate,
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default)]
    pub efiling_details: Option<String>,
    #[serde(default)]
    pub bench_type: Option<String>,
    #[serde(default)]
    pub judge_name: Option<String>,
    #[serde(default)]
    pub court_number: Option<String>,
    #[serde(default)]
    pub status: Option<CaseStatus>,
    #[serde(default)]
    pub next_hearing_date: Option<NaiveDate>,
}

/// Partial update; only provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct UpdateCaseRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Case type cannot be empty"))
    )]
    pub case_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 1950, max = 2100, message = "Case year must be between 1950 and 2100"))
    )]
    pub case_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_role: Option<PartyRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Petitioner name cannot be empty"))
    )]
    pub petitioner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Respondent name cannot be empty"))
    )]
    pub respondent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efiling_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bench_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub court_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CaseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hearing_date: Option<NaiveDate>,
}

impl UpdateCaseRequest {
    pub fn is_empty(&self) -> bool {
        self.case_number.is_none()
            && self.case_type.is_none()
            && self.case_year.is_none()
            && self.party_role.is_none()
            && self.petitioner_name.is_none()
            && self.respondent_name.is_none()
            && self.efiling_details.is_none()
            && self.bench_type.is_none()
            && self.judge_name.is_none()
            && self.court_number.is_none()
            && self.status.is_none()
            && self.next_hearing_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct TransferCaseRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Transfer reason is required"))
    )]
    pub reason: String,
}

/// A case record pulled from the court's public registry.
///
/// Upserted by (advocate, e-filing number). Status is taken as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
#[serde(rename_all = "camelCase")]
pub struct SyncCaseRequest {
    #[cfg_attr(feature = "validation", validate(nested))]
    #[serde(flatten)]
    pub case: CreateCaseRequest,
    pub status: CaseStatus,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Query parameters for the case listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[serde(rename_all = "camelCase")]
pub struct CaseListParams {
    /// Status filter; `all` or absent means no filter.
    pub status: Option<String>,
    pub case_type: Option<String>,
    pub case_year: Option<i32>,
    pub party_role: Option<PartyRole>,
    /// Matches case number, e-filing number and party names.
    pub search: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub sort: Option<CaseSortField>,
    pub order: Option<SortOrder>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl CaseListParams {
    /// Resolve the status filter. `Ok(None)` means every status.
    pub fn status_filter(&self) -> Result<Option<CaseStatus>, String> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
            Some(s) => CaseStatus::parse(s)
                .map(Some)
                .ok_or_else(|| format!("Unknown case status '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct UpcomingHearingsParams {
    /// Look-ahead window in days, 1 to 90 (default 7).
    pub days: Option<i64>,
}
