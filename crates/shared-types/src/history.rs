use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEventType {
    Filing,
    Registration,
    Hearing,
    Order,
    Judgment,
    Adjournment,
    Transfer,
    Disposal,
    #[default]
    Other,
}

impl HistoryEventType {
    pub const ALL: [HistoryEventType; 9] = [
        HistoryEventType::Filing,
        HistoryEventType::Registration,
        HistoryEventType::Hearing,
        HistoryEventType::Order,
        HistoryEventType::Judgment,
        HistoryEventType::Adjournment,
        HistoryEventType::Transfer,
        HistoryEventType::Disposal,
        HistoryEventType::Other,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            HistoryEventType::Filing => "FILING",
            HistoryEventType::Registration => "REGISTRATION",
            HistoryEventType::Hearing => "HEARING",
            HistoryEventType::Order => "ORDER",
            HistoryEventType::Judgment => "JUDGMENT",
            HistoryEventType::Adjournment => "ADJOURNMENT",
            HistoryEventType::Transfer => "TRANSFER",
            HistoryEventType::Disposal => "DISPOSAL",
            HistoryEventType::Other => "OTHER",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|e| e.as_db_str() == s)
            .unwrap_or_default()
    }

    /// Event recorded when a case moves into `status`.
    pub fn for_status_change(status: crate::CaseStatus) -> Self {
        use crate::CaseStatus;
        match status {
            CaseStatus::Filed => HistoryEventType::Filing,
            CaseStatus::Registered => HistoryEventType::Registration,
            CaseStatus::Pending => HistoryEventType::Other,
            CaseStatus::Disposed => HistoryEventType::Disposal,
            CaseStatus::Transferred => HistoryEventType::Transfer,
        }
    }
}

/// One entry in a case's timeline. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct CaseHistory {
    pub id: Uuid,
    pub case_id: Uuid,
    pub event_type: String,
    pub event_date: NaiveDate,
    pub business_recorded: Option<String>,
    pub judge_name: Option<String>,
    pub bench_type: Option<String>,
    pub court_number: Option<String>,
    pub next_hearing_date: Option<NaiveDate>,
    pub order_document_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

pub const HISTORY_COLUMNS: &str = "id, case_id, event_type, event_date, business_recorded, \
     judge_name, bench_type, court_number, next_hearing_date, order_document_id, created_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CaseHistoryResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub event_type: HistoryEventType,
    pub event_date: NaiveDate,
    pub business_recorded: Option<String>,
    pub judge_name: Option<String>,
    pub bench_type: Option<String>,
    pub court_number: Option<String>,
    pub next_hearing_date: Option<NaiveDate>,
    pub order_document_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<CaseHistory> for CaseHistoryResponse {
    fn from(h: CaseHistory) -> Self {
        Self {
            id: h.id,
            case_id: h.case_id,
            event_type: HistoryEventType::from_db_str(&h.event_type),
            event_date: h.event_date,
            business_recorded: h.business_recorded,
            judge_name: h.judge_name,
            bench_type: h.bench_type,
            court_number: h.court_number,
            next_hearing_date: h.next_hearing_date,
            order_document_id: h.order_document_id,
            created_at: h.created_at,
        }
    }
}

/// Append an event. Judge, bench and court default to the case's current values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateHistoryRequest {
    pub event_type: HistoryEventType,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub business_recorded: Option<String>,
    #[serde(default)]
    pub judge_name: Option<String>,
    #[serde(default)]
    pub bench_type: Option<String>,
    #[serde(default)]
    pub court_number: Option<String>,
    /// Also moves the case's next hearing date when set.
    #[serde(default)]
    pub next_hearing_date: Option<NaiveDate>,
    #[serde(default)]
    pub order_document_id: Option<Uuid>,
}
