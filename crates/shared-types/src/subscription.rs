use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const BYTES_PER_GIB: i64 = 1024 * 1024 * 1024;

/// Subscription plan. Limits are static per plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    #[default]
    Free,
    Professional,
    Enterprise,
}

impl Plan {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Professional => "PROFESSIONAL",
            Plan::Enterprise => "ENTERPRISE",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "PROFESSIONAL" => Plan::Professional,
            "ENTERPRISE" => Plan::Enterprise,
            _ => Plan::Free,
        }
    }

    pub fn limits(&self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits {
                cases: Limit::Bounded(5),
                documents: Limit::Bounded(20),
                storage_bytes: Limit::Bounded(BYTES_PER_GIB),
                ai_analyses: Limit::Bounded(10),
            },
            Plan::Professional => PlanLimits {
                cases: Limit::Unlimited,
                documents: Limit::Unlimited,
                storage_bytes: Limit::Bounded(50 * BYTES_PER_GIB),
                ai_analyses: Limit::Unlimited,
            },
            Plan::Enterprise => PlanLimits {
                cases: Limit::Unlimited,
                documents: Limit::Unlimited,
                storage_bytes: Limit::Unlimited,
                ai_analyses: Limit::Unlimited,
            },
        }
    }

    /// List price in paise.
    pub fn price_paise(&self, cycle: BillingCycle) -> i64 {
        let rupees = match (self, cycle) {
            (Plan::Free, _) => 0,
            (Plan::Professional, BillingCycle::Monthly) => 999,
            (Plan::Professional, BillingCycle::Annual) => 9_990,
            (Plan::Enterprise, BillingCycle::Monthly) => 4_999,
            (Plan::Enterprise, BillingCycle::Annual) => 49_990,
        };
        rupees * 100
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Trialing,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Trialing => "TRIALING",
            SubscriptionStatus::PastDue => "PAST_DUE",
            SubscriptionStatus::Cancelled => "CANCELLED",
            SubscriptionStatus::Expired => "EXPIRED",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "TRIALING" => SubscriptionStatus::Trialing,
            "PAST_DUE" => SubscriptionStatus::PastDue,
            "CANCELLED" => SubscriptionStatus::Cancelled,
            "EXPIRED" => SubscriptionStatus::Expired,
            _ => SubscriptionStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Annual,
}

impl BillingCycle {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "MONTHLY",
            BillingCycle::Annual => "ANNUAL",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "ANNUAL" => BillingCycle::Annual,
            _ => BillingCycle::Monthly,
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Annual => 12,
        }
    }
}

// ── Limits ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Unlimited,
    Bounded(i64),
}

impl Limit {
    pub fn is_reached(&self, used: i64) -> bool {
        match self {
            Limit::Unlimited => false,
            Limit::Bounded(max) => used >= *max,
        }
    }

    /// Whether `incoming` more units still fit under the limit.
    pub fn admits(&self, used: i64, incoming: i64) -> bool {
        match self {
            Limit::Unlimited => true,
            Limit::Bounded(max) => used.saturating_add(incoming) <= *max,
        }
    }

    /// Share of the limit used, capped at 100. Always 0 when unlimited.
    pub fn percentage(&self, used: i64) -> f64 {
        match self {
            Limit::Unlimited => 0.0,
            Limit::Bounded(max) if *max <= 0 => 100.0,
            Limit::Bounded(max) => (used as f64 * 100.0 / *max as f64).min(100.0),
        }
    }

    /// `None` on the wire means unlimited.
    pub fn as_option(&self) -> Option<i64> {
        match self {
            Limit::Unlimited => None,
            Limit::Bounded(max) => Some(*max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum UsageMetric {
    Cases,
    Documents,
    Storage,
    AiAnalyses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub cases: Limit,
    pub documents: Limit,
    pub storage_bytes: Limit,
    pub ai_analyses: Limit,
}

impl PlanLimits {
    pub fn for_metric(&self, metric: UsageMetric) -> Limit {
        match metric {
            UsageMetric::Cases => self.cases,
            UsageMetric::Documents => self.documents,
            UsageMetric::Storage => self.storage_bytes,
            UsageMetric::AiAnalyses => self.ai_analyses,
        }
    }
}

/// Counters for one advocate in one billing period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    pub cases_count: i64,
    pub documents_count: i64,
    pub storage_used_bytes: i64,
    pub ai_analyses_used: i64,
}

impl UsageCounters {
    pub fn used(&self, metric: UsageMetric) -> i64 {
        match metric {
            UsageMetric::Cases => self.cases_count,
            UsageMetric::Documents => self.documents_count,
            UsageMetric::Storage => self.storage_used_bytes,
            UsageMetric::AiAnalyses => self.ai_analyses_used,
        }
    }

    pub fn is_limit_reached(&self, plan: Plan, metric: UsageMetric) -> bool {
        plan.limits().for_metric(metric).is_reached(self.used(metric))
    }

    pub fn would_exceed(&self, plan: Plan, metric: UsageMetric, incoming: i64) -> bool {
        !plan.limits().for_metric(metric).admits(self.used(metric), incoming)
    }

    pub fn usage_percentage(&self, plan: Plan, metric: UsageMetric) -> f64 {
        plan.limits().for_metric(metric).percentage(self.used(metric))
    }
}

/// Billing periods are calendar months in UTC: `[start, end)`.
pub fn billing_period(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or(now.date_naive());
    let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
    (midnight(first), midnight(next))
}

fn midnight(d: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap_or_default())
}

// ── Rows + wire ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct Subscription {
    pub id: Uuid,
    pub advocate_id: Uuid,
    pub plan: String,
    pub status: String,
    pub billing_cycle: String,
    pub amount: i64,
    pub currency: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const SUBSCRIPTION_COLUMNS: &str = "id, advocate_id, plan, status, billing_cycle, amount, \
     currency, start_date, end_date, auto_renew, created_at, updated_at";

impl Subscription {
    pub fn plan(&self) -> Plan {
        Plan::from_db_str(&self.plan)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub advocate_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            advocate_id: s.advocate_id,
            plan: Plan::from_db_str(&s.plan),
            status: SubscriptionStatus::from_db_str(&s.status),
            billing_cycle: BillingCycle::from_db_str(&s.billing_cycle),
            amount: s.amount,
            currency: s.currency,
            start_date: s.start_date,
            end_date: s.end_date,
            auto_renew: s.auto_renew,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

impl From<SubscriptionResponse> for Subscription {
    fn from(s: SubscriptionResponse) -> Self {
        Self {
            id: s.id,
            advocate_id: s.advocate_id,
            plan: s.plan.as_db_str().to_string(),
            status: s.status.as_db_str().to_string(),
            billing_cycle: s.billing_cycle.as_db_str().to_string(),
            amount: s.amount,
            currency: s.currency,
            start_date: s.start_date,
            end_date: s.end_date,
            auto_renew: s.auto_renew,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanRequest {
    pub plan: Plan,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MetricUsage {
    pub used: i64,
    /// `null` when the plan has no limit for this metric.
    pub limit: Option<i64>,
    pub reached: bool,
    pub percentage: f64,
}

impl MetricUsage {
    pub fn compute(counters: &UsageCounters, plan: Plan, metric: UsageMetric) -> Self {
        let limit = plan.limits().for_metric(metric);
        let used = counters.used(metric);
        Self {
            used,
            limit: limit.as_option(),
            reached: limit.is_reached(used),
            percentage: limit.percentage(used),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub plan: Plan,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub counters: UsageCounters,
    pub cases: MetricUsage,
    pub documents: MetricUsage,
    pub storage: MetricUsage,
    pub ai_analyses: MetricUsage,
}

impl UsageResponse {
    pub fn build(
        plan: Plan,
        period: (DateTime<Utc>, DateTime<Utc>),
        counters: UsageCounters,
    ) -> Self {
        Self {
            plan,
            period_start: period.0,
            period_end: period.1,
            cases: MetricUsage::compute(&counters, plan, UsageMetric::Cases),
            documents: MetricUsage::compute(&counters, plan, UsageMetric::Documents),
            storage: MetricUsage::compute(&counters, plan, UsageMetric::Storage),
            ai_analyses: MetricUsage::compute(&counters, plan, UsageMetric::AiAnalyses),
            counters,
        }
    }
}
