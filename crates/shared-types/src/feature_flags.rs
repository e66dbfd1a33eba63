use serde::{Deserialize, Serialize};

/// Feature flags controlling optional behaviour.
///
/// Loaded from `config.toml` at server startup. A missing or partial file
/// leaves telemetry and the strict case workflow off and the analysis worker
/// on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureFlags {
    #[serde(default)]
    pub telemetry: bool,
    /// Reject case status changes outside the transition table. Off by
    /// default: advocates may move a case to any status.
    #[serde(default)]
    pub strict_case_transitions: bool,
    /// Run the in-process analysis worker. Disable on API-only replicas.
    #[serde(default = "default_true")]
    pub analysis_worker: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            telemetry: false,
            strict_case_transitions: false,
            analysis_worker: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Tuning for the analysis orchestrator and its worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Token ceiling passed to the reasoning service for case analysis.
    pub max_tokens: u32,
    /// Upper bound on extracted text sent as context, in characters.
    pub context_char_cap: usize,
    pub chat_max_tokens: u32,
    pub chat_context_char_cap: usize,
    pub lease_secs: u64,
    pub poll_interval_secs: u64,
    /// Lease expiries tolerated before a job is failed.
    pub max_attempts: i32,
    pub request_timeout_secs: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            context_char_cap: 100_000,
            chat_max_tokens: 4096,
            chat_context_char_cap: 50_000,
            lease_secs: 300,
            poll_interval_secs: 5,
            max_attempts: 3,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadSettings {
    pub max_upload_bytes: usize,
    pub presign_expiry_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            presign_expiry_secs: 900,
        }
    }
}

/// Top-level config file structure matching `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub uploads: UploadSettings,
}
