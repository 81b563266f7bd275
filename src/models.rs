use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;

/// Overall health of a check or service. Aggregation precedence is
/// non-linear (see `engine::aggregate_status`), so this enum carries no
/// ordering of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Green,
    Yellow,
    Red,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Web,
    Cronjob,
    Docker,
    #[default]
    Unknown,
}

/// Outcome of a single check run. `response_time_ms` is set on every HTTP
/// outcome, including failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub name: String,
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

/// A non-info log line surfaced to the UI's error list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Extracted `YYYY-MM-DD HH:MM:SS` timestamp, empty when the line has none.
    pub timestamp: String,
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    /// 1-based position in the original file, not in the returned window.
    pub line_number: usize,
    pub level: Level,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFileSection {
    pub file_name: String,
    pub lines: Vec<LogLine>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub slug: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub tech_stack: Vec<String>,
    pub deployment_type: Vec<String>,
    pub status: Status,
    pub checks: Vec<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    pub last_checked: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetail {
    #[serde(flatten)]
    pub summary: ServiceSummary,
    /// Non-info entries pooled across all log-freshness checks.
    pub errors: Vec<LogEntry>,
    /// Raw tails, one `=== <path> ===` block per log file.
    pub recent_logs: String,
    pub log_sections: Vec<LogFileSection>,
    pub config: Option<ServiceConfig>,
}

/// Latest poll snapshot, shared between the engine loop and the API.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub services: Vec<ServiceSummary>,
}
