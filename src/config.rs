use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::ServiceType;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    pub services: HashMap<String, ServiceConfig>,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Directory names under the base path that are never listed as services.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_check_interval() -> u64 { 60 }
fn default_api_port() -> u16 { 3000 }
fn default_max_concurrency() -> usize { 32 }

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            services: HashMap::new(),
            check_interval: default_check_interval(),
            api_port: default_api_port(),
            max_concurrency: default_max_concurrency(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub service_type: ServiceType,
    #[serde(default)]
    pub url: Option<String>,
    pub checks: Vec<CheckConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum CheckConfig {
    Http {
        name: String,
        url: String,
        #[serde(default = "default_expected_status")]
        expected_status: u16,
        #[serde(default = "default_http_timeout")]
        timeout_ms: u64,
    },
    LogFreshness {
        name: String,
        log_path: PathBuf,
        max_age_minutes: i64,
    },
}

pub fn default_expected_status() -> u16 { 200 }
pub fn default_http_timeout() -> u64 { 10_000 }

/// Root under which project directories are discovered. The environment
/// wins; the fallback is the dashboard's own parent directory.
pub fn projects_base_path() -> PathBuf {
    match std::env::var("PROJECTS_BASE_PATH") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => std::env::current_dir()
            .map(|d| d.join(".."))
            .unwrap_or_else(|_| PathBuf::from("..")),
    }
}

fn resolve_base_paths(raw: &str, base: &str) -> String {
    raw.replace("{BASE}", base)
}

pub fn load_config(path: &Path) -> Result<DashboardConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let base = projects_base_path();
    let resolved = resolve_base_paths(&raw, &base.to_string_lossy());
    serde_json::from_str(&resolved)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "checkInterval": 30,
        "services": {
            "trading_bot": {
                "displayName": "Trading Bot",
                "description": "Fetches quotes on a schedule",
                "type": "cronjob",
                "checks": [
                    { "type": "http", "name": "API", "url": "http://localhost:8080/health" },
                    { "type": "log-freshness", "name": "Fetcher", "logPath": "/var/log/bot.log", "maxAgeMinutes": 15 }
                ]
            }
        }
    }"#;

    #[test]
    fn parses_tagged_checks_with_defaults() {
        let config: DashboardConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.check_interval, 30);
        assert_eq!(config.api_port, 3000);

        let svc = &config.services["trading_bot"];
        assert_eq!(svc.display_name, "Trading Bot");
        assert_eq!(svc.service_type, ServiceType::Cronjob);
        assert_eq!(svc.checks.len(), 2);

        match &svc.checks[0] {
            CheckConfig::Http { expected_status, timeout_ms, .. } => {
                assert_eq!(*expected_status, 200);
                assert_eq!(*timeout_ms, 10_000);
            }
            other => panic!("expected http check, got {other:?}"),
        }
        match &svc.checks[1] {
            CheckConfig::LogFreshness { log_path, max_age_minutes, .. } => {
                assert_eq!(log_path, &PathBuf::from("/var/log/bot.log"));
                assert_eq!(*max_age_minutes, 15);
            }
            other => panic!("expected log-freshness check, got {other:?}"),
        }
    }

    #[test]
    fn substitutes_base_placeholder() {
        let raw = r#"{"logPath": "{BASE}/bot/logs/out.log"}"#;
        let resolved = resolve_base_paths(raw, "/srv/projects");
        assert_eq!(resolved, r#"{"logPath": "/srv/projects/bot/logs/out.log"}"#);
    }

    #[test]
    fn rejects_unknown_check_type() {
        let raw = r#"{"services": {"x": {
            "displayName": "X",
            "checks": [{ "type": "tcp", "name": "P", "port": 22 }]
        }}}"#;
        assert!(serde_json::from_str::<DashboardConfig>(raw).is_err());
    }
}
