use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tracing::{info, warn};

use crate::config::{self, CheckConfig, DashboardConfig, ServiceConfig};
use crate::discovery::{self, DiscoveredService};
use crate::logparse;
use crate::models::{
    CheckResult, DashboardState, LogEntry, ServiceDetail, ServiceSummary, Status,
};

/// Responses slower than this are flagged even when the status code matches.
const SLOW_RESPONSE_MS: u64 = 3000;

pub struct Engine {
    pub config: DashboardConfig,
    http_client: reqwest::Client,
    pub state: Arc<RwLock<DashboardState>>,
    concurrency_limiter: Arc<Semaphore>,
}

/// Result of one check run plus the non-info log entries it surfaced.
pub struct CheckOutcome {
    pub result: CheckResult,
    pub errors: Vec<LogEntry>,
}

impl CheckOutcome {
    fn bare(result: CheckResult) -> Self {
        Self { result, errors: Vec::new() }
    }
}

/// Reduces per-check results to one service status. Red dominates outright;
/// otherwise yellow beats gray beats green. Gray sits between green and
/// yellow, so this is explicit rule evaluation, not a max over the enum.
pub fn aggregate_status(results: &[CheckResult]) -> Status {
    if results.is_empty() {
        return Status::Gray;
    }
    let mut worst = Status::Green;
    for result in results {
        match result.status {
            Status::Red => return Status::Red,
            Status::Yellow => worst = Status::Yellow,
            Status::Gray if worst == Status::Green => worst = Status::Gray,
            _ => {}
        }
    }
    worst
}

fn format_age(minutes: i64) -> String {
    if minutes < 60 {
        return format!("vor {minutes} Min");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("vor {hours}h {}min", minutes % 60);
    }
    let days = hours / 24;
    format!("vor {days}d {}h", hours % 24)
}

impl Engine {
    pub fn new(config: DashboardConfig) -> Self {
        let max_concurrent = config.max_concurrency;
        Self {
            config,
            http_client: reqwest::Client::new(),
            state: Arc::new(RwLock::new(DashboardState::default())),
            concurrency_limiter: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Poll loop: every interval, re-evaluate all discovered services from
    /// scratch and swap the snapshot. No state carries over between cycles.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(
            "Status engine active, polling every {}s ({} checks max in flight)",
            self.config.check_interval, self.config.max_concurrency
        );

        loop {
            let start = Instant::now();
            let count = self.evaluate_all().await;
            info!(
                "Poll cycle evaluated {} services in {:.2}s",
                count,
                start.elapsed().as_secs_f64()
            );
            tokio::time::sleep(Duration::from_secs(self.config.check_interval)).await;
        }
    }

    pub async fn evaluate_all(self: &Arc<Self>) -> usize {
        let base = config::projects_base_path();
        let discovered =
            match discovery::discover_services(&base, &self.config.exclude).await {
                Ok(discovered) => discovered,
                Err(err) => {
                    warn!("Service discovery failed: {err:#}");
                    Vec::new()
                }
            };

        let mut tasks = FuturesUnordered::new();
        for svc in discovered {
            let engine = Arc::clone(self);
            tasks.push(tokio::spawn(async move { engine.summarize_service(svc).await }));
        }

        let mut services = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.next().await {
            if let Ok(summary) = joined {
                services.push(summary);
            }
        }
        services.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

        let count = services.len();
        self.state.write().await.services = services;
        count
    }

    async fn summarize_service(&self, svc: DiscoveredService) -> ServiceSummary {
        let config = self.config.services.get(&svc.dir_name);
        let (checks, _) = self.run_service_checks(config).await;
        self.build_summary(&svc, config, checks)
    }

    /// Full evaluation for the detail view: checks, pooled log entries, raw
    /// tails and structured sections for every log-freshness check.
    pub async fn service_detail(&self, svc: DiscoveredService) -> ServiceDetail {
        let config = self.config.services.get(&svc.dir_name);
        let (checks, errors) = self.run_service_checks(config).await;

        let log_paths: Vec<&Path> = config
            .map(|c| {
                c.checks
                    .iter()
                    .filter_map(|check| match check {
                        CheckConfig::LogFreshness { log_path, .. } => {
                            Some(log_path.as_path())
                        }
                        CheckConfig::Http { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut raw_sections = Vec::with_capacity(log_paths.len());
        let mut log_sections = Vec::with_capacity(log_paths.len());
        for path in log_paths {
            let tail = logparse::recent_logs(path, logparse::DISPLAY_TAIL_LINES).await;
            raw_sections.push(format!("=== {} ===\n{}", path.display(), tail));
            log_sections
                .push(logparse::structured_logs(path, logparse::DISPLAY_TAIL_LINES).await);
        }

        ServiceDetail {
            summary: self.build_summary(&svc, config, checks),
            errors,
            recent_logs: raw_sections.join("\n\n"),
            log_sections,
            config: config.cloned(),
        }
    }

    /// Runs a service's checks concurrently; results keep config order for
    /// display. Aggregation itself is order-independent.
    async fn run_service_checks(
        &self,
        config: Option<&ServiceConfig>,
    ) -> (Vec<CheckResult>, Vec<LogEntry>) {
        let Some(config) = config else {
            return (Vec::new(), Vec::new());
        };

        let outcomes = join_all(config.checks.iter().map(|c| self.run_check(c))).await;

        let mut checks = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for outcome in outcomes {
            checks.push(outcome.result);
            errors.extend(outcome.errors);
        }
        (checks, errors)
    }

    fn build_summary(
        &self,
        svc: &DiscoveredService,
        config: Option<&ServiceConfig>,
        checks: Vec<CheckResult>,
    ) -> ServiceSummary {
        // A service with no configured checks reports gray, not green.
        let status = if checks.is_empty() {
            Status::Gray
        } else {
            aggregate_status(&checks)
        };

        ServiceSummary {
            slug: discovery::to_slug(&svc.dir_name),
            name: config
                .map(|c| c.display_name.clone())
                .unwrap_or_else(|| svc.name.clone()),
            description: config.map(|c| c.description.clone()).unwrap_or_default(),
            service_type: config.map(|c| c.service_type).unwrap_or_default(),
            tech_stack: svc.tech_stack.clone(),
            deployment_type: svc.deployment_type.clone(),
            status,
            checks,
            url: config.and_then(|c| c.url.clone()),
            github: svc.github.clone(),
            last_checked: Utc::now().to_rfc3339(),
        }
    }

    pub async fn run_check(&self, check: &CheckConfig) -> CheckOutcome {
        let _permit = self.concurrency_limiter.acquire().await.ok();
        match check {
            CheckConfig::Http { name, url, expected_status, timeout_ms } => {
                CheckOutcome::bare(
                    self.run_http_check(name, url, *expected_status, *timeout_ms).await,
                )
            }
            CheckConfig::LogFreshness { name, log_path, max_age_minutes } => {
                self.run_log_freshness_check(name, log_path, *max_age_minutes).await
            }
        }
    }

    /// Probes `url` once. The timeout aborts only this request; transport
    /// failures are folded into the result, never propagated. Redirects are
    /// followed by the client before the status branch is evaluated.
    async fn run_http_check(
        &self,
        name: &str,
        url: &str,
        expected_status: u16,
        timeout_ms: u64,
    ) -> CheckResult {
        let start = Instant::now();
        let response = self
            .http_client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await;
        let elapsed = start.elapsed().as_millis() as u64;

        let (status, message) = match response {
            Ok(response) => {
                let code = response.status().as_u16();
                if code == expected_status {
                    if elapsed > SLOW_RESPONSE_MS {
                        (Status::Yellow, format!("OK, aber langsam ({elapsed}ms)"))
                    } else {
                        (Status::Green, format!("OK ({elapsed}ms)"))
                    }
                } else if (300..400).contains(&code) {
                    (Status::Yellow, format!("Redirect: {code}"))
                } else {
                    (Status::Red, format!("Status {code}"))
                }
            }
            Err(err) if err.is_timeout() => {
                (Status::Red, format!("Timeout nach {timeout_ms}ms"))
            }
            Err(_) => (Status::Red, "Nicht erreichbar".to_string()),
        };

        CheckResult {
            name: name.to_string(),
            status,
            message,
            response_time_ms: Some(elapsed),
        }
    }

    /// Freshness beats content: a log past 1.5x its allowed age is red no
    /// matter what it contains. A missing file is gray and skips the scan.
    async fn run_log_freshness_check(
        &self,
        name: &str,
        log_path: &Path,
        max_age_minutes: i64,
    ) -> CheckOutcome {
        let Some(age) = logparse::log_age_minutes(log_path).await else {
            return CheckOutcome::bare(CheckResult {
                name: name.to_string(),
                status: Status::Gray,
                message: "Log-Datei nicht gefunden".to_string(),
                response_time_ms: None,
            });
        };

        let scan = logparse::parse_log_file(log_path, logparse::SCAN_TAIL_LINES).await;
        let age_str = format_age(age);
        let warn_age = (max_age_minutes as f64 * 1.5).round() as i64;

        let (status, message) = if age > warn_age {
            (Status::Red, format!("Veraltet: Letztes Update {age_str}"))
        } else if scan.has_errors {
            (Status::Red, format!("Errors gefunden, letztes Update {age_str}"))
        } else if age > max_age_minutes {
            (Status::Yellow, format!("Leicht veraltet: {age_str}"))
        } else if scan.has_warnings {
            (Status::Yellow, format!("Warnings gefunden, letztes Update {age_str}"))
        } else {
            (Status::Green, format!("OK, letztes Update {age_str}"))
        };

        CheckOutcome {
            result: CheckResult {
                name: name.to_string(),
                status,
                message,
                response_time_ms: None,
            },
            errors: scan.entries,
        }
    }
}
