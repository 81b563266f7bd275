use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::models::{Level, LogEntry, LogFileSection, LogLine};

/// Tail window for raw and structured log display.
pub const DISPLAY_TAIL_LINES: usize = 50;
/// Tail window scanned for errors/warnings during a freshness check.
pub const SCAN_TAIL_LINES: usize = 20;

// Known non-critical error signatures. Checked before the error patterns so
// routine failures from upstream sources land as warnings, not errors.
static DOWNGRADE_TO_WARNING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![Regex::new(r"HTTP Error 404:.*Quote not found for symbol").unwrap()]
});

static ERROR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\bERROR\b", r"\bException\b", r"\bTraceback\b", r"\bFAILED\b", r"\bCritical\b"]
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
        .collect()
});

static WARNING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\bWARNING\b", r"\bWARN\b", r"\bretry\b"]
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
        .collect()
});

static TIMESTAMP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}[\sT]\d{2}:\d{2}:\d{2}").unwrap());

/// Maps one log line to a severity. Log formats are heterogeneous and not
/// owned by this tool, so this is substring matching, not structured parsing.
pub fn classify_line(line: &str) -> Level {
    for pattern in DOWNGRADE_TO_WARNING_PATTERNS.iter() {
        if pattern.is_match(line) {
            return Level::Warning;
        }
    }
    for pattern in ERROR_PATTERNS.iter() {
        if pattern.is_match(line) {
            return Level::Error;
        }
    }
    for pattern in WARNING_PATTERNS.iter() {
        if pattern.is_match(line) {
            return Level::Warning;
        }
    }
    Level::Info
}

/// First `YYYY-MM-DD HH:MM:SS` occurrence in the line, empty when absent.
pub fn extract_timestamp(line: &str) -> String {
    TIMESTAMP_PATTERN
        .find(line)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn last_non_empty_lines(content: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}

#[derive(Debug, Default)]
pub struct LogScan {
    pub entries: Vec<LogEntry>,
    pub has_errors: bool,
    pub has_warnings: bool,
}

/// Classifies the file's tail. Unreadable files yield an empty scan with
/// both flags false; whether the file exists at all is the age function's
/// concern, not this one's.
pub async fn parse_log_file(path: &Path, line_count: usize) -> LogScan {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(_) => return LogScan::default(),
    };

    let mut scan = LogScan::default();
    for line in last_non_empty_lines(&content, line_count) {
        let level = classify_line(line);
        match level {
            Level::Error => scan.has_errors = true,
            Level::Warning => scan.has_warnings = true,
            Level::Info => continue,
        }
        scan.entries.push(LogEntry {
            timestamp: extract_timestamp(line),
            level,
            message: line.trim().to_string(),
        });
    }
    scan
}

/// Last `line_count` non-empty lines as display text. The caller never needs
/// to distinguish an empty file from a missing one here.
pub async fn recent_logs(path: &Path, line_count: usize) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => last_non_empty_lines(&content, line_count).join("\n"),
        Err(_) => "Log-Datei nicht erreichbar.".to_string(),
    }
}

/// Last `line_count` lines including blanks, each numbered by its absolute
/// 1-based position in the file.
pub async fn structured_logs(path: &Path, line_count: usize) -> LogFileSection {
    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(_) => return LogFileSection { file_name, lines: Vec::new() },
    };

    let all_lines: Vec<&str> = content.split('\n').collect();
    let start = all_lines.len().saturating_sub(line_count);
    let lines = all_lines[start..]
        .iter()
        .enumerate()
        .map(|(i, text)| LogLine {
            line_number: start + i + 1,
            level: classify_line(text),
            text: text.to_string(),
        })
        .collect();

    LogFileSection { file_name, lines }
}

/// Minutes since the file was last modified, rounded to the nearest whole
/// minute and clamped at zero against clock skew. `None` means the file is
/// missing or unreadable, which drives a distinct check status.
pub async fn log_age_minutes(path: &Path) -> Option<i64> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    let mtime = meta.modified().ok()?;
    let age = SystemTime::now()
        .duration_since(mtime)
        .unwrap_or(Duration::ZERO);
    Some((age.as_secs_f64() / 60.0).round() as i64)
}
