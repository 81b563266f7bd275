use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// A project directory found under the base path. Tags come from its
/// descriptor file, not from the services config.
#[derive(Debug, Clone)]
pub struct DiscoveredService {
    pub dir_name: String,
    pub name: String,
    pub tech_stack: Vec<String>,
    pub deployment_type: Vec<String>,
    pub github: Option<String>,
}

/// Per-project descriptor that marks a directory as a service.
const DESCRIPTOR_FILE: &str = "CLAUDE.md";

static TECH_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)Next\.js", "Next.js"),
        (r"(?i)React", "React"),
        (r"(?i)TypeScript", "TypeScript"),
        (r"(?i)Python", "Python"),
        (r"(?i)WordPress", "WordPress"),
        (r"(?i)Docker", "Docker"),
        (r"(?i)Node\.js", "Node.js"),
        (r"(?i)Tailwind", "Tailwind CSS"),
        (r"(?i)Supabase", "Supabase"),
        (r"(?i)pandas", "pandas"),
        (r"(?i)yfinance", "yfinance"),
        (r"(?i)OpenAI", "OpenAI"),
        (r"(?i)Notion API", "Notion API"),
        (r"(?i)Redis", "Redis"),
        (r"(?i)PostgreSQL", "PostgreSQL"),
    ]
    .iter()
    .map(|(p, name)| (Regex::new(p).unwrap(), *name))
    .collect()
});

static DEPLOYMENT_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\bVPS\b", "VPS"),
        (r"(?i)\bVercel\b", "Vercel"),
        (r"(?i)\bDocker\b", "Docker"),
        (r"(?i)\bcronjob\b", "Cronjob"),
        (r"(?i)\bPM2\b", "PM2"),
        (r"(?i)\bHostinger\b", "Hostinger"),
    ]
    .iter()
    .map(|(p, name)| (Regex::new(p).unwrap(), *name))
    .collect()
});

static GITHUB_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://github\.com/[^\s)]+").unwrap());

static SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]+").unwrap());

/// URL-safe identifier for a project directory.
pub fn to_slug(dir_name: &str) -> String {
    SLUG_SEPARATORS
        .replace_all(&dir_name.to_lowercase(), "-")
        .into_owned()
}

fn clean_name(dir_name: &str) -> String {
    dir_name
        .split(|c| c == '_' || c == '-' || c == ' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn match_labels(content: &str, patterns: &[(Regex, &'static str)]) -> Vec<String> {
    let mut found = Vec::new();
    for (pattern, label) in patterns {
        if pattern.is_match(content) && !found.iter().any(|f| f == label) {
            found.push(label.to_string());
        }
    }
    found
}

/// Prefers the GitHub URL whose repo name matches the directory; falls back
/// to the first one mentioned.
fn extract_github_url(content: &str, dir_name: &str) -> Option<String> {
    let matches: Vec<&str> = GITHUB_URL.find_iter(content).map(|m| m.as_str()).collect();
    if matches.is_empty() {
        return None;
    }

    let normalize = |s: &str| {
        s.to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
    };
    let dir_normalized = normalize(dir_name);
    matches
        .iter()
        .find(|url| normalize(url).contains(&dir_normalized))
        .or(matches.first())
        .map(|url| url.to_string())
}

/// Scans the base path for project directories carrying a descriptor file.
/// An unreadable base path is an error; unreadable entries below it are
/// skipped. The result is sorted by display name.
pub async fn discover_services(
    base_path: &Path,
    exclude: &[String],
) -> Result<Vec<DiscoveredService>> {
    let mut services = Vec::new();

    let mut entries = tokio::fs::read_dir(base_path)
        .await
        .with_context(|| format!("Cannot read projects base path {}", base_path.display()))?;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        if dir_name.starts_with('.') || exclude.iter().any(|e| e == &dir_name) {
            continue;
        }
        match entry.file_type().await {
            Ok(ft) if ft.is_dir() => {}
            _ => continue,
        }

        let descriptor = entry.path().join(DESCRIPTOR_FILE);
        let content = match tokio::fs::read_to_string(&descriptor).await {
            Ok(content) => content,
            // No descriptor file: the directory is not a service.
            Err(_) => continue,
        };

        services.push(DiscoveredService {
            name: clean_name(&dir_name),
            tech_stack: match_labels(&content, &TECH_PATTERNS),
            deployment_type: match_labels(&content, &DEPLOYMENT_PATTERNS),
            github: extract_github_url(&content, &dir_name),
            dir_name,
        });
    }

    services.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(base: &Path, dir: &str, descriptor: &str) {
        let path = base.join(dir);
        fs::create_dir(&path).unwrap();
        fs::write(path.join(DESCRIPTOR_FILE), descriptor).unwrap();
    }

    #[test]
    fn slug_lowercases_and_joins_separators() {
        assert_eq!(to_slug("Trading_Bot V2"), "trading-bot-v2");
        assert_eq!(to_slug("blog"), "blog");
    }

    #[test]
    fn name_cleaning_collapses_separators() {
        assert_eq!(clean_name("trading__bot-v2"), "trading bot v2");
    }

    #[test]
    fn github_url_prefers_directory_match() {
        let content = "See https://github.com/acme/other-tool and \
                       https://github.com/acme/trading-bot for sources.";
        assert_eq!(
            extract_github_url(content, "trading_bot"),
            Some("https://github.com/acme/trading-bot".to_string())
        );
        assert_eq!(
            extract_github_url("https://github.com/acme/solo", "unrelated"),
            Some("https://github.com/acme/solo".to_string())
        );
        assert_eq!(extract_github_url("no links here", "x"), None);
    }

    #[tokio::test]
    async fn discovers_descriptor_directories_sorted() {
        let base = TempDir::new().unwrap();
        project(base.path(), "zeta_service", "A Python cronjob on the VPS");
        project(base.path(), "alpha-app", "Next.js + TypeScript, deployed via PM2");
        fs::create_dir(base.path().join("no_descriptor")).unwrap();
        project(base.path(), ".hidden", "Python");
        fs::write(base.path().join("stray.txt"), "not a dir").unwrap();

        let services = discover_services(base.path(), &[]).await.unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].dir_name, "alpha-app");
        assert_eq!(services[0].name, "alpha app");
        assert_eq!(services[0].tech_stack, vec!["Next.js", "TypeScript"]);
        assert_eq!(services[0].deployment_type, vec!["PM2"]);
        assert_eq!(services[1].tech_stack, vec!["Python"]);
        assert_eq!(services[1].deployment_type, vec!["VPS", "Cronjob"]);
    }

    #[tokio::test]
    async fn excluded_directories_are_skipped() {
        let base = TempDir::new().unwrap();
        project(base.path(), "dashboard", "React");
        project(base.path(), "blog", "WordPress");

        let services = discover_services(base.path(), &["dashboard".to_string()])
            .await
            .unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].dir_name, "blog");
    }

    #[tokio::test]
    async fn missing_base_path_is_an_error() {
        assert!(discover_services(Path::new("/nonexistent/base"), &[]).await.is_err());
    }
}
