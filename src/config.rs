use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cleanup::links::{DEFAULT_REDIRECT_MARKER, DEFAULT_UNSUBSCRIBE_PATTERNS, LinkExtractor};

const APP_DIR: &str = "rs_mail_cleanup";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub client_id: String,
    pub user_email: Option<String>,
    pub imap_server: Option<String>,
    pub redirect_uri: Option<String>,
    /// Mailbox searched for candidates; Gmail's "All Mail" by default.
    pub mailbox: Option<String>,
    #[serde(default)]
    pub cleanup: CleanupSettings,
}

/// Knobs for the cleanup pass itself.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CleanupSettings {
    /// Gmail search terms, OR-combined into the query.
    pub search_patterns: Vec<String>,
    pub result_limit: usize,
    /// Case-insensitive regexes matched against anchor text.
    pub unsubscribe_patterns: Vec<String>,
    pub redirect_marker_attribute: String,
    pub dry_run: bool,
    pub auto_open_links: bool,
    /// Pause between provider calls.
    pub rate_limit_delay_ms: u64,
    pub max_retries: u32,
    /// Only consider mail newer than this many days; 0 means no limit.
    pub email_age_limit_days: u32,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            search_patterns: vec![
                "unsubscribe".into(),
                "\"opt out\"".into(),
                "\"email preferences\"".into(),
            ],
            result_limit: 50,
            unsubscribe_patterns: DEFAULT_UNSUBSCRIBE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            redirect_marker_attribute: DEFAULT_REDIRECT_MARKER.into(),
            dry_run: false,
            auto_open_links: true,
            rate_limit_delay_ms: 1000,
            max_retries: 3,
            email_age_limit_days: 0,
        }
    }
}

impl CleanupSettings {
    pub fn search_query(&self) -> String {
        let mut q = self.search_patterns.join(" OR ");
        if self.email_age_limit_days > 0 {
            q.push_str(&format!(" newer_than:{}d", self.email_age_limit_days));
        }
        q
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn link_extractor(&self) -> Result<LinkExtractor> {
        LinkExtractor::new(&self.unsubscribe_patterns, self.redirect_marker_attribute.clone())
    }
}

impl Config {
    pub fn user_email(&self) -> Result<&str> {
        self.user_email
            .as_deref()
            .ok_or_else(|| anyhow!("user_email not set in config"))
    }

    pub fn imap_server(&self) -> String {
        self.imap_server
            .clone()
            .unwrap_or_else(|| "imap.gmail.com".to_string())
    }

    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:8080/callback".to_string())
    }

    pub fn mailbox(&self) -> String {
        self.mailbox
            .clone()
            .unwrap_or_else(|| "[Gmail]/All Mail".to_string())
    }

    fn template() -> Self {
        Config {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            user_email: Some("you@example.com".to_string()),
            imap_server: Some("imap.gmail.com".to_string()),
            redirect_uri: Some("http://127.0.0.1:8080/callback".to_string()),
            mailbox: None,
            cleanup: CleanupSettings::default(),
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join(APP_DIR);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config at `path`, writing a template there first if it is
/// missing (and then failing so the user can edit it).
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, toml::to_string_pretty(&Config::template())?)?;
        return Err(anyhow!(
            "Created template config at {}; edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_query_matches_gmail_syntax() {
        let s = CleanupSettings::default();
        assert_eq!(
            s.search_query(),
            r#"unsubscribe OR "opt out" OR "email preferences""#
        );
    }

    #[test]
    fn age_limit_is_appended() {
        let s = CleanupSettings {
            search_patterns: vec!["newsletter".into()],
            email_age_limit_days: 30,
            ..Default::default()
        };
        assert_eq!(s.search_query(), "newsletter newer_than:30d");
    }

    #[test]
    fn missing_config_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("template"));
        assert!(path.exists());

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.user_email().unwrap(), "you@example.com");
        assert_eq!(cfg.cleanup.result_limit, 50);
    }

    #[test]
    fn partial_cleanup_section_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
client_id = "id"
user_email = "me@example.com"

[cleanup]
dry_run = true
result_limit = 10
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert!(cfg.cleanup.dry_run);
        assert_eq!(cfg.cleanup.result_limit, 10);
        assert_eq!(cfg.cleanup.max_retries, 3);
        assert_eq!(cfg.imap_server(), "imap.gmail.com");
        assert_eq!(cfg.mailbox(), "[Gmail]/All Mail");
        assert!(cfg.cleanup.link_extractor().is_ok());
    }

    #[test]
    fn bad_pattern_fails_extractor() {
        let s = CleanupSettings {
            unsubscribe_patterns: vec!["[".into()],
            ..Default::default()
        };
        assert!(s.link_extractor().is_err());
    }
}
