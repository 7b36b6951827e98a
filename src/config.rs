use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classifier::RuleKind;
use crate::error::{GmailError, Result};

/// Gmail refuses `threads.list` pages above this size
const MAX_SEARCH_THREADS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Threads fetched per rule and run unless the rule overrides it
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_threads: default_max_threads(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub github: RuleConfig,
    #[serde(default)]
    pub gitlab: GitLabConfig,
    #[serde(default)]
    pub bugzilla: RuleConfig,
    #[serde(default = "default_mailing_list")]
    pub mailing_list: RuleConfig,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            github: RuleConfig::default(),
            gitlab: GitLabConfig::default(),
            bugzilla: RuleConfig::default(),
            mailing_list: default_mailing_list(),
        }
    }
}

impl RulesConfig {
    pub fn is_enabled(&self, kind: RuleKind) -> bool {
        match kind {
            RuleKind::GitHub => self.github.enabled,
            RuleKind::GitLab => self.gitlab.enabled,
            RuleKind::Bugzilla => self.bugzilla.enabled,
            RuleKind::MailingList => self.mailing_list.enabled,
        }
    }

    fn max_threads_override(&self, kind: RuleKind) -> Option<usize> {
        match kind {
            RuleKind::GitHub => self.github.max_threads,
            RuleKind::GitLab => self.gitlab.max_threads,
            RuleKind::Bugzilla => self.bugzilla.max_threads,
            RuleKind::MailingList => self.mailing_list.max_threads,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<usize>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_threads: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<usize>,
    /// Mail domain of the GitLab instance; labels live under `gitlab.<host>`
    #[serde(default = "default_gitlab_host")]
    pub host: String,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_threads: None,
            host: default_gitlab_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub dry_run: bool,
}

fn default_max_threads() -> usize {
    crate::runner::DEFAULT_SEARCH_MAX
}

fn default_enabled() -> bool {
    true
}

fn default_gitlab_host() -> String {
    "eclipse.org".to_string()
}

fn default_mailing_list() -> RuleConfig {
    RuleConfig {
        enabled: true,
        max_threads: Some(32),
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GmailError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Thread budget for one run of a rule
    pub fn search_max(&self, kind: RuleKind) -> usize {
        self.rules
            .max_threads_override(kind)
            .unwrap_or(self.search.max_threads)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        check_max_threads("search.max_threads", Some(self.search.max_threads))?;
        check_max_threads("rules.github.max_threads", self.rules.github.max_threads)?;
        check_max_threads("rules.gitlab.max_threads", self.rules.gitlab.max_threads)?;
        check_max_threads("rules.bugzilla.max_threads", self.rules.bugzilla.max_threads)?;
        check_max_threads(
            "rules.mailing_list.max_threads",
            self.rules.mailing_list.max_threads,
        )?;

        let host = self.rules.gitlab.host.trim();
        if host.is_empty() {
            return Err(GmailError::ConfigError(
                "rules.gitlab.host cannot be empty".to_string(),
            ));
        }
        if host.contains('/') || host.contains('@') {
            return Err(GmailError::ConfigError(format!(
                "rules.gitlab.host must be a bare domain, got '{}'",
                host
            )));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}

fn check_max_threads(key: &str, value: Option<usize>) -> Result<()> {
    match value {
        Some(0) => Err(GmailError::ConfigError(format!("{} must be at least 1", key))),
        Some(n) if n > MAX_SEARCH_THREADS => Err(GmailError::ConfigError(format!(
            "{} cannot exceed {}",
            key, MAX_SEARCH_THREADS
        ))),
        _ => Ok(()),
    }
}
