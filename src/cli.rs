//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::auth;
use crate::classifier::{build_rules, ClassifierRule, RuleKind};
use crate::client::{MailClient, ProductionGmailClient};
use crate::config::Config;
use crate::error::{GmailError, Result};
use crate::models::{ClassificationResult, Message};
use crate::runner::{FilterRunner, RunReport};

#[derive(Parser, Debug)]
#[command(name = "gmail-labeler")]
#[command(version)]
#[command(about = "Labels and routes unlabeled Gmail threads from GitHub, GitLab, Bugzilla and mailing lists", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".gmail-labeler/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Label and route unlabeled threads
    Run {
        /// Classify and log only, don't create labels or modify threads
        #[arg(long)]
        dry_run: bool,

        /// Only run this rule (runs it even if disabled in the config)
        #[arg(long, value_enum)]
        rule: Option<RuleKind>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a raw message file offline
    Classify {
        /// Rule to apply
        #[arg(long, value_enum)]
        rule: RuleKind,

        /// RFC 5322 message file (.eml)
        file: PathBuf,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Rules for a run: the one requested on the command line, or every enabled one
pub fn select_rules(
    config: &Config,
    only: Option<RuleKind>,
) -> Vec<(RuleKind, Box<dyn ClassifierRule>)> {
    match only {
        Some(kind) => vec![(kind, kind.build(config))],
        None => build_rules(config),
    }
}

/// Authenticate, then run the selected rules against the live mailbox
pub async fn run_labeler(cli: &Cli, dry_run: bool, only: Option<RuleKind>) -> Result<RunReport> {
    let mut config = Config::load(&cli.config).await?;
    if dry_run {
        config.execution.dry_run = true;
    }

    let rules = select_rules(&config, only);
    if rules.is_empty() {
        return Err(GmailError::ConfigError(
            "No rules enabled; enable one in the config or pass --rule".to_string(),
        ));
    }

    let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;
    let client: Arc<dyn MailClient> = Arc::new(ProductionGmailClient::new(hub));

    if config.execution.dry_run {
        info!("Dry run: no labels will be created and no thread modified");
    }

    let mut runner = FilterRunner::new(client, config.execution.dry_run);
    Ok(runner.run_all(&rules, &config).await)
}

/// Classify a message stored on disk without contacting the mail store
pub async fn classify_file(config: &Config, kind: RuleKind, path: &Path) -> Result<ClassificationResult> {
    let raw = tokio::fs::read(path).await?;
    let id = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "message".to_string());

    let message = Message::from_raw(id, &raw)?;
    kind.build(config).classify(&message)
}

/// Human-readable summary of a run
pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();

    if report.dry_run {
        out.push_str("Label run (DRY RUN, nothing was changed)\n");
    } else {
        out.push_str("Label run\n");
    }
    out.push_str(&format!("  Run ID:   {}\n", report.run_id));
    out.push_str(&format!(
        "  Duration: {}s\n\n",
        (report.finished_at - report.started_at).num_seconds()
    ));

    for rule in &report.rules {
        out.push_str(&format!("[{}] {}\n", rule.rule, rule.query));
        if let Some(ref err) = rule.error {
            out.push_str(&format!("  search failed: {}\n\n", err));
            continue;
        }

        out.push_str(&format!("  found:     {}\n", rule.threads_found));
        if report.dry_run {
            out.push_str(&format!("  planned:   {}\n", rule.threads_planned));
        } else {
            out.push_str(&format!(
                "  labeled:   {} ({} important, {} archived)\n",
                rule.threads_labeled, rule.threads_important, rule.threads_archived
            ));
            out.push_str(&format!("  unlabeled: {}\n", rule.threads_unlabeled));
        }
        if rule.threads_failed > 0 {
            out.push_str(&format!("  failed:    {}\n", rule.threads_failed));
        }
        if rule.labels_failed > 0 {
            out.push_str(&format!("  label applications failed: {}\n", rule.labels_failed));
        }
        out.push('\n');
    }

    if !report.labels_created.is_empty() {
        out.push_str("Labels created:\n");
        for name in &report.labels_created {
            out.push_str(&format!("  + {}\n", name));
        }
    }

    out
}
