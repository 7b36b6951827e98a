//! Gmail Labeler
//!
//! Finds unlabeled notification threads in a Gmail mailbox, derives a
//! hierarchical label for each from its message headers and routes the thread
//! to the inbox or the archive depending on whether it needs attention.
//!
//! # Overview
//!
//! - **Rules**: GitHub, GitLab, Bugzilla and Eclipse mailing-list mail, each with
//!   its own search filter, importance predicate and label extraction
//! - **Labels**: slash-separated paths, ancestors created before leaves
//! - **Processing**: every message of a thread is classified before anything
//!   is changed, labels are applied, the thread is routed
//! - **Runs**: one rule at a time, each thread isolated from its neighbours
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_labeler::{auth, build_rules, Config, FilterRunner, ProductionGmailClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".gmail-labeler/token.json".as_ref(),
//!     ).await?;
//!     let client = Arc::new(ProductionGmailClient::new(hub));
//!
//!     let mut runner = FilterRunner::new(client, config.execution.dry_run);
//!     let report = runner.run_all(&build_rules(&config), &config).await;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`client`] - The mail store abstraction and its Gmail implementation
//! - [`classifier`] - Provider rules
//! - [`cli`] - Command-line interface
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`headers`] - Header block parsing and pattern extraction
//! - [`label_manager`] - Hierarchical label resolution
//! - [`models`] - Core data structures
//! - [`processor`] - Per-thread classification and mutation
//! - [`runner`] - Per-rule batch runs and reports

pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod label_manager;
pub mod models;
pub mod processor;
pub mod runner;

pub use error::{GmailError, Result};

pub use models::{ClassificationResult, Label, Message, Thread, ThreadPlan};

pub use classifier::{
    build_rules, BugzillaRule, ClassifierRule, GitHubRule, GitLabRule, MailingListRule, RuleKind,
};

pub use config::Config;

pub use client::{MailClient, ProductionGmailClient};

pub use label_manager::LabelManager;
pub use processor::{ThreadOutcome, ThreadProcessor};
pub use runner::{FilterRunner, RuleReport, RunReport};

pub use cli::{Cli, Commands};
