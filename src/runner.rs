//! Batch orchestration: search per rule, process each thread in isolation
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::classifier::{ClassifierRule, RuleKind};
use crate::client::MailClient;
use crate::config::Config;
use crate::error::Result;
use crate::processor::{ThreadOutcome, ThreadProcessor};

/// Threads fetched per rule when nothing else is configured
pub const DEFAULT_SEARCH_MAX: usize = 16;

/// Counters for one rule's pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub rule: String,
    pub query: String,
    pub threads_found: usize,
    pub threads_labeled: usize,
    pub threads_unlabeled: usize,
    pub threads_planned: usize,
    pub threads_failed: usize,
    pub threads_important: usize,
    pub threads_archived: usize,
    pub labels_failed: usize,
    /// Set when the search itself failed and no thread was processed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a whole scheduled run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub rules: Vec<RuleReport>,
    pub labels_created: Vec<String>,
}

impl RunReport {
    /// Whether any rule or thread failed
    pub fn has_failures(&self) -> bool {
        self.rules
            .iter()
            .any(|r| r.error.is_some() || r.threads_failed > 0)
    }
}

/// Feeds the threads a rule selects into the [`ThreadProcessor`]
pub struct FilterRunner {
    client: Arc<dyn MailClient>,
    processor: ThreadProcessor,
    dry_run: bool,
}

impl FilterRunner {
    pub fn new(client: Arc<dyn MailClient>, dry_run: bool) -> Self {
        Self {
            processor: ThreadProcessor::new(Arc::clone(&client)).with_dry_run(dry_run),
            client,
            dry_run,
        }
    }

    /// Run one rule over at most `search_max` matching threads
    ///
    /// A thread that fails is logged and counted; the remaining threads are
    /// still processed. Only a failed search is returned as an error.
    pub async fn run(&mut self, rule: &dyn ClassifierRule, search_max: usize) -> Result<RuleReport> {
        let query = rule.search_filter();
        info!(rule = rule.name(), query = %query, max = search_max, "Searching threads");

        let threads = self.client.search_threads(&query, 0, search_max).await?;

        let mut report = RuleReport {
            rule: rule.name().to_string(),
            query,
            threads_found: threads.len(),
            ..Default::default()
        };

        for thread in &threads {
            match self.processor.process(thread, rule).await {
                Ok(ThreadOutcome::Planned(_)) => report.threads_planned += 1,
                Ok(ThreadOutcome::Unlabeled) => report.threads_unlabeled += 1,
                Ok(ThreadOutcome::Labeled {
                    labels_failed,
                    important,
                    ..
                }) => {
                    report.threads_labeled += 1;
                    report.labels_failed += labels_failed;
                    if important {
                        report.threads_important += 1;
                    } else {
                        report.threads_archived += 1;
                    }
                }
                Err(e) => {
                    error!(
                        rule = rule.name(),
                        thread_id = %thread.id,
                        subject = %thread.subject,
                        transient = e.is_transient(),
                        "Failed to process thread: {}", e
                    );
                    report.threads_failed += 1;
                }
            }
        }

        info!(
            rule = rule.name(),
            found = report.threads_found,
            labeled = report.threads_labeled,
            failed = report.threads_failed,
            "Rule finished"
        );
        Ok(report)
    }

    /// Run every rule in order; a rule whose search fails doesn't stop the others
    pub async fn run_all(
        &mut self,
        rules: &[(RuleKind, Box<dyn ClassifierRule>)],
        config: &Config,
    ) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, rules = rules.len(), dry_run = self.dry_run, "Run starting");

        let mut reports = Vec::with_capacity(rules.len());
        for (kind, rule) in rules {
            let search_max = config.search_max(*kind);
            match self.run(rule.as_ref(), search_max).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(
                        rule = rule.name(),
                        transient = e.is_transient(),
                        "Search failed: {}", e
                    );
                    reports.push(RuleReport {
                        rule: rule.name().to_string(),
                        query: rule.search_filter(),
                        error: Some(e.to_string()),
                        ..Default::default()
                    });
                }
            }
        }

        let labels_created = self
            .processor
            .label_manager()
            .created_labels()
            .iter()
            .map(|label| label.name.clone())
            .collect();

        RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run: self.dry_run,
            rules: reports,
            labels_created,
        }
    }
}
