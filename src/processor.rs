//! Per-thread pipeline: classify, resolve labels, apply, route
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::classifier::ClassifierRule;
use crate::client::MailClient;
use crate::error::Result;
use crate::label_manager::{label_key, LabelManager};
use crate::models::{Label, Thread, ThreadPlan};

/// What processing did to a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadOutcome {
    /// Dry run: the plan that would have been applied
    Planned(ThreadPlan),
    /// No message yielded a label; the thread was left untouched
    Unlabeled,
    Labeled {
        labels: Vec<Label>,
        /// Labels whose application failed (logged, not retried)
        labels_failed: usize,
        important: bool,
    },
}

/// Applies one rule's verdicts to threads through the mail store
pub struct ThreadProcessor {
    client: Arc<dyn MailClient>,
    labels: LabelManager,
    dry_run: bool,
}

impl ThreadProcessor {
    pub fn new(client: Arc<dyn MailClient>) -> Self {
        Self {
            labels: LabelManager::new(Arc::clone(&client)),
            client,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn label_manager(&self) -> &LabelManager {
        &self.labels
    }

    /// Classify every message of a thread without touching the store
    ///
    /// A structural failure on any message fails the whole plan, so nothing is
    /// created or applied for that thread.
    pub fn plan(thread: &Thread, rule: &dyn ClassifierRule) -> Result<ThreadPlan> {
        let mut plan = ThreadPlan::default();

        for message in &thread.messages {
            let result = rule.classify(message)?;
            debug!(
                thread_id = %thread.id,
                message_id = %message.id,
                label = ?result.label_path,
                important = result.important,
                "Classified message"
            );
            plan.merge(result);
        }

        Ok(plan)
    }

    pub async fn process(&mut self, thread: &Thread, rule: &dyn ClassifierRule) -> Result<ThreadOutcome> {
        let plan = Self::plan(thread, rule)?;

        if self.dry_run {
            info!(
                thread_id = %thread.id,
                subject = %thread.subject,
                labels = ?plan.label_paths,
                important = plan.important,
                "Dry run: would label thread"
            );
            return Ok(ThreadOutcome::Planned(plan));
        }

        let mut labels: Vec<Label> = Vec::new();
        for path in &plan.label_paths {
            let label = self.labels.resolve(path).await?;
            if !labels.iter().any(|l| label_key(&l.name) == label_key(&label.name)) {
                labels.push(label);
            }
        }

        if labels.is_empty() {
            error!(
                thread_id = %thread.id,
                subject = %thread.subject,
                "No label found for thread"
            );
            return Ok(ThreadOutcome::Unlabeled);
        }

        let mut labels_failed = 0;
        for label in &labels {
            match self.client.add_thread_label(&thread.id, &label.id).await {
                Ok(()) => debug!(thread_id = %thread.id, label = %label.name, "Applied label"),
                Err(e) => {
                    warn!(
                        thread_id = %thread.id,
                        label = %label.name,
                        "Failed to apply label: {}", e
                    );
                    labels_failed += 1;
                }
            }
        }

        if plan.important {
            self.client.mark_thread_important(&thread.id).await?;
            self.client.move_thread_to_inbox(&thread.id).await?;
        } else {
            self.client.mark_thread_unimportant(&thread.id).await?;
            self.client.move_thread_to_archive(&thread.id).await?;
        }

        info!(
            thread_id = %thread.id,
            subject = %thread.subject,
            labels = labels.len(),
            important = plan.important,
            "Processed thread"
        );

        Ok(ThreadOutcome::Labeled {
            labels,
            labels_failed,
            important: plan.important,
        })
    }
}
