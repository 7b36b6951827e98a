//! Mail store collaborator: the trait the pipeline talks to, and its Gmail implementation

use async_trait::async_trait;
use google_gmail1::api::{Label as GmailLabel, ModifyThreadRequest};
use tracing::debug;

use crate::auth::GmailHub;
use crate::error::{GmailError, Result};
use crate::models::{Label, Message, Thread};

/// Gmail system label for the inbox
pub const INBOX_LABEL: &str = "INBOX";

/// Gmail system label for the importance marker
pub const IMPORTANT_LABEL: &str = "IMPORTANT";

/// Largest page Gmail returns for `threads.list`
const MAX_PAGE_SIZE: usize = 500;

const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
const LABELS_SCOPE: &str = "https://www.googleapis.com/auth/gmail.labels";

/// Operations the labeling pipeline needs from the mail store
///
/// Calls are issued strictly one after another; implementations need no
/// internal locking for the pipeline's sake.
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Threads matching a Gmail search query, skipping `offset`, at most `max`
    async fn search_threads(&self, query: &str, offset: usize, max: usize) -> Result<Vec<Thread>>;

    /// All labels in the account
    async fn list_labels(&self) -> Result<Vec<Label>>;

    /// Create a label with the exact full name given
    async fn create_label(&self, name: &str) -> Result<Label>;

    /// Add a user label to every message of a thread
    async fn add_thread_label(&self, thread_id: &str, label_id: &str) -> Result<()>;

    async fn mark_thread_important(&self, thread_id: &str) -> Result<()>;

    async fn mark_thread_unimportant(&self, thread_id: &str) -> Result<()>;

    async fn move_thread_to_inbox(&self, thread_id: &str) -> Result<()>;

    async fn move_thread_to_archive(&self, thread_id: &str) -> Result<()>;
}

/// Gmail-backed mail store
///
/// No retries and no timeouts: a failed call surfaces as a [`GmailError`] and
/// the next scheduled run picks the thread up again.
pub struct ProductionGmailClient {
    hub: GmailHub,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self { hub }
    }

    /// Collect thread ids page by page until `wanted` ids are known
    async fn list_thread_ids(&self, query: &str, wanted: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < wanted {
            let page_size = (wanted - ids.len()).min(MAX_PAGE_SIZE);
            let mut call = self
                .hub
                .users()
                .threads_list("me")
                .q(query)
                .max_results(page_size as u32);

            if let Some(token) = page_token.as_ref() {
                call = call.page_token(token);
            }

            let (_, response) = call.add_scope(MODIFY_SCOPE).doit().await?;

            ids.extend(
                response
                    .threads
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|thread| thread.id),
            );

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(ids)
    }

    /// Fetch a thread with the raw RFC 5322 content of every message
    async fn fetch_thread(&self, thread_id: &str) -> Result<Thread> {
        let (_, thread) = self
            .hub
            .users()
            .threads_get("me", thread_id)
            .format("minimal")
            .add_scope(MODIFY_SCOPE)
            .doit()
            .await?;

        let mut messages = Vec::new();
        for message_id in thread
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
        {
            let (_, message) = self
                .hub
                .users()
                .messages_get("me", &message_id)
                .format("raw")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await?;

            let raw = message.raw.ok_or_else(|| {
                GmailError::InvalidMessageFormat(format!("Message {} has no raw content", message_id))
            })?;

            messages.push(Message::from_raw(message_id, &raw)?);
        }

        debug!("Fetched thread {} with {} messages", thread_id, messages.len());
        Ok(Thread::new(thread_id, messages))
    }

    async fn modify_thread(&self, thread_id: &str, add: Vec<String>, remove: Vec<String>) -> Result<()> {
        let request = ModifyThreadRequest {
            add_label_ids: if add.is_empty() { None } else { Some(add) },
            remove_label_ids: if remove.is_empty() { None } else { Some(remove) },
        };

        self.hub
            .users()
            .threads_modify(request, "me", thread_id)
            .add_scope(MODIFY_SCOPE)
            .doit()
            .await?;

        Ok(())
    }
}

#[async_trait]
impl MailClient for ProductionGmailClient {
    async fn search_threads(&self, query: &str, offset: usize, max: usize) -> Result<Vec<Thread>> {
        let ids = self.list_thread_ids(query, offset + max).await?;
        debug!("Query '{}' matched {} threads", query, ids.len());

        let mut threads = Vec::new();
        for id in ids.into_iter().skip(offset).take(max) {
            threads.push(self.fetch_thread(&id).await?);
        }

        Ok(threads)
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let (_, response) = self
            .hub
            .users()
            .labels_list("me")
            .add_scope(LABELS_SCOPE)
            .doit()
            .await?;

        let labels: Vec<Label> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| match (label.id, label.name) {
                (Some(id), Some(name)) => Some(Label { id, name }),
                _ => None,
            })
            .collect();

        debug!("Listed {} labels", labels.len());
        Ok(labels)
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        let label = GmailLabel {
            name: Some(name.to_string()),
            message_list_visibility: Some("show".to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            ..Default::default()
        };

        let (_, created) = self
            .hub
            .users()
            .labels_create(label, "me")
            .add_scope(LABELS_SCOPE)
            .doit()
            .await?;

        let id = created
            .id
            .ok_or_else(|| GmailError::LabelError(format!("Created label '{}' has no ID", name)))?;

        Ok(Label {
            id,
            name: created.name.unwrap_or_else(|| name.to_string()),
        })
    }

    async fn add_thread_label(&self, thread_id: &str, label_id: &str) -> Result<()> {
        self.modify_thread(thread_id, vec![label_id.to_string()], vec![])
            .await
    }

    async fn mark_thread_important(&self, thread_id: &str) -> Result<()> {
        self.modify_thread(thread_id, vec![IMPORTANT_LABEL.to_string()], vec![])
            .await
    }

    async fn mark_thread_unimportant(&self, thread_id: &str) -> Result<()> {
        self.modify_thread(thread_id, vec![], vec![IMPORTANT_LABEL.to_string()])
            .await
    }

    async fn move_thread_to_inbox(&self, thread_id: &str) -> Result<()> {
        self.modify_thread(thread_id, vec![INBOX_LABEL.to_string()], vec![])
            .await
    }

    async fn move_thread_to_archive(&self, thread_id: &str) -> Result<()> {
        self.modify_thread(thread_id, vec![], vec![INBOX_LABEL.to_string()])
            .await
    }
}
