//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use gmail_labeler::client::MailClient;
use gmail_labeler::error::{GmailError, Result};
use gmail_labeler::label_manager::label_key;
use gmail_labeler::models::{Label, Message, Thread};
use mockall::mock;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Build raw RFC 5322 text from header pairs and a short body
pub fn raw_message(headers: &[(&str, &str)]) -> String {
    let mut raw = String::new();
    for (name, value) in headers {
        raw.push_str(&format!("{}: {}\r\n", name, value));
    }
    raw.push_str("\r\nNotification body\r\n");
    raw
}

pub fn create_test_message(id: &str, headers: &[(&str, &str)]) -> Message {
    Message::from_raw(id, raw_message(headers).as_bytes()).unwrap()
}

/// GitHub notification for `org/repo`, optionally with a reason header
pub fn github_message(id: &str, org: &str, repo: &str, reason: Option<&str>) -> Message {
    let list_id = format!("{repo}.{org} <{org}/{repo}.github.com>");
    let subject = format!("[{}/{}] Update", org, repo);
    let mut headers = vec![
        ("From", "GitHub <notifications@github.com>"),
        ("Subject", subject.as_str()),
        ("List-ID", list_id.as_str()),
    ];
    if let Some(reason) = reason {
        headers.push(("X-GitHub-Reason", reason));
    }
    create_test_message(id, &headers)
}

/// Bugzilla mail; pass `None` as url to leave out `X-Bugzilla-URL`
pub fn bugzilla_message(
    id: &str,
    url: Option<&str>,
    product: &str,
    component: &str,
    reason: &str,
) -> Message {
    let mut headers = vec![
        ("From", "bugzilla-daemon@eclipse.org"),
        ("Subject", "[Bug 12345] Something is broken"),
    ];
    if let Some(url) = url {
        headers.push(("X-Bugzilla-URL", url));
    }
    headers.push(("X-Bugzilla-Product", product));
    headers.push(("X-Bugzilla-Component", component));
    headers.push(("X-Bugzilla-Reason", reason));
    create_test_message(id, &headers)
}

pub fn mailing_list_message(id: &str, list: &str) -> Message {
    let list_id = format!("{} developer discussions <{}.eclipse.org>", list, list);
    create_test_message(
        id,
        &[
            ("From", "Someone <someone@example.com>"),
            ("Subject", "Re: release plan"),
            ("List-Id", list_id.as_str()),
        ],
    )
}

/// A message no rule recognises
pub fn plain_message(id: &str) -> Message {
    create_test_message(
        id,
        &[("From", "friend@example.com"), ("Subject", "Lunch?")],
    )
}

pub fn create_test_thread(id: &str, messages: Vec<Message>) -> Thread {
    Thread::new(id, messages)
}

pub fn create_test_label(id: &str, name: &str) -> Label {
    Label {
        id: id.to_string(),
        name: name.to_string(),
    }
}

// Mock implementation of MailClient for testing
mock! {
    pub MailClient {}

    #[async_trait]
    impl MailClient for MailClient {
        async fn search_threads(&self, query: &str, offset: usize, max: usize) -> Result<Vec<Thread>>;
        async fn list_labels(&self) -> Result<Vec<Label>>;
        async fn create_label(&self, name: &str) -> Result<Label>;
        async fn add_thread_label(&self, thread_id: &str, label_id: &str) -> Result<()>;
        async fn mark_thread_important(&self, thread_id: &str) -> Result<()>;
        async fn mark_thread_unimportant(&self, thread_id: &str) -> Result<()>;
        async fn move_thread_to_inbox(&self, thread_id: &str) -> Result<()>;
        async fn move_thread_to_archive(&self, thread_id: &str) -> Result<()>;
    }
}

/// Everything the fake store has seen or been told to fail on
#[derive(Debug, Default)]
pub struct StoreState {
    pub labels: Vec<Label>,
    /// Names passed to `create_label`, in call order
    pub created: Vec<String>,
    /// (thread id, label id) per successful `add_thread_label`
    pub applied: Vec<(String, String)>,
    pub important: HashSet<String>,
    pub unimportant: HashSet<String>,
    pub inbox: HashSet<String>,
    pub archived: HashSet<String>,
    /// (query, max) per `search_threads` call
    pub searches: Vec<(String, usize)>,
    pub threads_by_query: HashMap<String, Vec<Thread>>,
    pub failing_queries: HashSet<String>,
    pub failing_label_names: HashSet<String>,
    pub failing_label_ids: HashSet<String>,
    pub failing_routing: HashSet<String>,
}

/// In-memory mail store with failure injection
#[derive(Default)]
pub struct FakeMailStore {
    pub state: Mutex<StoreState>,
}

impl FakeMailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(labels: Vec<Label>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().labels = labels;
        store
    }

    /// Threads returned for an exact query string
    pub fn add_threads(&self, query: &str, threads: Vec<Thread>) {
        self.state
            .lock()
            .unwrap()
            .threads_by_query
            .entry(query.to_string())
            .or_default()
            .extend(threads);
    }

    pub fn fail_search(&self, query: &str) {
        self.state.lock().unwrap().failing_queries.insert(query.to_string());
    }

    pub fn fail_label_creation(&self, name: &str) {
        self.state.lock().unwrap().failing_label_names.insert(name.to_string());
    }

    /// Applying the label with this name fails; the label must already exist
    pub fn fail_label_application(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state
            .labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id.clone())
            .expect("label must exist before its application can fail");
        state.failing_label_ids.insert(id);
    }

    pub fn fail_routing(&self, thread_id: &str) {
        self.state.lock().unwrap().failing_routing.insert(thread_id.to_string());
    }

    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn label_names(&self) -> Vec<String> {
        self.state.lock().unwrap().labels.iter().map(|l| l.name.clone()).collect()
    }

    /// Names of the labels applied to a thread, in application order
    pub fn labels_on(&self, thread_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .applied
            .iter()
            .filter(|(thread, _)| thread == thread_id)
            .filter_map(|(_, label_id)| state.labels.iter().find(|l| &l.id == label_id))
            .map(|l| l.name.clone())
            .collect()
    }

    pub fn is_important(&self, thread_id: &str) -> bool {
        self.state.lock().unwrap().important.contains(thread_id)
    }

    pub fn is_in_inbox(&self, thread_id: &str) -> bool {
        self.state.lock().unwrap().inbox.contains(thread_id)
    }

    pub fn is_archived(&self, thread_id: &str) -> bool {
        self.state.lock().unwrap().archived.contains(thread_id)
    }

    /// Whether anything at all was done to the thread
    pub fn was_touched(&self, thread_id: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.applied.iter().any(|(thread, _)| thread == thread_id)
            || state.important.contains(thread_id)
            || state.unimportant.contains(thread_id)
            || state.inbox.contains(thread_id)
            || state.archived.contains(thread_id)
    }

    pub fn searches(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().searches.clone()
    }

    fn route(&self, thread_id: &str, apply: impl FnOnce(&mut StoreState)) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_routing.contains(thread_id) {
            return Err(GmailError::ServerError {
                status: 503,
                message: "Backend unavailable".to_string(),
            });
        }
        apply(&mut state);
        Ok(())
    }
}

#[async_trait]
impl MailClient for FakeMailStore {
    async fn search_threads(&self, query: &str, offset: usize, max: usize) -> Result<Vec<Thread>> {
        let mut state = self.state.lock().unwrap();
        state.searches.push((query.to_string(), max));

        if state.failing_queries.contains(query) {
            return Err(GmailError::RateLimited("Quota exceeded".to_string()));
        }

        Ok(state
            .threads_by_query
            .get(query)
            .map(|threads| threads.iter().skip(offset).take(max).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        Ok(self.state.lock().unwrap().labels.clone())
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        let mut state = self.state.lock().unwrap();
        if state.failing_label_names.contains(name) {
            return Err(GmailError::BadRequest(format!("Invalid label name: {}", name)));
        }
        if state.labels.iter().any(|l| label_key(&l.name) == label_key(name)) {
            return Err(GmailError::ApiError(format!("Label name exists or conflicts: {}", name)));
        }

        let label = create_test_label(&format!("Label_{}", state.labels.len() + 1), name);
        state.labels.push(label.clone());
        state.created.push(name.to_string());
        Ok(label)
    }

    async fn add_thread_label(&self, thread_id: &str, label_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_label_ids.contains(label_id) {
            return Err(GmailError::Forbidden(format!("Cannot apply {}", label_id)));
        }
        state.applied.push((thread_id.to_string(), label_id.to_string()));
        Ok(())
    }

    async fn mark_thread_important(&self, thread_id: &str) -> Result<()> {
        self.route(thread_id, |state| {
            state.important.insert(thread_id.to_string());
        })
    }

    async fn mark_thread_unimportant(&self, thread_id: &str) -> Result<()> {
        self.route(thread_id, |state| {
            state.unimportant.insert(thread_id.to_string());
        })
    }

    async fn move_thread_to_inbox(&self, thread_id: &str) -> Result<()> {
        self.route(thread_id, |state| {
            state.inbox.insert(thread_id.to_string());
        })
    }

    async fn move_thread_to_archive(&self, thread_id: &str) -> Result<()> {
        self.route(thread_id, |state| {
            state.archived.insert(thread_id.to_string());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_message_fixture() {
        let msg = github_message("m1", "my_org", "my_repo", Some("mention"));
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.subject, "[my_org/my_repo] Update");
        assert!(msg.raw_content.contains("List-ID: my_repo.my_org <my_org/my_repo.github.com>"));
        assert!(msg.raw_content.contains("X-GitHub-Reason: mention"));
    }

    #[test]
    fn test_bugzilla_message_without_url() {
        let msg = bugzilla_message("m1", None, "Platform", "UI", "None");
        assert!(!msg.raw_content.contains("X-Bugzilla-URL"));
    }

    #[tokio::test]
    async fn test_fake_store_records_creations() {
        let store = FakeMailStore::new();
        let label = store.create_label("GitHub").await.unwrap();
        assert_eq!(label.id, "Label_1");
        assert_eq!(store.created(), vec!["GitHub"]);
        assert!(store.create_label("github").await.is_err());
    }
}
