use chrono::{DateTime, Utc};
use mailparse::MailHeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::{GmailError, Result};

/// A single message as fetched from the mail store
///
/// `raw_content` is the full RFC 5322 text (header block + body); the other
/// fields are parsed out of it once so logging doesn't have to re-parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub raw_content: String,
    pub subject: String,
    pub from: String,
    pub date: Option<DateTime<Utc>>,
}

impl Message {
    /// Build a message from its raw RFC 5322 bytes
    pub fn from_raw(id: impl Into<String>, raw: &[u8]) -> Result<Self> {
        let id = id.into();
        let (headers, _) = mailparse::parse_headers(raw).map_err(|e| {
            GmailError::InvalidMessageFormat(format!("Cannot parse headers of {}: {}", id, e))
        })?;

        let subject = headers.get_first_value("Subject").unwrap_or_default();
        let from = headers.get_first_value("From").unwrap_or_default();
        let date = headers
            .get_first_value("Date")
            .and_then(|value| mailparse::dateparse(&value).ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0));

        Ok(Self {
            id,
            raw_content: String::from_utf8_lossy(raw).into_owned(),
            subject,
            from,
            date,
        })
    }
}

/// A conversation in the mail store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub subject: String,
    pub messages: Vec<Message>,
}

impl Thread {
    pub fn new(id: impl Into<String>, messages: Vec<Message>) -> Self {
        let subject = messages
            .first()
            .map(|m| m.subject.clone())
            .unwrap_or_default();

        Self {
            id: id.into(),
            subject,
            messages,
        }
    }
}

/// A user label; `name` is the full slash-separated path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Per-message classification verdict
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label_path: Option<String>,
    pub important: bool,
}

/// Per-thread aggregate of the message verdicts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPlan {
    /// Distinct label paths in first-seen order
    pub label_paths: Vec<String>,
    pub important: bool,
}

impl ThreadPlan {
    /// Fold one message verdict into the plan
    pub fn merge(&mut self, result: ClassificationResult) {
        if let Some(path) = result.label_path {
            if !self.label_paths.contains(&path) {
                self.label_paths.push(path);
            }
        }
        self.important |= result.important;
    }
}
