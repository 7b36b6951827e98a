//! Hierarchical label resolution: every ancestor of a path exists before its leaf
use crate::client::MailClient;
use crate::error::{GmailError, Result};
use crate::models::Label;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Separator between label path segments
pub const LABEL_SEPARATOR: char = '/';

/// Case-folded key under which label names compare equal
pub fn label_key(name: &str) -> String {
    name.to_lowercase()
}

/// Resolves slash-separated label paths to store labels, creating them lazily
pub struct LabelManager {
    client: Arc<dyn MailClient>,
    label_cache: HashMap<String, Label>, // lowercase name -> label
    loaded: bool,
    created_labels: Vec<Label>,
}

impl LabelManager {
    /// Creates a new LabelManager instance
    pub fn new(client: Arc<dyn MailClient>) -> Self {
        Self {
            client,
            label_cache: HashMap::new(),
            loaded: false,
            created_labels: Vec::new(),
        }
    }

    /// Loads all existing labels from the store into the cache
    /// Note: Cache keys are stored lowercase, Gmail label names are case-insensitive
    pub async fn load_existing_labels(&mut self) -> Result<usize> {
        let labels = self.client.list_labels().await?;
        let count = labels.len();

        for label in labels {
            self.cache_insert(label);
        }

        self.loaded = true;
        info!("Loaded {} existing labels into cache", count);
        Ok(count)
    }

    async fn ensure_loaded(&mut self) -> Result<()> {
        if !self.loaded {
            self.load_existing_labels().await?;
        }
        Ok(())
    }

    fn cache_get(&self, name: &str) -> Option<&Label> {
        self.label_cache.get(&label_key(name))
    }

    fn cache_insert(&mut self, label: Label) {
        self.label_cache.insert(label_key(&label.name), label);
    }

    /// Looks up an existing label by its full name (case-insensitive)
    pub async fn get_label_by_name(&mut self, name: &str) -> Result<Option<Label>> {
        self.ensure_loaded().await?;
        Ok(self.cache_get(name).cloned())
    }

    /// Resolves a label path, creating any missing ancestors first
    ///
    /// For example, resolving "GitHub/eclipse/jdt" ensures "GitHub" and
    /// "GitHub/eclipse" exist before "GitHub/eclipse/jdt" is created. Resolving
    /// the same path again returns the cached label without touching the store.
    ///
    /// # Returns
    /// * `Ok(Label)` - The leaf label
    /// * `Err(GmailError::LabelError)` - If the path is empty or a creation fails
    pub async fn resolve(&mut self, path: &str) -> Result<Label> {
        let segments = split_label_path(path);
        if segments.is_empty() {
            return Err(GmailError::LabelError(format!(
                "Label path '{}' has no usable segments",
                path
            )));
        }

        self.ensure_loaded().await?;

        let mut resolved = None;
        for depth in 1..=segments.len() {
            let name = segments[..depth].join("/");

            if let Some(label) = self.cache_get(&name) {
                resolved = Some(label.clone());
                continue;
            }

            debug!("Creating label: {}", name);
            let label = match self.client.create_label(&name).await {
                Ok(label) => label,
                Err(e) => {
                    error!(path = %path, label = %name, "Failed to create label: {}", e);
                    return Err(GmailError::LabelError(format!(
                        "Failed to create label '{}': {}",
                        name, e
                    )));
                }
            };

            info!("Created label '{}' with ID: {}", label.name, label.id);
            // Cache under the requested name as well, in case the store normalised it
            self.label_cache.insert(label_key(&name), label.clone());
            self.cache_insert(label.clone());
            self.created_labels.push(label.clone());
            resolved = Some(label);
        }

        resolved.ok_or_else(|| GmailError::LabelError(format!("Label path '{}' did not resolve", path)))
    }

    /// Labels created by this manager during the current run
    pub fn created_labels(&self) -> &[Label] {
        &self.created_labels
    }
}

/// Splits a label path into sanitized, non-empty segments
pub fn split_label_path(path: &str) -> Vec<String> {
    path.split(LABEL_SEPARATOR)
        .map(sanitize_segment)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Normalises a label path the same way [`LabelManager::resolve`] does
pub fn normalize_label_path(path: &str) -> String {
    split_label_path(path).join("/")
}

/// Gmail does not accept parentheses in label names
pub fn sanitize_segment(segment: &str) -> String {
    segment.trim().replace(['(', ')'], "_")
}
