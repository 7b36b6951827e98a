//! Provider rules: search filter, importance predicate and label extraction
//!
//! Each rule reads only the header block of a message. A missing or malformed
//! header degrades to "no label for this message"; the one exception is a
//! Bugzilla message without `X-Bugzilla-URL`, whose root label cannot be chosen.

use clap::ValueEnum;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::Config;
use crate::error::{GmailError, Result};
use crate::headers::{HeaderBlock, NamedPattern};
use crate::models::{ClassificationResult, Message};

/// Gmail search predicate for threads without any user label
pub const UNLABELED_PREDICATE: &str = "has:nouserlabels";

fn pattern(name: &'static str, regex: &str, group: usize) -> NamedPattern {
    NamedPattern::new(name, regex, group).unwrap()
}

/// Classification strategy for one provider
pub trait ClassifierRule: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Gmail query selecting the unlabeled threads this rule handles
    fn search_filter(&self) -> String;

    fn is_important(&self, _message: &Message) -> bool {
        false
    }

    /// Label path for a message, `None` when nothing could be extracted
    ///
    /// Only structural failures are returned as errors.
    fn find_label_path(&self, message: &Message) -> Result<Option<String>>;

    fn classify(&self, message: &Message) -> Result<ClassificationResult> {
        Ok(ClassificationResult {
            label_path: self.find_label_path(message)?,
            important: self.is_important(message),
        })
    }
}

/// The providers a rule can be built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    #[value(name = "github")]
    #[serde(rename = "github")]
    GitHub,
    #[value(name = "gitlab")]
    #[serde(rename = "gitlab")]
    GitLab,
    Bugzilla,
    MailingList,
}

impl RuleKind {
    /// Run order: most specific providers first
    pub const ALL: [RuleKind; 4] = [
        RuleKind::GitHub,
        RuleKind::GitLab,
        RuleKind::Bugzilla,
        RuleKind::MailingList,
    ];

    pub fn build(self, config: &Config) -> Box<dyn ClassifierRule> {
        match self {
            RuleKind::GitHub => Box::new(GitHubRule),
            RuleKind::GitLab => Box::new(GitLabRule::new(&config.rules.gitlab.host)),
            RuleKind::Bugzilla => Box::new(BugzillaRule),
            RuleKind::MailingList => Box::new(MailingListRule),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleKind::GitHub => "github",
            RuleKind::GitLab => "gitlab",
            RuleKind::Bugzilla => "bugzilla",
            RuleKind::MailingList => "mailing-list",
        };
        f.write_str(name)
    }
}

/// Instantiates every rule enabled in the configuration, in run order
pub fn build_rules(config: &Config) -> Vec<(RuleKind, Box<dyn ClassifierRule>)> {
    RuleKind::ALL
        .into_iter()
        .filter(|kind| config.rules.is_enabled(*kind))
        .map(|kind| (kind, kind.build(config)))
        .collect()
}

// ---------------------------------------------------------------------------
// Mailing lists
// ---------------------------------------------------------------------------

const MAILING_LIST_ROOT: &str = "Eclipse Lists";
const HUBSPOT_LISTS: &str = "HubSpot Lists";

struct MailingListPatterns {
    list_id: NamedPattern,
    sender_local_part: NamedPattern,
    /// Any of these marks the message as coming through a bulk-mail relay
    relay_markers: Vec<NamedPattern>,
}

static MAILING_LIST_PATTERNS: Lazy<MailingListPatterns> = Lazy::new(|| MailingListPatterns {
    list_id: pattern("List-ID", r"^List-ID:.*<([^<>]+?)\.eclipse\.org>", 1),
    sender_local_part: pattern("From local part", r"^From:(?:.*<)?\s*([^<>@\s]+)@", 1),
    relay_markers: vec![
        pattern("abuse report", r"^X-Report-Abuse-To:.*hubspot", 0),
        pattern("mailer signature", r"^X-Mailer:.*hubspot", 0),
        pattern("build result", r"^X-Jenkins-Result:", 0),
        pattern("calendar sender", r"^From:.*calendar-notification@google\.com", 0),
    ],
});

/// Eclipse Foundation mailing lists and the bulk mail relayed next to them
pub struct MailingListRule;

impl ClassifierRule for MailingListRule {
    fn name(&self) -> &str {
        "mailing-list"
    }

    fn search_filter(&self) -> String {
        format!(
            "{} (list:eclipse.org OR from:eclipse.org OR from:calendar-notification@google.com)",
            UNLABELED_PREDICATE
        )
    }

    fn find_label_path(&self, message: &Message) -> Result<Option<String>> {
        let headers = HeaderBlock::parse(&message.raw_content);
        let patterns = &*MAILING_LIST_PATTERNS;

        if let Some(list_id) = headers.extract(&patterns.list_id) {
            return Ok(Some(format!("{}/{}", MAILING_LIST_ROOT, list_id)));
        }

        let relayed = patterns
            .relay_markers
            .iter()
            .find(|marker| marker.is_match(&headers));

        if let Some(marker) = relayed {
            debug!(message_id = %message.id, "Bulk relay detected by {}", marker.name);
            return match headers.extract(&patterns.sender_local_part) {
                Some(from_name) => Ok(Some(format!(
                    "{}/{}/{}",
                    MAILING_LIST_ROOT, HUBSPOT_LISTS, from_name
                ))),
                None => {
                    warn!(message_id = %message.id, "Relayed message without a usable From address");
                    Ok(None)
                }
            };
        }

        error!(
            message_id = %message.id,
            subject = %message.subject,
            "No List-ID and no bulk relay marker"
        );
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

const GITHUB_ROOT: &str = "GitHub";

/// Notification reasons that don't deserve the inbox
const GITHUB_UNIMPORTANT_REASONS: &[&str] = &["subscribed", "team_mention", "ci_activity"];

struct GitHubPatterns {
    reason: NamedPattern,
    /// `<org>/<repo>` pairs, tried in order
    list_id: Vec<(NamedPattern, NamedPattern)>,
}

static GITHUB_PATTERNS: Lazy<GitHubPatterns> = Lazy::new(|| {
    // <org/repo.github.com>
    let bracketed = r"^List-ID:.*<([^/<>\s]+)/([^<>\s]+?)\.github\.com>";
    // org/repo <repo.org.github.com>
    let display = r#"^List-ID:\s*"?([^/\s"<]+)/([^\s"<]+?)"?\s*<[^<>]*\.github\.com>"#;

    GitHubPatterns {
        reason: pattern("X-GitHub-Reason", r"^X-GitHub-Reason:(.*)$", 1),
        list_id: vec![
            (
                pattern("List-ID org", bracketed, 1),
                pattern("List-ID repo", bracketed, 2),
            ),
            (
                pattern("List-ID org", display, 1),
                pattern("List-ID repo", display, 2),
            ),
        ],
    }
});

/// GitHub notification mail
pub struct GitHubRule;

impl ClassifierRule for GitHubRule {
    fn name(&self) -> &str {
        "github"
    }

    fn search_filter(&self) -> String {
        format!("{} from:notifications@github.com", UNLABELED_PREDICATE)
    }

    fn is_important(&self, message: &Message) -> bool {
        let headers = HeaderBlock::parse(&message.raw_content);
        match headers.extract(&GITHUB_PATTERNS.reason) {
            Some(reason) => !GITHUB_UNIMPORTANT_REASONS
                .iter()
                .any(|unimportant| reason.eq_ignore_ascii_case(unimportant)),
            None => false,
        }
    }

    fn find_label_path(&self, message: &Message) -> Result<Option<String>> {
        let headers = HeaderBlock::parse(&message.raw_content);

        for (org_pattern, repo_pattern) in &GITHUB_PATTERNS.list_id {
            if let (Some(org), Some(repo)) =
                (headers.extract(org_pattern), headers.extract(repo_pattern))
            {
                return Ok(Some(format!(
                    "{}/{}/{}",
                    GITHUB_ROOT,
                    org.replace('_', " "),
                    repo.replace('_', " ")
                )));
            }
        }

        error!(
            message_id = %message.id,
            subject = %message.subject,
            "Missing or malformed GitHub List-ID"
        );
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// GitLab
// ---------------------------------------------------------------------------

static GITLAB_PROJECT_PATH: Lazy<NamedPattern> =
    Lazy::new(|| pattern("X-GitLab-Project-Path", r"^X-GitLab-Project-Path:(.*)$", 1));

/// Notifications from a self-hosted GitLab instance
pub struct GitLabRule {
    host: String,
    root: String,
}

impl GitLabRule {
    /// `host` is the mail domain, e.g. `eclipse.org` for gitlab.eclipse.org
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            root: format!("gitlab.{}", host),
        }
    }
}

impl ClassifierRule for GitLabRule {
    fn name(&self) -> &str {
        "gitlab"
    }

    fn search_filter(&self) -> String {
        format!("{} from:gitlab@{}", UNLABELED_PREDICATE, self.host)
    }

    fn find_label_path(&self, message: &Message) -> Result<Option<String>> {
        let headers = HeaderBlock::parse(&message.raw_content);

        let Some(project_path) = headers.extract(&GITLAB_PROJECT_PATH) else {
            warn!(message_id = %message.id, "No X-GitLab-Project-Path, using root label");
            return Ok(Some(self.root.clone()));
        };

        let path = std::iter::once(self.root.as_str())
            .chain(
                project_path
                    .split('/')
                    .map(str::trim)
                    .filter(|segment| !segment.is_empty()),
            )
            .collect::<Vec<_>>()
            .join("/");

        Ok(Some(path))
    }
}

// ---------------------------------------------------------------------------
// Bugzilla
// ---------------------------------------------------------------------------

const UNKNOWN_BUGZILLA: &str = "Unknown Bugzilla";

/// Known Bugzilla instances, matched in order against the URL header
const BUGZILLA_ROOTS: &[(&str, &str)] = &[
    ("bugs.eclipse.org", "Eclipse Bugs"),
    ("bugzilla.redhat.com", "Red Hat Bugs"),
    ("bugzilla.mozilla.org", "Mozilla Bugs"),
    ("bugs.kde.org", "KDE Bugs"),
    ("bugzilla.gnome.org", "GNOME Bugs"),
];

struct BugzillaPatterns {
    url: NamedPattern,
    reason: NamedPattern,
    product: NamedPattern,
    component: NamedPattern,
}

static BUGZILLA_PATTERNS: Lazy<BugzillaPatterns> = Lazy::new(|| BugzillaPatterns {
    url: pattern("X-Bugzilla-URL", r"^X-Bugzilla-URL:(.*)$", 1),
    reason: pattern("X-Bugzilla-Reason", r"^X-Bugzilla-Reason:(.*)$", 1),
    product: pattern("X-Bugzilla-Product", r"^X-Bugzilla-Product:(.*)$", 1),
    component: pattern("X-Bugzilla-Component", r"^X-Bugzilla-Component:(.*)$", 1),
});

/// Root label for a Bugzilla base URL, chosen by its host
pub fn bugzilla_root(url: &str) -> &'static str {
    let Some(host) = Url::parse(url.trim())
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
    else {
        return UNKNOWN_BUGZILLA;
    };

    BUGZILLA_ROOTS
        .iter()
        .find(|(domain, _)| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
        .map(|(_, root)| *root)
        .unwrap_or(UNKNOWN_BUGZILLA)
}

/// Bugzilla bug mail
pub struct BugzillaRule;

impl ClassifierRule for BugzillaRule {
    fn name(&self) -> &str {
        "bugzilla"
    }

    fn search_filter(&self) -> String {
        format!("{} from:bugzilla-daemon", UNLABELED_PREDICATE)
    }

    fn is_important(&self, message: &Message) -> bool {
        let headers = HeaderBlock::parse(&message.raw_content);
        match headers.extract(&BUGZILLA_PATTERNS.reason) {
            Some(reason) => reason != "None",
            None => false,
        }
    }

    fn find_label_path(&self, message: &Message) -> Result<Option<String>> {
        let headers = HeaderBlock::parse(&message.raw_content);
        let patterns = &*BUGZILLA_PATTERNS;

        let url = headers
            .extract(&patterns.url)
            .ok_or_else(|| GmailError::MissingHeader {
                header: patterns.url.name.to_string(),
                message_id: message.id.clone(),
            })?;
        let root = bugzilla_root(&url);

        match (headers.extract(&patterns.product), headers.extract(&patterns.component)) {
            (Some(product), Some(component)) => {
                Ok(Some(format!("{}/{}/{}", root, product, component)))
            }
            _ => {
                warn!(
                    message_id = %message.id,
                    "No product/component headers, labeling with {} only", root
                );
                Ok(Some(root.to_string()))
            }
        }
    }
}
