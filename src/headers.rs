//! Header pattern extraction over raw message content
//!
//! Provider knowledge lives in [`NamedPattern`] tables: a name for logging, a
//! regex evaluated line-anchored and case-insensitive over the header block,
//! and the capture group to return.

use regex::{Regex, RegexBuilder};

/// A declarative extraction rule: name -> pattern -> capture group
#[derive(Debug, Clone)]
pub struct NamedPattern {
    pub name: &'static str,
    regex: Regex,
    group: usize,
}

impl NamedPattern {
    /// Compile a pattern; `(?i)` and `(?m)` are always enabled
    pub fn new(name: &'static str, pattern: &str, group: usize) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .multi_line(true)
            .build()?;

        Ok(Self { name, regex, group })
    }

    /// Whether the pattern matches anywhere in the header block
    pub fn is_match(&self, headers: &HeaderBlock) -> bool {
        self.regex.is_match(&headers.text)
    }
}

/// The unfolded header block of a raw message
///
/// Everything after the first empty line (the body) is dropped, and folded
/// continuation lines are joined onto the header they continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    text: String,
}

impl HeaderBlock {
    pub fn parse(content: &str) -> Self {
        let mut lines: Vec<String> = Vec::new();

        for line in content.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            match lines.last_mut() {
                Some(previous) if line.starts_with([' ', '\t']) => {
                    previous.push(' ');
                    previous.push_str(line.trim_start());
                }
                _ => lines.push(line.to_string()),
            }
        }

        Self {
            text: lines.join("\n"),
        }
    }

    /// Apply a pattern and return its capture group, trimmed and decoded
    pub fn extract(&self, pattern: &NamedPattern) -> Option<String> {
        let value = pattern
            .regex
            .captures(&self.text)?
            .get(pattern.group)?
            .as_str()
            .trim();

        if value.is_empty() {
            return None;
        }

        Some(decode_value(value))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Extract a single pattern from raw message content
pub fn extract(content: &str, pattern: &NamedPattern) -> Option<String> {
    HeaderBlock::parse(content).extract(pattern)
}

/// Decode RFC 2047 encoded words in a header value
///
/// Adjacent encoded words are joined and `_` only stands for a space inside
/// an encoded word. Values without encoded words are returned as-is.
pub fn decode_value(value: &str) -> String {
    if !value.contains("=?") {
        return value.to_string();
    }

    match mailparse::parse_header(format!("X-Value: {}", value).as_bytes()) {
        Ok((header, _)) => header.get_value().trim().to_string(),
        Err(_) => value.to_string(),
    }
}
