//! Journal entry model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::record::{same_tags, union_tags, DomainRecord, RecordDomain, RecordMeta};
use crate::error::{Error, Result};

/// A free-text journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub title: String,
    pub content: String,
    /// Optional mood score (1-10) attached to the entry
    #[serde(default)]
    pub mood: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl JournalEntry {
    /// Create an entry; tags are seeded from `#hashtags` in the content
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            meta: RecordMeta::new(user_id),
            title: title.into(),
            tags: extract_tags(&content),
            content,
            mood: None,
        }
    }

    /// Replace the content, adding any new hashtags to the tag list
    pub fn edit_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.tags = union_tags(&self.tags, &extract_tags(&self.content));
        self.meta.touch();
    }
}

/// Extract #tags from text
///
/// Valid tags match the pattern: `#[a-zA-Z][a-zA-Z0-9_-]*`
/// Tags are returned in lowercase, deduplicated and sorted.
///
/// # Examples
///
/// ```
/// use stillwater_core::models::extract_tags;
///
/// let tags = extract_tags("Calmer today #breath #Gratitude");
/// assert_eq!(tags, vec!["breath".to_string(), "gratitude".to_string()]);
/// ```
#[must_use]
pub fn extract_tags(text: &str) -> Vec<String> {
    let re = Regex::new(r"#([a-zA-Z][a-zA-Z0-9_-]*)").expect("Invalid regex");
    re.captures_iter(text)
        .map(|cap| cap[1].to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl DomainRecord for JournalEntry {
    const DOMAIN: RecordDomain = RecordDomain::Journals;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn differing_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title != other.title {
            fields.push("title");
        }
        if self.content != other.content {
            fields.push("content");
        }
        if self.mood != other.mood {
            fields.push("mood");
        }
        if !same_tags(&self.tags, &other.tags) {
            fields.push("tags");
        }
        fields
    }

    fn merge_with(&self, other: &Self) -> Self {
        let mood = if other.meta.last_modified > self.meta.last_modified {
            other.mood
        } else {
            self.mood
        };
        Self {
            meta: self.meta.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            mood,
            tags: union_tags(&self.tags, &other.tags),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() && self.content.trim().is_empty() {
            return Err(Error::InvalidRecord("journal entry is empty".into()));
        }
        if let Some(mood) = self.mood {
            if !(1..=10).contains(&mood) {
                return Err(Error::InvalidRecord(format!(
                    "journal mood must be 1-10, got {mood}"
                )));
            }
        }
        Ok(())
    }
}
