//! Meditation session progress model

use serde::{Deserialize, Serialize};

use super::record::{same_tags, union_tags, DomainRecord, RecordDomain, RecordMeta};
use crate::error::{Error, Result};

/// Progress through one meditation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Meditation (audio/course item) this session belongs to
    pub meditation_id: String,
    /// Planned length in seconds
    pub duration_seconds: u32,
    /// Seconds actually practiced
    pub completed_seconds: u32,
    pub completed: bool,
    /// Self-rated quality, 1 to 5
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SessionProgress {
    /// Start tracking a new session
    pub fn new(
        user_id: impl Into<String>,
        meditation_id: impl Into<String>,
        duration_seconds: u32,
    ) -> Self {
        Self {
            meta: RecordMeta::new(user_id),
            meditation_id: meditation_id.into(),
            duration_seconds,
            completed_seconds: 0,
            completed: false,
            quality: None,
            notes: String::new(),
            tags: Vec::new(),
        }
    }

    /// Record practiced time, completing the session once the plan is met
    pub fn record_progress(&mut self, completed_seconds: u32) {
        self.completed_seconds = completed_seconds.min(self.duration_seconds);
        self.completed = self.completed_seconds >= self.duration_seconds;
        self.meta.touch();
    }
}

impl DomainRecord for SessionProgress {
    const DOMAIN: RecordDomain = RecordDomain::Sessions;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn differing_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.meditation_id != other.meditation_id {
            fields.push("meditation_id");
        }
        if self.duration_seconds != other.duration_seconds {
            fields.push("duration_seconds");
        }
        if self.completed_seconds != other.completed_seconds {
            fields.push("completed_seconds");
        }
        if self.completed != other.completed {
            fields.push("completed");
        }
        if self.quality != other.quality {
            fields.push("quality");
        }
        if self.notes != other.notes {
            fields.push("notes");
        }
        if !same_tags(&self.tags, &other.tags) {
            fields.push("tags");
        }
        fields
    }

    fn merge_with(&self, other: &Self) -> Self {
        let newer = if other.meta.last_modified > self.meta.last_modified {
            other
        } else {
            self
        };
        Self {
            meta: self.meta.clone(),
            meditation_id: self.meditation_id.clone(),
            duration_seconds: newer.duration_seconds,
            completed_seconds: newer.completed_seconds,
            completed: newer.completed,
            quality: newer.quality,
            notes: self.notes.clone(),
            tags: union_tags(&self.tags, &other.tags),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.meditation_id.trim().is_empty() {
            return Err(Error::InvalidRecord("meditation_id must not be empty".into()));
        }
        if self.completed_seconds > self.duration_seconds {
            return Err(Error::InvalidRecord(format!(
                "completed_seconds {} exceeds duration_seconds {}",
                self.completed_seconds, self.duration_seconds
            )));
        }
        if let Some(quality) = self.quality {
            if !(1..=5).contains(&quality) {
                return Err(Error::InvalidRecord(format!(
                    "session quality must be 1-5, got {quality}"
                )));
            }
        }
        Ok(())
    }
}
