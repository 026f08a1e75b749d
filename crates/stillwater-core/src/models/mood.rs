//! Mood check-in model

use serde::{Deserialize, Serialize};

use super::record::{same_tags, union_tags, DomainRecord, RecordDomain, RecordMeta};
use crate::error::{Error, Result};

/// A mood check-in. Scores run from 1 (lowest) to 10 (highest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodEntry {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub mood: u8,
    pub energy: u8,
    pub stress: u8,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MoodEntry {
    pub fn new(user_id: impl Into<String>, mood: u8, energy: u8, stress: u8) -> Self {
        Self {
            meta: RecordMeta::new(user_id),
            mood,
            energy,
            stress,
            notes: String::new(),
            tags: Vec::new(),
        }
    }
}

fn check_score(name: &str, value: u8) -> Result<()> {
    if (1..=10).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidRecord(format!("{name} must be 1-10, got {value}")))
    }
}

impl DomainRecord for MoodEntry {
    const DOMAIN: RecordDomain = RecordDomain::Moods;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn differing_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.mood != other.mood {
            fields.push("mood");
        }
        if self.energy != other.energy {
            fields.push("energy");
        }
        if self.stress != other.stress {
            fields.push("stress");
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
            mood: newer.mood,
            energy: newer.energy,
            stress: newer.stress,
            notes: self.notes.clone(),
            tags: union_tags(&self.tags, &other.tags),
        }
    }

    fn validate(&self) -> Result<()> {
        check_score("mood", self.mood)?;
        check_score("energy", self.energy)?;
        check_score("stress", self.stress)
    }
}
