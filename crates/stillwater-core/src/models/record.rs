//! Syncable record model shared by every domain

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{JournalEntry, MoodEntry, SessionProgress};
use crate::error::{Error, Result};
use crate::util::now_millis;

/// The three record kinds the sync engine reconciles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordDomain {
    /// Meditation session progress
    Sessions,
    /// Mood check-ins
    Moods,
    /// Journal entries
    Journals,
}

impl RecordDomain {
    /// All domains in their default processing order
    pub const ALL: [Self; 3] = [Self::Sessions, Self::Moods, Self::Journals];

    /// Stable lowercase name used in storage and logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::Moods => "moods",
            Self::Journals => "journals",
        }
    }

    /// Remote collection holding this domain's rows
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Sessions => "session_progress",
            Self::Moods => "mood_entries",
            Self::Journals => "journal_entries",
        }
    }
}

impl fmt::Display for RecordDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordDomain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sessions" | "session" => Ok(Self::Sessions),
            "moods" | "mood" => Ok(Self::Moods),
            "journals" | "journal" => Ok(Self::Journals),
            other => Err(Error::unknown("record domain", other)),
        }
    }
}

/// Per-record synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Changed locally since the last successful upload
    #[default]
    Pending,
    /// Matches the remote copy
    Synced,
    /// Rejected by the backend or parked in the conflict queue
    Failed,
}

impl RecordStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(Error::unknown("sync status", other)),
        }
    }
}

/// Identity and bookkeeping fields carried by every record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Client-generated identifier (UUID v7 unless imported)
    pub id: String,
    /// Owner of the record
    pub user_id: String,
    /// Starts at 1, bumped on every local mutation, never decreases
    pub version: i64,
    /// Last modification timestamp (Unix ms)
    pub last_modified: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Synchronization state
    #[serde(default)]
    pub sync_status: RecordStatus,
}

impl RecordMeta {
    /// Fresh metadata for a record created on this device
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            version: 1,
            last_modified: now,
            created_at: now,
            sync_status: RecordStatus::Pending,
        }
    }

    /// Record a local mutation: bump the version and mark pending
    pub fn touch(&mut self) {
        self.version += 1;
        self.last_modified = now_millis().max(self.last_modified + 1);
        self.sync_status = RecordStatus::Pending;
    }
}

/// Behaviour each domain payload provides to the sync engine
pub trait DomainRecord {
    /// Domain tag of this record type
    const DOMAIN: RecordDomain;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Names of payload fields whose values differ from `other`
    fn differing_fields(&self, other: &Self) -> Vec<&'static str>;

    /// Field-level merge of `self` (local) with `other` (remote).
    ///
    /// Tags are unioned, free text is kept from `self`, other scalars come
    /// from whichever side is newer (`self` on ties). Metadata is left to the
    /// caller.
    #[must_use]
    fn merge_with(&self, other: &Self) -> Self;

    /// Check payload ranges before the record leaves the device
    fn validate(&self) -> Result<()>;
}

/// A record from any of the three domains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "domain")]
pub enum SyncableRecord {
    #[serde(rename = "sessions")]
    Session(SessionProgress),
    #[serde(rename = "moods")]
    Mood(MoodEntry),
    #[serde(rename = "journals")]
    Journal(JournalEntry),
}

impl SyncableRecord {
    pub const fn domain(&self) -> RecordDomain {
        match self {
            Self::Session(_) => RecordDomain::Sessions,
            Self::Mood(_) => RecordDomain::Moods,
            Self::Journal(_) => RecordDomain::Journals,
        }
    }

    pub fn meta(&self) -> &RecordMeta {
        match self {
            Self::Session(record) => record.meta(),
            Self::Mood(record) => record.meta(),
            Self::Journal(record) => record.meta(),
        }
    }

    pub fn meta_mut(&mut self) -> &mut RecordMeta {
        match self {
            Self::Session(record) => record.meta_mut(),
            Self::Mood(record) => record.meta_mut(),
            Self::Journal(record) => record.meta_mut(),
        }
    }

    pub fn id(&self) -> &str {
        &self.meta().id
    }

    pub fn user_id(&self) -> &str {
        &self.meta().user_id
    }

    pub fn version(&self) -> i64 {
        self.meta().version
    }

    pub fn last_modified(&self) -> i64 {
        self.meta().last_modified
    }

    pub fn sync_status(&self) -> RecordStatus {
        self.meta().sync_status
    }

    /// Copy of this record with a different sync status
    #[must_use]
    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.meta_mut().sync_status = status;
        self
    }

    /// Differing payload fields, or `None` when the domains do not match
    pub fn differing_fields(&self, other: &Self) -> Option<Vec<&'static str>> {
        match (self, other) {
            (Self::Session(local), Self::Session(remote)) => Some(local.differing_fields(remote)),
            (Self::Mood(local), Self::Mood(remote)) => Some(local.differing_fields(remote)),
            (Self::Journal(local), Self::Journal(remote)) => Some(local.differing_fields(remote)),
            _ => None,
        }
    }

    /// Field-level merge, or `None` when the domains do not match
    pub fn merge_with(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Session(local), Self::Session(remote)) => {
                Some(Self::Session(local.merge_with(remote)))
            }
            (Self::Mood(local), Self::Mood(remote)) => Some(Self::Mood(local.merge_with(remote))),
            (Self::Journal(local), Self::Journal(remote)) => {
                Some(Self::Journal(local.merge_with(remote)))
            }
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Session(record) => record.validate(),
            Self::Mood(record) => record.validate(),
            Self::Journal(record) => record.validate(),
        }
    }

    /// JSON size of the record, used for data-usage accounting
    pub fn estimated_size(&self) -> usize {
        serde_json::to_vec(self).map_or(0, |bytes| bytes.len())
    }
}

impl From<SessionProgress> for SyncableRecord {
    fn from(record: SessionProgress) -> Self {
        Self::Session(record)
    }
}

impl From<MoodEntry> for SyncableRecord {
    fn from(record: MoodEntry) -> Self {
        Self::Mood(record)
    }
}

impl From<JournalEntry> for SyncableRecord {
    fn from(record: JournalEntry) -> Self {
        Self::Journal(record)
    }
}

/// One value per domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerDomain<T> {
    pub sessions: T,
    pub moods: T,
    pub journals: T,
}

impl<T> PerDomain<T> {
    pub const fn get(&self, domain: RecordDomain) -> &T {
        match domain {
            RecordDomain::Sessions => &self.sessions,
            RecordDomain::Moods => &self.moods,
            RecordDomain::Journals => &self.journals,
        }
    }

    pub fn get_mut(&mut self, domain: RecordDomain) -> &mut T {
        match domain {
            RecordDomain::Sessions => &mut self.sessions,
            RecordDomain::Moods => &mut self.moods,
            RecordDomain::Journals => &mut self.journals,
        }
    }
}

impl PerDomain<usize> {
    pub const fn total(&self) -> usize {
        self.sessions + self.moods + self.journals
    }
}

/// Union of two tag lists, keeping `local` order first
pub(crate) fn union_tags(local: &[String], remote: &[String]) -> Vec<String> {
    let mut merged = local.to_vec();
    for tag in remote {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    merged
}

/// Whether two tag lists hold the same set of tags
pub(crate) fn same_tags(left: &[String], right: &[String]) -> bool {
    let left: BTreeSet<&str> = left.iter().map(String::as_str).collect();
    let right: BTreeSet<&str> = right.iter().map(String::as_str).collect();
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_roundtrip() {
        for domain in RecordDomain::ALL {
            assert_eq!(domain.as_str().parse::<RecordDomain>().unwrap(), domain);
        }
        assert!("habits".parse::<RecordDomain>().is_err());
    }

    #[test]
    fn test_meta_touch_bumps_version() {
        let mut meta = RecordMeta::new("user-1");
        meta.sync_status = RecordStatus::Synced;
        let before = meta.last_modified;

        meta.touch();

        assert_eq!(meta.version, 2);
        assert!(meta.last_modified > before);
        assert_eq!(meta.sync_status, RecordStatus::Pending);
    }

    #[test]
    fn test_union_tags_keeps_local_order() {
        let local = vec!["calm".to_string(), "morning".to_string()];
        let remote = vec!["evening".to_string(), "calm".to_string()];
        assert_eq!(union_tags(&local, &remote), vec!["calm", "morning", "evening"]);
    }

    #[test]
    fn test_same_tags_ignores_order() {
        let left = vec!["a".to_string(), "b".to_string()];
        let right = vec!["b".to_string(), "a".to_string()];
        assert!(same_tags(&left, &right));
        assert!(!same_tags(&left, &["a".to_string()]));
    }

    #[test]
    fn test_same_tags_compares_sets() {
        let tags = |list: &[&str]| list.iter().map(ToString::to_string).collect::<Vec<_>>();

        assert!(same_tags(&tags(&["calm", "calm"]), &tags(&["calm"])));
        assert!(!same_tags(&tags(&["a", "a"]), &tags(&["a", "b"])));
        assert!(!same_tags(&tags(&["a", "b"]), &tags(&["a", "a"])));
    }

    #[test]
    fn test_record_serializes_with_domain_tag() {
        let mood = MoodEntry::new("user-1", 7, 6, 3);
        let record = SyncableRecord::from(mood);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["domain"], "moods");
        assert_eq!(json["mood"], 7);

        let decoded: SyncableRecord = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, record);
    }
}
