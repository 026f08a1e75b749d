//! Retry queue with linear or exponential backoff

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::RecordDomain;

/// Domain and id of a queued record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    pub domain: RecordDomain,
    pub id: String,
}

impl RecordRef {
    pub fn new(domain: RecordDomain, id: impl Into<String>) -> Self {
        Self {
            domain,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryQueueEntry {
    pub record_ref: RecordRef,
    /// Failed attempts so far
    pub retry_count: u32,
    /// Earliest time of the next attempt (Unix ms)
    pub next_retry_at: i64,
    pub last_error: String,
}

/// What happens to a record after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again at `next_retry_at`
    Scheduled(RetryQueueEntry),
    /// Retry budget spent; the entry has left the queue
    Exhausted(RetryQueueEntry),
}

/// Failed uploads waiting for another attempt
#[derive(Debug, Clone)]
pub struct RetryQueue {
    base_delay: Duration,
    max_retries: u32,
    exponential: bool,
    entries: BTreeMap<RecordRef, RetryQueueEntry>,
}

impl RetryQueue {
    pub fn new(base_delay: Duration, max_retries: u32, exponential: bool) -> Self {
        Self {
            base_delay,
            max_retries: max_retries.max(1),
            exponential,
            entries: BTreeMap::new(),
        }
    }

    /// Delay before the attempt following failure number `retry_count`
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let step = retry_count.max(1);
        let factor = if self.exponential {
            2_u32.checked_pow(step - 1).unwrap_or(u32::MAX)
        } else {
            step
        };
        self.base_delay.saturating_mul(factor)
    }

    /// Record a failed attempt at `now` (Unix ms)
    pub fn record_failure(
        &mut self,
        record_ref: RecordRef,
        error: impl Into<String>,
        now: i64,
    ) -> RetryDecision {
        let previous = self.entries.remove(&record_ref);
        let retry_count = previous.as_ref().map_or(0, |entry| entry.retry_count) + 1;
        let delay_ms = i64::try_from(self.delay_for(retry_count).as_millis()).unwrap_or(i64::MAX);
        let mut next_retry_at = now.saturating_add(delay_ms);
        if let Some(previous) = &previous {
            next_retry_at = next_retry_at.max(previous.next_retry_at + 1);
        }

        let entry = RetryQueueEntry {
            record_ref,
            retry_count,
            next_retry_at,
            last_error: error.into(),
        };

        if retry_count >= self.max_retries {
            RetryDecision::Exhausted(entry)
        } else {
            self.entries.insert(entry.record_ref.clone(), entry.clone());
            RetryDecision::Scheduled(entry)
        }
    }

    /// Drop a record after a successful attempt
    pub fn remove(&mut self, record_ref: &RecordRef) -> Option<RetryQueueEntry> {
        self.entries.remove(record_ref)
    }

    pub fn get(&self, record_ref: &RecordRef) -> Option<&RetryQueueEntry> {
        self.entries.get(record_ref)
    }

    /// The entry of `domain` that becomes eligible first
    pub fn next_for(&self, domain: RecordDomain) -> Option<&RetryQueueEntry> {
        self.entries
            .values()
            .filter(|entry| entry.record_ref.domain == domain)
            .min_by_key(|entry| entry.next_retry_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_700_000_000_000;

    fn record() -> RecordRef {
        RecordRef::new(RecordDomain::Moods, "m-1")
    }

    fn scheduled(decision: RetryDecision) -> RetryQueueEntry {
        match decision {
            RetryDecision::Scheduled(entry) => entry,
            RetryDecision::Exhausted(entry) => panic!("unexpected exhaustion: {entry:?}"),
        }
    }

    #[test]
    fn exponential_delays_double() {
        let queue = RetryQueue::new(Duration::from_secs(1), 5, true);
        assert_eq!(queue.delay_for(1), Duration::from_secs(1));
        assert_eq!(queue.delay_for(2), Duration::from_secs(2));
        assert_eq!(queue.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn linear_delays_grow_by_base() {
        let queue = RetryQueue::new(Duration::from_secs(1), 5, false);
        assert_eq!(queue.delay_for(1), Duration::from_secs(1));
        assert_eq!(queue.delay_for(3), Duration::from_secs(3));
    }

    #[test]
    fn first_failure_schedules_after_base_delay() {
        let mut queue = RetryQueue::new(Duration::from_secs(1), 3, true);
        let entry = scheduled(queue.record_failure(record(), "timeout", NOW));

        assert_eq!(entry.retry_count, 1);
        assert_eq!(entry.next_retry_at, NOW + 1_000);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(&record()), Some(&entry));

        queue.remove(&record());
        assert!(queue.get(&record()).is_none());
    }

    #[test]
    fn next_retry_time_strictly_increases() {
        let mut queue = RetryQueue::new(Duration::ZERO, 10, true);
        let first = scheduled(queue.record_failure(record(), "timeout", NOW));
        let second = scheduled(queue.record_failure(record(), "timeout", NOW));
        let third = scheduled(queue.record_failure(record(), "timeout", NOW));

        assert!(second.next_retry_at > first.next_retry_at);
        assert!(third.next_retry_at > second.next_retry_at);
    }

    #[test]
    fn budget_is_spent_after_max_retries_failures() {
        let mut queue = RetryQueue::new(Duration::from_millis(10), 3, true);
        scheduled(queue.record_failure(record(), "timeout", NOW));
        scheduled(queue.record_failure(record(), "timeout", NOW + 10));

        let decision = queue.record_failure(record(), "timeout", NOW + 30);
        let RetryDecision::Exhausted(entry) = decision else {
            panic!("expected exhaustion");
        };
        assert_eq!(entry.retry_count, 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn next_for_picks_earliest_in_domain() {
        let mut queue = RetryQueue::new(Duration::from_secs(1), 3, false);
        queue.record_failure(RecordRef::new(RecordDomain::Moods, "late"), "x", NOW + 500);
        queue.record_failure(RecordRef::new(RecordDomain::Moods, "early"), "x", NOW);
        queue.record_failure(RecordRef::new(RecordDomain::Journals, "other"), "x", NOW - 500);

        assert_eq!(queue.next_for(RecordDomain::Moods).unwrap().record_ref.id, "early");
        assert!(queue.next_for(RecordDomain::Sessions).is_none());

        queue.remove(&RecordRef::new(RecordDomain::Moods, "early"));
        assert_eq!(queue.next_for(RecordDomain::Moods).unwrap().record_ref.id, "late");
    }
}
