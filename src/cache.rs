//! Time-boxed cache entries.
//!
//! A [`TimeBoxedCache`] remembers when something was last resolved and under
//! which inputs. It is stale when it has never been filled, when the inputs
//! (the key) differ from the recorded ones, or when the record is older than
//! the configured lifetime. The cache stores no payload of its own: callers
//! keep the resolved values and ask the cache whether to refresh them.

use chrono::{DateTime, Duration, Utc};

use crate::constants::CACHE_LIFETIME_HOURS;

#[derive(Debug, Clone, PartialEq)]
struct Entry<K> {
    stored_at: DateTime<Utc>,
    key: K,
}

#[derive(Debug, Clone)]
pub struct TimeBoxedCache<K> {
    lifetime: Duration,
    entry: Option<Entry<K>>,
}

impl<K: PartialEq> TimeBoxedCache<K> {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            entry: None,
        }
    }

    /// Cache using the shared twelve hour lifetime.
    pub fn with_default_lifetime() -> Self {
        Self::new(Duration::hours(CACHE_LIFETIME_HOURS))
    }

    /// Whether the inputs in `key` need a fresh resolution at `now`.
    ///
    /// An entry exactly `lifetime` old is still fresh.
    pub fn is_stale(&self, now: DateTime<Utc>, key: &K) -> bool {
        match &self.entry {
            None => true,
            Some(entry) => entry.key != *key || entry.stored_at < now - self.lifetime,
        }
    }

    /// Replace the entry wholesale.
    pub fn record(&mut self, now: DateTime<Utc>, key: K) {
        self.entry = Some(Entry {
            stored_at: now,
            key,
        });
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.entry.as_ref().map(|entry| entry.stored_at)
    }
}
