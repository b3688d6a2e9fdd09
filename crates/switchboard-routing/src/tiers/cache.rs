use chrono::{DateTime, Utc};
use core::time::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use switchboard_core::{IgnoreRwLock as _, TierRecord};

/// Tier records of one user, stamped with a single refresh time.
///
/// Entries are immutable once published; updates build a new entry and swap
/// it in, so readers holding an `Arc` never observe a partial merge.
#[derive(Debug, Clone)]
pub struct TierCacheEntry {
    /// Records keyed by `service:model`.
    pub records: HashMap<String, TierRecord>,
    /// Wall-clock refresh time, for reporting.
    pub last_updated: DateTime<Utc>,
    /// Monotonic refresh time used for expiry.
    refreshed_at: Instant,
}

impl TierCacheEntry {
    /// Entry holding `records`, refreshed now.
    fn new(records: HashMap<String, TierRecord>) -> Self {
        Self {
            records,
            last_updated: Utc::now(),
            refreshed_at: Instant::now(),
        }
    }

    /// Whether the entry is older than `ttl`.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.refreshed_at.elapsed() > ttl
    }

    /// Whether `service` has at least one free or paid record.
    pub fn covers(&self, service: &str) -> bool {
        self.records
            .values()
            .any(|record| record.service == service && record.is_known())
    }

    /// Known record of one model.
    pub fn known_record(&self, service: &str, model_name: &str) -> Option<&TierRecord> {
        self.records
            .get(&TierRecord::model_key(service, model_name))
            .filter(|record| record.is_known())
    }

    /// Records belonging to `services`.
    pub fn records_for<'svc>(
        &self,
        services: impl IntoIterator<Item = &'svc str>,
    ) -> HashMap<String, TierRecord> {
        let services: HashSet<&str> = services.into_iter().collect();
        self.records
            .iter()
            .filter(|(_, record)| services.contains(record.service.as_str()))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }
}

/// Per-user tier cache with whole-entry expiry.
#[derive(Debug)]
pub struct TierCache {
    /// Published entries keyed by `user:{id}`.
    entries: RwLock<HashMap<String, Arc<TierCacheEntry>>>,
    /// Entry lifetime.
    ttl: Duration,
}

impl TierCache {
    /// Empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cache key of a user.
    pub fn cache_key(user_id: &str) -> String {
        format!("user:{user_id}")
    }

    /// Unexpired entry of `user_id`; an expired entry is dropped.
    pub fn get(&self, user_id: &str) -> Option<Arc<TierCacheEntry>> {
        let key = Self::cache_key(user_id);
        {
            let entries = self.entries.read_ignore_poison();
            match entries.get(&key) {
                None => return None,
                Some(entry) if !entry.is_expired(self.ttl) => return Some(Arc::clone(entry)),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write_ignore_poison();
        if entries
            .get(&key)
            .is_some_and(|entry| entry.is_expired(self.ttl))
        {
            entries.remove(&key);
            tracing::debug!("Tier cache for {user_id} expired");
        }
        None
    }

    /// Publishes a new entry holding the current records overwritten by `records`.
    ///
    /// Unrelated records are preserved and the entry timestamp is refreshed.
    pub fn merge(
        &self,
        user_id: &str,
        records: impl IntoIterator<Item = TierRecord>,
    ) -> Arc<TierCacheEntry> {
        let key = Self::cache_key(user_id);
        let mut entries = self.entries.write_ignore_poison();

        let mut merged = entries
            .get(&key)
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.records.clone())
            .unwrap_or_default();
        for record in records {
            merged.insert(record.key(), record);
        }

        let entry = Arc::new(TierCacheEntry::new(merged));
        entries.insert(key, Arc::clone(&entry));
        entry
    }

    /// Drops unknown records of `services` without refreshing the entry.
    pub fn purge_unknown(&self, user_id: &str, services: &HashSet<String>) {
        let key = Self::cache_key(user_id);
        let mut entries = self.entries.write_ignore_poison();
        let Some(current) = entries.get(&key) else {
            return;
        };

        let mut purged = TierCacheEntry::clone(current);
        purged
            .records
            .retain(|_, record| record.is_known() || !services.contains(&record.service));
        let removed = current.records.len() - purged.records.len();
        if removed > 0 {
            tracing::debug!("Purged {removed} unknown tier records for {user_id}");
            entries.insert(key, Arc::new(purged));
        }
    }

    /// Removes the entry of `user_id`, returning whether one existed.
    pub fn clear(&self, user_id: &str) -> bool {
        self.entries
            .write_ignore_poison()
            .remove(&Self::cache_key(user_id))
            .is_some()
    }

    /// Removes every entry.
    pub fn clear_all(&self) {
        self.entries.write_ignore_poison().clear();
    }

    /// Number of cached users, expired entries included.
    pub fn len(&self) -> usize {
        self.entries.read_ignore_poison().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read_ignore_poison().is_empty()
    }
}
