use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default freshness window for memoized service results.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Entry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// In-memory key/value cache whose entries expire after a fixed TTL.
///
/// Entries are checked against the injected clock on read; an expired entry
/// is evicted and reported as a miss.
pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A clock that went backwards yields a negative age, which counts as fresh
        match (now - stored_at).to_std() {
            Ok(age) => age < self.ttl,
            Err(_) => true,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if self.is_fresh(entry.stored_at, now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Entry { value, stored_at });
    }

    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(|entry| entry.value)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry.stored_at, now));
        before - entries.len()
    }

    /// Number of stored entries, including ones that have expired but not yet been evicted.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn manual_cache(ttl_secs: u64) -> (Arc<ManualClock>, TtlCache<String, u32>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 20, 9, 0, 0).unwrap(),
        ));
        let cache = TtlCache::new(Duration::from_secs(ttl_secs), clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_hit_within_ttl() {
        let (clock, cache) = manual_cache(3600);
        cache.insert("a".to_string(), 1);
        clock.advance(chrono::Duration::seconds(3599));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let (clock, cache) = manual_cache(3600);
        cache.insert("a".to_string(), 1);
        clock.advance(chrono::Duration::seconds(3600));
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_insert_refreshes_timestamp() {
        let (clock, cache) = manual_cache(60);
        cache.insert("a".to_string(), 1);
        clock.advance(chrono::Duration::seconds(50));
        cache.insert("a".to_string(), 2);
        clock.advance(chrono::Duration::seconds(50));
        assert_eq!(cache.get(&"a".to_string()), Some(2));
    }

    #[test]
    fn test_invalidate() {
        let (_clock, cache) = manual_cache(60);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.invalidate(&"a".to_string()), Some(1));
        assert_eq!(cache.invalidate(&"a".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let (clock, cache) = manual_cache(60);
        cache.insert("old".to_string(), 1);
        clock.advance(chrono::Duration::seconds(45));
        cache.insert("new".to_string(), 2);
        clock.advance(chrono::Duration::seconds(30));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new".to_string()), Some(2));
    }

    #[test]
    fn test_clock_moving_backwards_keeps_entry() {
        let (clock, cache) = manual_cache(60);
        cache.insert("a".to_string(), 1);
        clock.set(Utc.with_ymd_and_hms(2026, 2, 19, 9, 0, 0).unwrap());
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }
}
