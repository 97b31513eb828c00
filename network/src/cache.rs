use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// A byte range of a remote file as it was at some point, valid until
/// `expiry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub offset: u32,
    pub data: Bytes,
    pub expiry: Instant,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expiry
    }

    fn end(&self) -> u64 {
        u64::from(self.offset) + self.data.len() as u64
    }

    /// True when `[offset, offset + amount)` lies entirely inside this entry
    /// and `offset` itself is one of its bytes.
    pub fn covers(&self, offset: u32, amount: u32) -> bool {
        let offset = u64::from(offset);
        let end = self.end();
        u64::from(self.offset) <= offset && offset < end && u64::from(amount) <= end - offset
    }

    fn slice(&self, offset: u32, amount: u32) -> Bytes {
        let start = (offset - self.offset) as usize;
        self.data.slice(start..start + amount as usize)
    }
}

/// Client-side read cache keyed by file path.
///
/// Entries for a path are kept in insertion order and never merged.
/// Lookups walk them newest first, so the most recent copy of a range wins,
/// and drop any expired entry they pass on the way. A path whose entries
/// are all gone is removed from the map. There is no size bound.
#[derive(Debug)]
pub struct CacheManager {
    freshness: Duration,
    entries: HashMap<String, Vec<CacheEntry>>,
}

impl CacheManager {
    pub fn new(freshness: Duration) -> Self {
        Self {
            freshness,
            entries: HashMap::new(),
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub fn add_entry(&mut self, path: &str, offset: u32, data: Bytes) {
        let expiry = Instant::now() + self.freshness;
        debug!(
            "Adding cache entry of length {} for {path} starting at offset {offset}, valid for {:?}",
            data.len(),
            self.freshness
        );
        self.entries
            .entry(path.to_owned())
            .or_default()
            .push(CacheEntry {
                offset,
                data,
                expiry,
            });
    }

    pub fn get_entry(&mut self, path: &str, offset: u32, amount: u32) -> Option<Bytes> {
        trace!("Looking up {amount} bytes of {path} at offset {offset}");
        let Some(entries) = self.entries.get_mut(path) else {
            debug!("Cache miss for {path}: nothing cached");
            return None;
        };

        let now = Instant::now();
        let mut hit = None;
        let mut index = entries.len();
        while index > 0 {
            index -= 1;
            if !entries[index].is_fresh(now) {
                let stale = entries.remove(index);
                debug!(
                    "Purging stale entry of length {} at offset {} for {path}",
                    stale.data.len(),
                    stale.offset
                );
                continue;
            }
            if entries[index].covers(offset, amount) {
                hit = Some(entries[index].slice(offset, amount));
                break;
            }
        }

        if entries.is_empty() {
            self.entries.remove(path);
        }
        match &hit {
            Some(_) => debug!("Cache hit for {path} at offset {offset}"),
            None => debug!("Cache miss for {path} at offset {offset}"),
        }
        hit
    }

    /// Number of entries across all paths, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_count(&self, path: &str) -> usize {
        self.entries.get(path).map_or(0, Vec::len)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const FRESHNESS: Duration = Duration::from_secs(5);

    fn cache_with(path: &str, offset: u32, data: &'static [u8]) -> CacheManager {
        let mut cache = CacheManager::new(FRESHNESS);
        cache.add_entry(path, offset, Bytes::from_static(data));
        cache
    }

    #[tokio::test(start_paused = true)]
    async fn test_containment() {
        let mut cache = cache_with("file", 10, b"HELLOWORLD");

        assert_eq!(cache.get_entry("file", 12, 5), Some(Bytes::from_static(b"LLOWO")));
        assert_eq!(cache.get_entry("file", 12, 9), None);
        assert_eq!(cache.get_entry("file", 5, 3), None);
        assert_eq!(cache.get_entry("file", 20, 1), None);
        assert_eq!(cache.get_entry("file", 10, 10), Some(Bytes::from_static(b"HELLOWORLD")));
        assert_eq!(cache.get_entry("file", 19, 1), Some(Bytes::from_static(b"D")));
        assert_eq!(cache.get_entry("other", 12, 5), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_is_valid_until_just_before_expiry() {
        let mut cache = cache_with("file", 0, b"abc");

        advance(FRESHNESS - Duration::from_millis(1)).await;
        assert_eq!(cache.get_entry("file", 0, 3), Some(Bytes::from_static(b"abc")));

        advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get_entry("file", 0, 3), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_purged_by_non_matching_lookup() {
        let mut cache = cache_with("file", 10, b"HELLOWORLD");
        advance(FRESHNESS + Duration::from_millis(1)).await;

        assert_eq!(cache.get_entry("file", 500, 1), None);
        assert!(!cache.contains_path("file"));
        assert!(cache.is_empty());
        assert_eq!(cache.get_entry("file", 12, 5), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newest_entry_wins() {
        let mut cache = CacheManager::new(FRESHNESS);
        cache.add_entry("file", 0, Bytes::from_static(b"aaaaaaaa"));
        cache.add_entry("file", 2, Bytes::from_static(b"bbbb"));

        assert_eq!(cache.get_entry("file", 3, 2), Some(Bytes::from_static(b"bb")));
        assert_eq!(cache.get_entry("file", 0, 4), Some(Bytes::from_static(b"aaaa")));
        assert_eq!(cache.entry_count("file"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_stops_purging_at_first_match() {
        let mut cache = CacheManager::new(FRESHNESS);
        cache.add_entry("file", 0, Bytes::from_static(b"old"));
        advance(FRESHNESS).await;
        cache.add_entry("file", 0, Bytes::from_static(b"new"));
        cache.add_entry("file", 100, Bytes::from_static(b"elsewhere"));

        assert_eq!(cache.get_entry("file", 0, 3), Some(Bytes::from_static(b"new")));
        assert_eq!(cache.entry_count("file"), 3);

        assert_eq!(cache.get_entry("file", 50, 1), None);
        assert_eq!(cache.entry_count("file"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entries_survive_purge_of_stale_ones() {
        let mut cache = CacheManager::new(FRESHNESS);
        cache.add_entry("file", 0, Bytes::from_static(b"stale"));
        advance(Duration::from_secs(3)).await;
        cache.add_entry("file", 0, Bytes::from_static(b"fresh"));
        advance(Duration::from_secs(3)).await;

        assert_eq!(cache.get_entry("file", 0, 5), Some(Bytes::from_static(b"fresh")));
        assert_eq!(cache.get_entry("file", 9, 1), None);
        assert_eq!(cache.entry_count("file"), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paths_are_independent() {
        let mut cache = CacheManager::new(FRESHNESS);
        cache.add_entry("a", 0, Bytes::from_static(b"first"));
        advance(Duration::from_secs(4)).await;
        cache.add_entry("b", 0, Bytes::from_static(b"second"));
        advance(Duration::from_secs(2)).await;

        assert_eq!(cache.get_entry("b", 0, 6), Some(Bytes::from_static(b"second")));
        assert_eq!(cache.entry_count("a"), 1);
        assert_eq!(cache.get_entry("a", 0, 1), None);
        assert!(!cache.contains_path("a"));
        assert!(cache.contains_path("b"));
    }

    #[test]
    fn test_covers_does_not_overflow_near_u32_max() {
        let entry = CacheEntry {
            offset: u32::MAX - 1,
            data: Bytes::from_static(b"xy"),
            expiry: Instant::now(),
        };
        assert!(entry.covers(u32::MAX, 1));
        assert!(!entry.covers(u32::MAX, 2));
        assert!(!entry.covers(u32::MAX - 2, 1));
    }
}
