//! Path Cache - TTL memoization of resolved paths
//!
//! Keyed by the label set fingerprint. Entries expire after the configured
//! TTL; expired entries read as misses and are removed by a background
//! sweeper.
//!
//! # Design
//!
//! - Concurrent reads and writes through `DashMap`
//! - No process-wide instance: the cache is owned by whoever resolves paths
//!   for one configuration, so a new configuration gets a new cache
//! - Hit/miss counters for reporting

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: AtomicU64,

    /// Lookups that found nothing or an expired entry
    pub misses: AtomicU64,

    /// Entries removed because they expired
    pub expired: AtomicU64,
}

impl CacheStats {
    /// Hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.expired.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    paths: Arc<[String]>,
    expires: Instant,
}

/// Fingerprint-keyed path cache with TTL expiry
#[derive(Debug)]
pub struct PathCache {
    entries: DashMap<u64, CacheEntry>,
    ttl: Duration,
    purge_interval: Duration,
    stats: CacheStats,
}

impl PathCache {
    /// Create a cache
    pub fn new(ttl: Duration, purge_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            purge_interval,
            stats: CacheStats::default(),
        }
    }

    /// Look up the paths for a fingerprint
    pub fn get(&self, fingerprint: u64) -> Option<Arc<[String]>> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(&fingerprint)
            && entry.expires > now
        {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Some(Arc::clone(&entry.paths));
        }

        // The shard read guard must be released before removing
        if self
            .entries
            .remove_if(&fingerprint, |_, entry| entry.expires <= now)
            .is_some()
        {
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store the paths for a fingerprint for one TTL
    pub fn insert(&self, fingerprint: u64, paths: Arc<[String]>) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                paths,
                expires: Instant::now() + self.ttl,
            },
        );
    }

    /// Remove every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires > now);
        let removed = before.saturating_sub(self.entries.len());
        self.stats
            .expired
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Interval between sweeps
    pub fn purge_interval(&self) -> Duration {
        self.purge_interval
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Spawn the background sweeper
    ///
    /// The task stops when `cancel` fires or when the last `Arc` to the
    /// cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let period = self.purge_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else {
                            break;
                        };
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                remaining = cache.len(),
                                "purged expired path cache entries"
                            );
                        }
                    }
                }
            }

            tracing::trace!("path cache sweeper stopped");
        })
    }
}
