//! Two-tier translation cache.
//!
//! Tier 1 is a per-session LRU map; tier 2 is the persistent
//! fingerprint-indexed store. Lookup order: exact tier-1, exact tier-2
//! (hydrating tier 1), then fuzzy tier-2. Both tiers sit behind a single
//! mutex; translation concurrency is bounded low enough that contention is
//! negligible.

pub mod fingerprint;
pub mod memory;
pub mod persistent;
pub mod similarity;

pub use fingerprint::{cache_key, context_fingerprint, normalize_text, similarity_fingerprint};
pub use memory::SessionCache;
pub use persistent::{CacheEntry, PersistentCache, PersistentCacheStats};
pub use similarity::sequence_ratio;

use crate::config::CacheConfig;
use parking_lot::Mutex;
use serde::Serialize;

/// Hit/miss counters for the diagnostic summary.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub hits_memory: u64,
    pub hits_persistent: u64,
    pub hits_fuzzy: u64,
    pub misses: u64,
    pub inserts: u64,
}

struct CacheInner {
    memory: SessionCache,
    persistent: PersistentCache,
    stats: CacheStats,
    enabled: bool,
    context_window_chars: usize,
}

/// Session cache plus persistent cache behind one lock.
pub struct TwoTierCache {
    inner: Mutex<CacheInner>,
}

impl TwoTierCache {
    /// Build both tiers from configuration, loading the persistent snapshot.
    pub fn from_config(config: &CacheConfig) -> Self {
        let persistent = PersistentCache::load(
            &config.cache_file_path,
            config.max_cache_entries,
            config.similarity_threshold,
            config.enable_fuzzy_matching,
        );
        TwoTierCache {
            inner: Mutex::new(CacheInner {
                memory: SessionCache::new(config.memory_cache_size),
                persistent,
                stats: CacheStats::default(),
                enabled: config.use_translation_cache,
                context_window_chars: config.context_window_chars,
            }),
        }
    }

    /// Look up a translation for `(text, language, model, context)`.
    pub fn lookup(
        &self,
        text: &str,
        target_language: &str,
        model_name: &str,
        context_before: &str,
        context_after: &str,
    ) -> Option<String> {
        let mut inner = self.inner.lock();
        if !inner.enabled {
            return None;
        }
        inner.stats.total_requests += 1;

        let context_hash = context_fingerprint(context_before, context_after, inner.context_window_chars);
        let key = cache_key(text, target_language, model_name, &context_hash);

        if let Some(hit) = inner.memory.get(&key) {
            inner.stats.hits_memory += 1;
            return Some(hit);
        }

        if let Some(hit) = inner.persistent.get_exact(&key) {
            inner.stats.hits_persistent += 1;
            inner.memory.insert(key, hit.clone());
            return Some(hit);
        }

        if let Some(hit) = inner
            .persistent
            .fuzzy_lookup(text, target_language, model_name, &context_hash)
        {
            inner.stats.hits_fuzzy += 1;
            inner.memory.insert(key, hit.clone());
            return Some(hit);
        }

        inner.stats.misses += 1;
        None
    }

    /// Record a fresh translation in both tiers.
    pub fn store(
        &self,
        text: &str,
        translated: &str,
        target_language: &str,
        model_name: &str,
        context_before: &str,
        context_after: &str,
    ) {
        let mut inner = self.inner.lock();
        if !inner.enabled {
            return;
        }

        let context_hash = context_fingerprint(context_before, context_after, inner.context_window_chars);
        let key = cache_key(text, target_language, model_name, &context_hash);

        inner.memory.insert(key.clone(), translated.to_string());
        let entry = CacheEntry::new(text, translated, target_language, model_name, context_hash);
        inner.persistent.insert(key, entry);
        inner.stats.inserts += 1;
    }

    /// Snapshot the persistent tier to disk.
    pub fn save(&self) -> crate::error::Result<()> {
        let inner = self.inner.lock();
        if !inner.enabled {
            return Ok(());
        }
        inner.persistent.save()
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Persistent-tier aggregate statistics.
    pub fn persistent_stats(&self) -> PersistentCacheStats {
        self.inner.lock().persistent.stats()
    }

    /// Clear both tiers (does not touch the on-disk snapshot until `save`).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.memory.clear();
        inner.persistent.clear();
    }
}
