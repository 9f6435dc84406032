//! Tier-2 persistent cache.
//!
//! A durable map from exact cache key to `CacheEntry`, with a secondary
//! index from similarity fingerprint to cache keys for fuzzy lookup.
//! Persistence is snapshot-based: the whole map is loaded at startup and
//! written back on shutdown or periodically. Legacy snapshots whose values
//! are bare strings are upgraded in place on load.

use super::fingerprint::{normalize_text, similarity_fingerprint};
use super::similarity::sequence_ratio;
use crate::error::{BabelsbergError, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Context-fingerprint match bonus added to the similarity ratio.
const CONTEXT_MATCH_BONUS: f64 = 0.1;

/// Fraction of entries removed by one eviction pass.
const EVICTION_FRACTION: f64 = 0.20;

fn default_quality() -> f64 {
    1.0
}

/// One cached translation with provenance and bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub original_text: String,
    pub translated_text: String,
    pub target_language: String,
    pub model_name: String,
    pub context_hash: String,
    pub similarity_hash: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default = "default_quality")]
    pub quality_score: f64,
}

impl CacheEntry {
    pub fn new(
        original_text: impl Into<String>,
        translated_text: impl Into<String>,
        target_language: impl Into<String>,
        model_name: impl Into<String>,
        context_hash: impl Into<String>,
    ) -> Self {
        let original_text = original_text.into();
        let similarity_hash = similarity_fingerprint(&original_text);
        CacheEntry {
            original_text,
            translated_text: translated_text.into(),
            target_language: target_language.into(),
            model_name: model_name.into(),
            context_hash: context_hash.into(),
            similarity_hash,
            timestamp: now_seconds(),
            usage_count: 0,
            quality_score: 1.0,
        }
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Aggregate counters exposed by the cache surface.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PersistentCacheStats {
    pub entry_count: usize,
    pub total_usage: u64,
    pub oldest_timestamp: f64,
}

/// Durable translation cache with fingerprint and fuzzy lookup.
#[derive(Debug)]
pub struct PersistentCache {
    entries: AHashMap<String, CacheEntry>,
    /// similarity_hash -> cache keys sharing it.
    similarity_index: AHashMap<String, Vec<String>>,
    path: PathBuf,
    max_entries: usize,
    similarity_threshold: f64,
    enable_fuzzy: bool,
}

impl PersistentCache {
    /// Load the snapshot at `path`, or start empty when it is absent or
    /// corrupt. Corruption is logged and never fatal.
    pub fn load(path: impl Into<PathBuf>, max_entries: usize, similarity_threshold: f64, enable_fuzzy: bool) -> Self {
        let path = path.into();
        let mut cache = PersistentCache {
            entries: AHashMap::new(),
            similarity_index: AHashMap::new(),
            path,
            max_entries: max_entries.max(1),
            similarity_threshold,
            enable_fuzzy,
        };

        if !cache.path.exists() {
            return cache;
        }

        match std::fs::read_to_string(&cache.path) {
            Ok(content) => match cache.parse_snapshot(&content) {
                Ok(count) => debug!(count, path = %cache.path.display(), "loaded translation cache"),
                Err(e) => {
                    warn!(error = %e, path = %cache.path.display(), "corrupt translation cache, starting empty");
                    cache.entries.clear();
                    cache.similarity_index.clear();
                }
            },
            Err(e) => {
                warn!(error = %e, path = %cache.path.display(), "unreadable translation cache, starting empty");
            }
        }

        cache
    }

    fn parse_snapshot(&mut self, content: &str) -> Result<usize> {
        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(content).map_err(|e| BabelsbergError::CacheLoad(e.to_string()))?;

        for (key, value) in raw {
            let entry = match value {
                // Legacy format: value is the bare translated string.
                serde_json::Value::String(translated) => CacheEntry {
                    original_text: String::new(),
                    translated_text: translated,
                    target_language: "unknown".to_string(),
                    model_name: "unknown".to_string(),
                    context_hash: String::new(),
                    similarity_hash: similarity_fingerprint(""),
                    timestamp: 0.0,
                    usage_count: 0,
                    quality_score: 1.0,
                },
                other => {
                    serde_json::from_value(other).map_err(|e| BabelsbergError::CacheLoad(e.to_string()))?
                }
            };
            self.index_entry(&key, &entry);
            self.entries.insert(key, entry);
        }
        Ok(self.entries.len())
    }

    /// Write the snapshot to disk. Failures are reported, never panicked.
    pub fn save(&self) -> Result<()> {
        let serialized =
            serde_json::to_string_pretty(&self.entries).map_err(|e| BabelsbergError::CacheSave(e.to_string()))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| BabelsbergError::CacheSave(e.to_string()))?;
        }
        std::fs::write(&self.path, serialized).map_err(|e| BabelsbergError::CacheSave(e.to_string()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exact lookup by cache key; bumps the usage counter.
    pub fn get_exact(&mut self, key: &str) -> Option<String> {
        let entry = self.entries.get_mut(key)?;
        entry.usage_count += 1;
        Some(entry.translated_text.clone())
    }

    /// Fuzzy lookup: fingerprint equality first, then pairwise sequence
    /// similarity with a context bonus, thresholded.
    pub fn fuzzy_lookup(
        &mut self,
        text: &str,
        target_language: &str,
        model_name: &str,
        context_hash: &str,
    ) -> Option<String> {
        if !self.enable_fuzzy {
            return None;
        }

        let fingerprint = similarity_fingerprint(text);

        // Fingerprint hit: same normalized text already translated.
        if let Some(keys) = self.similarity_index.get(&fingerprint) {
            let matching_key = keys
                .iter()
                .find(|key| {
                    self.entries.get(*key).is_some_and(|entry| {
                        entry.target_language == target_language && entry.model_name == model_name
                    })
                })
                .cloned();
            if let Some(key) = matching_key {
                return self.get_exact(&key);
            }
        }

        // Pairwise similarity over candidates in the same language and model.
        let normalized = normalize_text(text);
        let mut best: Option<(String, f64)> = None;
        for (key, entry) in &self.entries {
            if entry.target_language != target_language || entry.model_name != model_name {
                continue;
            }
            if entry.original_text.is_empty() {
                continue;
            }
            let mut score = sequence_ratio(&normalized, &normalize_text(&entry.original_text));
            if !context_hash.is_empty() && entry.context_hash == context_hash {
                score += CONTEXT_MATCH_BONUS;
            }
            if score >= self.similarity_threshold && best.as_ref().is_none_or(|(_, b)| score > *b) {
                best = Some((key.clone(), score));
            }
        }

        let (key, _) = best?;
        self.get_exact(&key)
    }

    /// Insert or replace an entry, then evict if over capacity.
    pub fn insert(&mut self, key: String, entry: CacheEntry) {
        let old_hash = self.entries.get(&key).map(|old| old.similarity_hash.clone());
        if let Some(hash) = old_hash {
            self.unindex_entry(&key, &hash);
        }
        self.index_entry(&key, &entry);
        self.entries.insert(key, entry);
        self.evict_if_needed();
    }

    /// Drop the least-used, oldest entries when over capacity.
    fn evict_if_needed(&mut self) {
        if self.entries.len() <= self.max_entries {
            return;
        }
        let remove_count = ((self.entries.len() as f64) * EVICTION_FRACTION).ceil() as usize;
        let mut ranked: Vec<(String, u64, f64)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.usage_count, entry.timestamp))
            .collect();
        ranked.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then(a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
        });

        for (key, _, _) in ranked.into_iter().take(remove_count) {
            if let Some(entry) = self.entries.remove(&key) {
                self.unindex_entry(&key, &entry.similarity_hash);
            }
        }
        debug!(remaining = self.entries.len(), "evicted cold cache entries");
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.similarity_index.clear();
    }

    pub fn stats(&self) -> PersistentCacheStats {
        PersistentCacheStats {
            entry_count: self.entries.len(),
            total_usage: self.entries.values().map(|e| e.usage_count).sum(),
            oldest_timestamp: self
                .entries
                .values()
                .map(|e| e.timestamp)
                .fold(f64::INFINITY, f64::min),
        }
    }

    fn index_entry(&mut self, key: &str, entry: &CacheEntry) {
        self.similarity_index
            .entry(entry.similarity_hash.clone())
            .or_default()
            .push(key.to_string());
    }

    fn unindex_entry(&mut self, key: &str, similarity_hash: &str) {
        if let Some(keys) = self.similarity_index.get_mut(similarity_hash) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.similarity_index.remove(similarity_hash);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fingerprint::{cache_key, context_fingerprint};

    fn temp_cache_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("translation_cache.json")
    }

    fn entry(original: &str, translated: &str, lang: &str) -> CacheEntry {
        CacheEntry::new(original, translated, lang, "model-x", "ctx")
    }

    #[test]
    fn test_roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_cache_path(&dir);

        let mut cache = PersistentCache::load(&path, 100, 0.85, true);
        let key = cache_key("Hello, world", "es", "model-x", "ctx");
        cache.insert(key.clone(), entry("Hello, world", "Hola, mundo", "es"));
        cache.save().unwrap();

        let mut reloaded = PersistentCache::load(&path, 100, 0.85, true);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get_exact(&key).as_deref(), Some("Hola, mundo"));
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_cache_path(&dir);
        std::fs::write(&path, "{ not json at all").unwrap();

        let cache = PersistentCache::load(&path, 100, 0.85, true);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_legacy_string_entries_upgraded() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_cache_path(&dir);
        std::fs::write(&path, r#"{"somekey": "legacy translation"}"#).unwrap();

        let mut cache = PersistentCache::load(&path, 100, 0.85, true);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_exact("somekey").as_deref(), Some("legacy translation"));
    }

    #[test]
    fn test_fuzzy_fingerprint_hit() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = PersistentCache::load(temp_cache_path(&dir), 100, 0.85, true);
        let key = cache_key("Hello, world", "es", "model-x", "ctx");
        cache.insert(key, entry("Hello,   World", "Hola, mundo", "es"));

        // Different whitespace and case: same similarity fingerprint.
        let hit = cache.fuzzy_lookup("hello, world", "es", "model-x", "other-ctx");
        assert_eq!(hit.as_deref(), Some("Hola, mundo"));

        // Usage count was bumped by the hit.
        assert_eq!(cache.stats().total_usage, 1);
    }

    #[test]
    fn test_fuzzy_requires_same_language_and_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = PersistentCache::load(temp_cache_path(&dir), 100, 0.85, true);
        let key = cache_key("Hello, world", "es", "model-x", "ctx");
        cache.insert(key, entry("Hello, world", "Hola, mundo", "es"));

        assert!(cache.fuzzy_lookup("hello, world", "fr", "model-x", "ctx").is_none());
        assert!(cache.fuzzy_lookup("hello, world", "es", "model-y", "ctx").is_none());
    }

    #[test]
    fn test_fuzzy_sequence_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = PersistentCache::load(temp_cache_path(&dir), 100, 0.85, true);
        let key = cache_key("the quick brown fox jumps", "de", "model-x", "ctx");
        cache.insert(
            key,
            entry("the quick brown fox jumps", "der schnelle braune Fuchs springt", "de"),
        );

        // One-word difference keeps similarity above the threshold.
        let hit = cache.fuzzy_lookup("the quick brown fox jumped", "de", "model-x", "");
        assert_eq!(hit.as_deref(), Some("der schnelle braune Fuchs springt"));
    }

    #[test]
    fn test_fuzzy_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = PersistentCache::load(temp_cache_path(&dir), 100, 0.85, false);
        let key = cache_key("Hello, world", "es", "model-x", "ctx");
        cache.insert(key, entry("Hello, world", "Hola, mundo", "es"));
        assert!(cache.fuzzy_lookup("hello, world", "es", "model-x", "ctx").is_none());
    }

    #[test]
    fn test_eviction_bound_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = PersistentCache::load(temp_cache_path(&dir), 10, 0.85, true);

        for i in 0..10 {
            let mut e = entry(&format!("text {i}"), &format!("übersetzung {i}"), "de");
            e.usage_count = i as u64;
            e.timestamp = i as f64;
            cache.insert(format!("key-{i}"), e);
        }
        assert_eq!(cache.len(), 10);

        // The eleventh entry triggers eviction of the coldest 20%.
        let mut e = entry("text 10", "übersetzung 10", "de");
        e.usage_count = 100;
        cache.insert("key-10".to_string(), e);

        assert!(cache.len() <= 10);
        // The least-used, oldest entries went first.
        assert!(cache.get_exact("key-0").is_none());
        assert!(cache.get_exact("key-10").is_some());
    }

    #[test]
    fn test_save_failure_is_cache_save_error() {
        let dir = tempfile::tempdir().unwrap();
        // A path whose parent is a regular file cannot be created.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let cache = PersistentCache::load(blocker.join("cache.json"), 10, 0.85, true);
        let err = cache.save().unwrap_err();
        assert!(matches!(err, BabelsbergError::CacheSave(_)));
    }
}
