//! Configuration loading and management.
//!
//! `PipelineConfig` can be loaded from TOML or JSON files, discovered by
//! searching upward from the working directory, or built programmatically.
//! Every field has a serde default so partial config files work.

use crate::error::{BabelsbergError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAMES: [&str; 2] = ["babelsberg.toml", "babelsberg.json"];

/// Top-level pipeline configuration.
///
/// # Example
///
/// ```rust
/// use babelsberg::config::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.target_language, "en");
/// assert_eq!(config.translation.max_concurrent, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Translation destination language code.
    pub target_language: String,

    /// Backend model identifier pinned into cache keys (None = backend default).
    pub model_name: Option<String>,

    /// Language hint passed to the OCR collaborator.
    pub ocr_language: String,

    pub translation: TranslationConfig,
    pub cache: CacheConfig,
    pub regions: RegionConfig,
    pub classifier: ClassifierConfig,
    pub association: AssociationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            target_language: "en".to_string(),
            model_name: None,
            ocr_language: "eng".to_string(),
            translation: TranslationConfig::default(),
            cache: CacheConfig::default(),
            regions: RegionConfig::default(),
            classifier: ClassifierConfig::default(),
            association: AssociationConfig::default(),
        }
    }
}

/// Concurrency and rate limiting for the translation orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Upper bound on in-flight translation requests.
    pub max_concurrent: usize,

    /// Soft rate limit: each task sleeps this long before its request.
    pub request_delay_ms: u64,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        TranslationConfig {
            max_concurrent: 5,
            request_delay_ms: 100,
            timeout_secs: 600,
        }
    }
}

/// Two-tier translation cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch for both tiers.
    pub use_translation_cache: bool,

    /// Persistent cache snapshot path.
    pub cache_file_path: PathBuf,

    /// Tier-1 (session) capacity.
    pub memory_cache_size: usize,

    /// Tier-2 (persistent) capacity; eviction trims 20% above this.
    pub max_cache_entries: usize,

    /// Fuzzy match floor for sequence similarity.
    pub similarity_threshold: f64,

    pub enable_fuzzy_matching: bool,

    /// Context tail/head length folded into the context fingerprint.
    pub context_window_chars: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            use_translation_cache: true,
            cache_file_path: PathBuf::from("translation_cache.json"),
            memory_cache_size: 1000,
            max_cache_entries: 10_000,
            similarity_threshold: 0.85,
            enable_fuzzy_matching: true,
            context_window_chars: 200,
        }
    }
}

/// Visual region extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Minimum raster width in pixels.
    pub min_image_width_px: u32,

    /// Minimum raster height in pixels.
    pub min_image_height_px: u32,

    pub extract_tables_as_images: bool,
    pub extract_equations_as_images: bool,
    pub extract_figures_by_caption: bool,

    pub min_table_rows: usize,
    pub min_table_columns: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        RegionConfig {
            min_image_width_px: 8,
            min_image_height_px: 8,
            extract_tables_as_images: true,
            extract_equations_as_images: true,
            extract_figures_by_caption: true,
            min_table_rows: 2,
            min_table_columns: 2,
        }
    }
}

/// Content classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Heading word-count ceiling; longer runs are forced to paragraphs.
    pub heading_max_words: usize,

    /// Weighted-score floor for heading classification.
    pub heading_score_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            heading_max_words: 12,
            heading_score_threshold: 0.6,
        }
    }
}

/// Image-text association and caption linking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Minimum caption confidence for a link to be kept.
    pub caption_confidence_floor: f32,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        AssociationConfig {
            caption_confidence_floor: 0.3,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| BabelsbergError::config(format!("invalid TOML config: {e}")))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| BabelsbergError::config(format!("invalid JSON config: {e}")))
    }

    /// Load configuration from a path, dispatching on the extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_file(path),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Err(BabelsbergError::config(format!(
                "config file must have a .toml or .json extension: {}",
                path.display()
            ))),
        }
    }

    /// Search the current directory and its ancestors for a config file.
    ///
    /// Returns `Ok(None)` when no file is found.
    pub fn discover() -> Result<Option<Self>> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// Search `start` and its ancestors for a config file.
    pub fn discover_from(start: &Path) -> Result<Option<Self>> {
        for dir in start.ancestors() {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Self::from_file(&candidate).map(Some);
                }
            }
        }
        Ok(None)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.target_language.trim().is_empty() {
            return Err(BabelsbergError::config("target_language must not be empty"));
        }
        if self.translation.max_concurrent == 0 {
            return Err(BabelsbergError::config("translation.max_concurrent must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(BabelsbergError::config(
                "cache.similarity_threshold must be within [0, 1]",
            ));
        }
        if self.regions.min_table_rows < 1 || self.regions.min_table_columns < 1 {
            return Err(BabelsbergError::config(
                "regions.min_table_rows and min_table_columns must be at least 1",
            ));
        }
        Ok(())
    }
}
