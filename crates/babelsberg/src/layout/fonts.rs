//! Per-document font statistics.
//!
//! Computes the dominant body size (histogram mode), mean and standard
//! deviation of span sizes, and a descending ladder of heading size bands.
//! Sizes are binned to half points; a bin qualifies as a heading band when
//! it exceeds the body size by at least one standard deviation.

use crate::source::PageData;
use ahash::AHashMap;

/// Half-point bin resolution for the size histogram.
const SIZE_BIN: f32 = 0.5;

/// Tolerance when matching a span size against a heading band.
const BAND_MATCH_TOLERANCE: f32 = 0.5;

const MAX_HEADING_LEVELS: usize = 6;

/// One heading size band: spans of this size map to this level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeBand {
    pub size: f32,
    /// 1..=6, largest size = level 1.
    pub level: u8,
}

/// Document-wide font statistics shared by every per-page stage.
#[derive(Debug, Clone, Default)]
pub struct StructureAnalysis {
    /// Mode of span font sizes: the body text size.
    pub dominant_font_size: f32,
    pub mean_font_size: f32,
    pub std_dev: f32,
    /// Heading bands ordered by size descending (level ascending).
    pub size_bands: Vec<SizeBand>,
    /// Most frequent font family: the body font.
    pub body_font_name: String,
    /// Detected column count per 1-based page number.
    pub columns_per_page: AHashMap<u32, usize>,
}

impl StructureAnalysis {
    /// Heading level for a span size, if it falls within half a point of a band.
    pub fn heading_level_for_size(&self, size: f32) -> Option<u8> {
        self.size_bands
            .iter()
            .find(|band| (band.size - size).abs() <= BAND_MATCH_TOLERANCE)
            .map(|band| band.level)
    }

    /// Size z-score against the body text distribution.
    pub fn z_score(&self, size: f32) -> f32 {
        if self.std_dev <= f32::EPSILON {
            0.0
        } else {
            (size - self.dominant_font_size) / self.std_dev
        }
    }

    /// Estimate a heading level from the z-score alone, capped to 1..=6.
    ///
    /// Used when a span's size matches no band: larger deviation from body
    /// size means a higher-ranked heading.
    pub fn estimate_level_from_z(&self, size: f32) -> u8 {
        let z = self.z_score(size);
        if z >= 3.0 {
            1
        } else if z >= 2.5 {
            2
        } else if z >= 2.0 {
            3
        } else if z >= 1.5 {
            4
        } else if z >= 1.0 {
            5
        } else {
            6
        }
    }
}

fn bin_of(size: f32) -> i32 {
    (size / SIZE_BIN).round() as i32
}

fn bin_center(bin: i32) -> f32 {
    bin as f32 * SIZE_BIN
}

/// Compute document-wide font statistics over all pages.
///
/// Column counts are filled in separately by the caller once per page; this
/// function only owns the font histogram.
pub fn analyze_document(pages: &[PageData]) -> StructureAnalysis {
    let mut size_bins: AHashMap<i32, usize> = AHashMap::new();
    let mut font_counts: AHashMap<&str, usize> = AHashMap::new();
    let mut sizes: Vec<f32> = Vec::new();

    for page in pages {
        for span in &page.spans {
            if span.text.trim().is_empty() {
                continue;
            }
            *size_bins.entry(bin_of(span.font_size)).or_default() += 1;
            *font_counts.entry(span.font_name.as_str()).or_default() += 1;
            sizes.push(span.font_size);
        }
    }

    if sizes.is_empty() {
        return StructureAnalysis {
            dominant_font_size: 12.0,
            mean_font_size: 12.0,
            ..Default::default()
        };
    }

    // Mode of the binned histogram; ties break toward the smaller size so a
    // pathological half-heading document still picks body text.
    let dominant_bin = size_bins
        .iter()
        .max_by_key(|(bin, count)| (**count, -**bin))
        .map(|(bin, _)| *bin)
        .unwrap_or(bin_of(12.0));
    let dominant_font_size = bin_center(dominant_bin);

    let mean = sizes.iter().sum::<f32>() / sizes.len() as f32;
    let variance = sizes.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / sizes.len() as f32;
    let std_dev = variance.sqrt();

    let body_font_name = font_counts
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(name, _)| name.to_string())
        .unwrap_or_default();

    // Heading bands: histogram bins clearly above body size, largest first.
    let floor = dominant_font_size + std_dev;
    let mut heading_bins: Vec<i32> = size_bins
        .keys()
        .copied()
        .filter(|bin| bin_center(*bin) > floor)
        .collect();
    heading_bins.sort_by(|a, b| b.cmp(a));

    let size_bands = heading_bins
        .into_iter()
        .take(MAX_HEADING_LEVELS)
        .enumerate()
        .map(|(idx, bin)| SizeBand {
            size: bin_center(bin),
            level: (idx + 1) as u8,
        })
        .collect();

    StructureAnalysis {
        dominant_font_size,
        mean_font_size: mean,
        std_dev,
        size_bands,
        body_font_name,
        columns_per_page: AHashMap::new(),
    }
}
