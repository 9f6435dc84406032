//! Competing-extraction resolution.
//!
//! Several passes can claim the same area of a page. Same-kind visual areas
//! collapse to the single best candidate by quality score; across kinds,
//! "similar" regions (heavy overlap or wildly different file sizes for the
//! same kind) are resolved in favor of the higher-quality one.

use crate::types::{Region, RegionKind};

/// File-size points cap (megabytes).
const SIZE_SCORE_CAP: f64 = 5.0;

/// Area points cap (hundred-thousand square units).
const AREA_SCORE_CAP: f64 = 3.0;

/// Penalty for suspiciously small files.
const SMALL_FILE_PENALTY: f64 = 2.0;
const SMALL_FILE_BYTES: usize = 50 * 1024;

/// Overlap fraction of the smaller bbox above which two same-kind regions compete.
const OVERLAP_SIMILARITY: f32 = 0.20;

/// File-size ratio above which two same-kind regions compete.
const SIZE_RATIO_SIMILARITY: f64 = 3.0;

/// Per-kind bonus folded into the quality score.
fn kind_bonus(kind: RegionKind) -> f64 {
    match kind {
        RegionKind::RasterImage => 1.0,
        RegionKind::DetectedTable | RegionKind::DetectedEquation => 0.5,
        RegionKind::VisualArea => 0.0,
    }
}

/// Quality score for competing-extraction resolution.
///
/// `Q = clamp(file_mb, 0, 5) + clamp(area/100_000, 0, 3) + 2·confidence
///    + kind_bonus − small_file_penalty`
pub fn quality_score(region: &Region) -> f64 {
    let file_mb = region.file_size as f64 / (1024.0 * 1024.0);
    let size_score = file_mb.clamp(0.0, SIZE_SCORE_CAP);
    let area_score = (region.bbox.area() as f64 / 100_000.0).clamp(0.0, AREA_SCORE_CAP);
    let confidence_score = 2.0 * region.confidence as f64;
    let penalty = if region.file_size > 0 && region.file_size < SMALL_FILE_BYTES {
        SMALL_FILE_PENALTY
    } else {
        0.0
    };
    size_score + area_score + confidence_score + kind_bonus(region.kind) - penalty
}

/// Whether two regions compete for the same content.
fn are_similar(a: &Region, b: &Region) -> bool {
    if a.kind != b.kind {
        return false;
    }
    if a.bbox.overlap_of_smaller(&b.bbox) > OVERLAP_SIMILARITY {
        return true;
    }
    let (larger, smaller) = if a.file_size >= b.file_size {
        (a.file_size, b.file_size)
    } else {
        (b.file_size, a.file_size)
    };
    smaller > 0 && (larger as f64 / smaller as f64) > SIZE_RATIO_SIMILARITY
}

/// Resolve competing extractions on one page.
///
/// Visual areas collapse to exactly one survivor (the best-scoring one);
/// for other kinds, pairwise similar regions lose to the higher-quality
/// competitor. At least one region of every non-empty same-kind group
/// survives.
pub fn resolve_competing(mut regions: Vec<Region>) -> Vec<Region> {
    if regions.len() <= 1 {
        return regions;
    }

    // Visual areas: keep only the best.
    let visual_best = regions
        .iter()
        .filter(|r| r.kind == RegionKind::VisualArea)
        .max_by(|a, b| {
            quality_score(a)
                .partial_cmp(&quality_score(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|r| r.region_id);
    if let Some(keep_id) = visual_best {
        regions.retain(|r| r.kind != RegionKind::VisualArea || r.region_id == keep_id);
    }

    // Pairwise similarity within remaining kinds: drop the lower-quality one.
    let mut dropped: Vec<u64> = Vec::new();
    for i in 0..regions.len() {
        for j in (i + 1)..regions.len() {
            let (a, b) = (&regions[i], &regions[j]);
            if dropped.contains(&a.region_id) || dropped.contains(&b.region_id) {
                continue;
            }
            if are_similar(a, b) {
                let loser = if quality_score(a) >= quality_score(b) {
                    b.region_id
                } else {
                    a.region_id
                };
                dropped.push(loser);
            }
        }
    }
    regions.retain(|r| !dropped.contains(&r.region_id));
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn region(id: u64, kind: RegionKind, bbox: BoundingBox, file_size: usize, confidence: f32) -> Region {
        Region {
            region_id: id,
            kind,
            bbox,
            page_num: 22,
            source_path: String::new(),
            confidence,
            ocr_text: None,
            extracted_text: None,
            data: None,
            file_size,
            priority: 0.0,
        }
    }

    #[test]
    fn test_competing_visual_areas_keep_best() {
        // A: 400x300, 800 KB, confidence 0.9. B: overlapping 80x60, 15 KB,
        // confidence 0.3. Only A survives, by a wide margin.
        let a = region(
            1,
            RegionKind::VisualArea,
            BoundingBox::new(0.0, 0.0, 400.0, 300.0),
            800 * 1024,
            0.9,
        );
        let b = region(
            2,
            RegionKind::VisualArea,
            BoundingBox::new(10.0, 10.0, 90.0, 70.0),
            15 * 1024,
            0.3,
        );
        let qa = quality_score(&a);
        let qb = quality_score(&b);
        assert!(qa > qb + 2.0, "expected a clear gap: {qa} vs {qb}");

        let kept = resolve_competing(vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].region_id, 1);
    }

    #[test]
    fn test_small_file_penalty_applies() {
        let small = region(
            1,
            RegionKind::VisualArea,
            BoundingBox::new(0.0, 0.0, 80.0, 60.0),
            15 * 1024,
            0.5,
        );
        let big = region(
            2,
            RegionKind::VisualArea,
            BoundingBox::new(0.0, 0.0, 80.0, 60.0),
            200 * 1024,
            0.5,
        );
        assert!(quality_score(&big) - quality_score(&small) >= SMALL_FILE_PENALTY - 0.5);
    }

    #[test]
    fn test_distinct_kinds_coexist() {
        let image = region(
            1,
            RegionKind::RasterImage,
            BoundingBox::new(0.0, 0.0, 200.0, 150.0),
            300 * 1024,
            0.95,
        );
        let table = region(
            2,
            RegionKind::DetectedTable,
            BoundingBox::new(0.0, 200.0, 400.0, 350.0),
            60 * 1024,
            0.8,
        );
        let kept = resolve_competing(vec![image, table]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_overlapping_same_kind_resolved() {
        let big = region(
            1,
            RegionKind::RasterImage,
            BoundingBox::new(0.0, 0.0, 300.0, 200.0),
            400 * 1024,
            0.95,
        );
        let nested = region(
            2,
            RegionKind::RasterImage,
            BoundingBox::new(20.0, 20.0, 120.0, 100.0),
            60 * 1024,
            0.95,
        );
        let kept = resolve_competing(vec![big, nested]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].region_id, 1);
    }

    #[test]
    fn test_at_least_one_survivor_per_group() {
        let regions: Vec<Region> = (0..4)
            .map(|i| {
                region(
                    i,
                    RegionKind::VisualArea,
                    BoundingBox::new(0.0, 0.0, 100.0, 100.0),
                    10 * 1024,
                    0.2,
                )
            })
            .collect();
        let kept = resolve_competing(regions);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_single_region_untouched() {
        let only = region(
            7,
            RegionKind::DetectedEquation,
            BoundingBox::new(0.0, 0.0, 50.0, 20.0),
            0,
            0.8,
        );
        let kept = resolve_competing(vec![only]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].region_id, 7);
    }
}
