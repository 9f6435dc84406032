//! Image-to-text association and caption linking.
//!
//! Each surviving region is bound to the nearest text block on its page,
//! given a spatial relationship, and searched for a caption among the text
//! blocks within adaptive distance thresholds. Caption confidence combines
//! pattern strength, relative position, proximity, and horizontal alignment.

use crate::config::AssociationConfig;
use crate::types::{BoundingBox, ContentBlock, Region, SpatialRelationship};
use once_cell::sync::Lazy;
use regex::Regex;

/// Bounds for the adaptive caption distance thresholds.
const MIN_VERTICAL_DISTANCE: f32 = 50.0;
const MAX_VERTICAL_DISTANCE: f32 = 100.0;
const MIN_HORIZONTAL_DISTANCE: f32 = 75.0;
const MAX_HORIZONTAL_DISTANCE: f32 = 150.0;

/// Captions longer than this are penalized by half.
const LONG_CAPTION_CHARS: usize = 200;

static CAPTION_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(figure|fig\.?|table|chart|diagram|source|credit)\b")
        .expect("Caption prefix regex is valid and should compile")
});

static PAREN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\([a-z0-9]+\)").expect("Paren label regex is valid and should compile"));

static STEP_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(step|phase|stage|example)\b").expect("Step prefix regex is valid and should compile")
});

/// Keywords that qualify short descriptive text as a caption.
const DESCRIPTIVE_KEYWORDS: &[&str] = &[
    "shows",
    "illustrates",
    "depicts",
    "comparison",
    "overview",
    "distribution",
    "architecture",
    "workflow",
    "structure",
];

/// One region's association outcome.
#[derive(Debug, Clone)]
pub struct Association {
    pub region_id: u64,
    pub relationship: SpatialRelationship,
    /// Reading-order position the folded block should take; the pipeline
    /// renumbers to keep per-page uniqueness.
    pub insert_position: u32,
    /// Index into the page's block slice of the chosen caption, if any.
    pub caption_index: Option<usize>,
    pub caption_confidence: f32,
}

/// Associate every region with the page's text blocks.
///
/// `blocks` must all belong to the region's page and carry final
/// `reading_order_position` values.
pub fn associate_regions(
    regions: &[Region],
    blocks: &[ContentBlock],
    config: &AssociationConfig,
) -> Vec<Association> {
    regions
        .iter()
        .map(|region| associate_one(region, blocks, config))
        .collect()
}

fn associate_one(region: &Region, blocks: &[ContentBlock], config: &AssociationConfig) -> Association {
    let nearest = blocks
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da = region.bbox.center_distance(&a.bbox);
            let db = region.bbox.center_distance(&b.bbox);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(idx, _)| idx);

    let (relationship, insert_position) = match nearest {
        None => (SpatialRelationship::Standalone, 0),
        Some(idx) => {
            let block = &blocks[idx];
            let relationship = spatial_relationship(&region.bbox, &block.bbox);
            let position = match relationship {
                SpatialRelationship::Before => block.reading_order_position,
                _ => block.reading_order_position + 1,
            };
            (relationship, position)
        }
    };

    let (caption_index, caption_confidence) = find_caption(region, blocks, config);

    Association {
        region_id: region.region_id,
        relationship,
        insert_position,
        caption_index,
        caption_confidence,
    }
}

/// Geometry of the region relative to one text block.
pub fn spatial_relationship(region: &BoundingBox, block: &BoundingBox) -> SpatialRelationship {
    if region.intersects(block) {
        return SpatialRelationship::Wrapped;
    }
    if region.y1 <= block.y0 {
        return SpatialRelationship::Before;
    }
    if region.y0 >= block.y1 {
        return SpatialRelationship::After;
    }
    SpatialRelationship::Alongside
}

/// Pick the best caption candidate for a region, if any clears the floor.
fn find_caption(region: &Region, blocks: &[ContentBlock], config: &AssociationConfig) -> (Option<usize>, f32) {
    let max_vertical = (region.bbox.height() * 0.5).clamp(MIN_VERTICAL_DISTANCE, MAX_VERTICAL_DISTANCE);
    let max_horizontal = (region.bbox.width() * 0.3).clamp(MIN_HORIZONTAL_DISTANCE, MAX_HORIZONTAL_DISTANCE);

    let mut best: Option<usize> = None;
    let mut best_confidence = 0.0f32;

    for (idx, block) in blocks.iter().enumerate() {
        let Some(text) = block.kind.translatable_text() else {
            continue;
        };

        let (vertical_gap, horizontal_gap) = gaps(&region.bbox, &block.bbox);
        if vertical_gap > max_vertical || horizontal_gap > max_horizontal {
            continue;
        }

        let Some(base) = caption_base_confidence(text) else {
            continue;
        };

        let mut confidence = base;
        confidence += position_bonus(&region.bbox, &block.bbox);
        confidence += proximity_bonus(vertical_gap.max(horizontal_gap));
        confidence += 0.2 * alignment_score(&region.bbox, &block.bbox);

        if text.chars().count() > LONG_CAPTION_CHARS {
            confidence *= 0.5;
        }

        if confidence > best_confidence {
            best_confidence = confidence;
            best = Some(idx);
        }
    }

    if best_confidence > config.caption_confidence_floor {
        (best, best_confidence)
    } else {
        (None, best_confidence)
    }
}

/// Axis-wise gaps between two boxes; zero when they overlap on that axis.
fn gaps(a: &BoundingBox, b: &BoundingBox) -> (f32, f32) {
    let vertical = if a.y1 < b.y0 {
        b.y0 - a.y1
    } else if b.y1 < a.y0 {
        a.y0 - b.y1
    } else {
        0.0
    };
    let horizontal = if a.x1 < b.x0 {
        b.x0 - a.x1
    } else if b.x1 < a.x0 {
        a.x0 - b.x1
    } else {
        0.0
    };
    (vertical, horizontal)
}

/// Screen for caption-likeness; returns the base confidence when it passes.
fn caption_base_confidence(text: &str) -> Option<f32> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if CAPTION_PREFIX.is_match(trimmed) {
        return Some(0.5);
    }
    if PAREN_LABEL.is_match(trimmed) {
        return Some(0.35);
    }
    if STEP_PREFIX.is_match(trimmed) {
        return Some(0.3);
    }

    // Descriptive short text: at most 15 words, no terminal punctuation,
    // containing a descriptive keyword.
    let word_count = trimmed.split_whitespace().count();
    let ends_sentence = trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?');
    if word_count <= 15 && !ends_sentence {
        let lower = trimmed.to_lowercase();
        if DESCRIPTIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return Some(0.2);
        }
    }
    None
}

fn position_bonus(region: &BoundingBox, block: &BoundingBox) -> f32 {
    match spatial_relationship(region, block) {
        // Caption below the image is the common layout.
        SpatialRelationship::Before => 0.3,
        SpatialRelationship::After => 0.2,
        SpatialRelationship::Alongside => 0.1,
        _ => 0.0,
    }
}

fn proximity_bonus(gap: f32) -> f32 {
    if gap <= 10.0 {
        0.2
    } else if gap <= 30.0 {
        0.1
    } else if gap <= 50.0 {
        0.05
    } else {
        0.0
    }
}

/// Horizontal alignment of centers, 1.0 when perfectly centered.
fn alignment_score(region: &BoundingBox, block: &BoundingBox) -> f32 {
    let (rx, _) = region.center();
    let (bx, _) = block.center();
    let span = region.width().max(1.0);
    (1.0 - ((rx - bx).abs() / span)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockKind, Formatting};

    fn block(idx: u64, text: &str, bbox: BoundingBox, position: u32) -> ContentBlock {
        ContentBlock {
            block_id: idx,
            page_num: 1,
            block_num: idx as u32,
            bbox,
            formatting: Formatting::default(),
            reading_order_position: position,
            kind: BlockKind::Paragraph {
                content: text.to_string(),
            },
        }
    }

    fn region_with_bbox(bbox: BoundingBox) -> Region {
        Region {
            region_id: 1,
            kind: crate::types::RegionKind::RasterImage,
            bbox,
            page_num: 1,
            source_path: String::new(),
            confidence: 0.9,
            ocr_text: None,
            extracted_text: None,
            data: None,
            file_size: 100 * 1024,
            priority: 0.95,
        }
    }

    #[test]
    fn test_caption_below_image_wins() {
        let image = region_with_bbox(BoundingBox::new(100.0, 100.0, 300.0, 260.0));
        let blocks = vec![
            block(
                1,
                "The preceding section described the experimental setup in detail.",
                BoundingBox::new(50.0, 20.0, 550.0, 80.0),
                0,
            ),
            block(
                2,
                "Figure 3: Measured throughput by configuration",
                BoundingBox::new(100.0, 270.0, 300.0, 290.0),
                1,
            ),
        ];
        let config = AssociationConfig::default();
        let associations = associate_regions(&[image], &blocks, &config);
        assert_eq!(associations.len(), 1);
        let assoc = &associations[0];
        assert_eq!(assoc.caption_index, Some(1));
        assert!(assoc.caption_confidence > 0.7, "got {}", assoc.caption_confidence);
    }

    #[test]
    fn test_no_caption_when_too_far() {
        let image = region_with_bbox(BoundingBox::new(100.0, 100.0, 300.0, 260.0));
        let blocks = vec![block(
            1,
            "Figure 9: Unrelated caption far away",
            BoundingBox::new(100.0, 700.0, 300.0, 720.0),
            0,
        )];
        let config = AssociationConfig::default();
        let associations = associate_regions(&[image], &blocks, &config);
        assert_eq!(associations[0].caption_index, None);
    }

    #[test]
    fn test_plain_text_not_a_caption() {
        let image = region_with_bbox(BoundingBox::new(100.0, 100.0, 300.0, 260.0));
        let blocks = vec![block(
            1,
            "Meanwhile the committee deliberated for several hours on the motion.",
            BoundingBox::new(100.0, 270.0, 300.0, 290.0),
            0,
        )];
        let config = AssociationConfig::default();
        let associations = associate_regions(&[image], &blocks, &config);
        assert_eq!(associations[0].caption_index, None);
    }

    #[test]
    fn test_long_caption_penalized_below_floor() {
        let image = region_with_bbox(BoundingBox::new(100.0, 100.0, 300.0, 260.0));
        let long_caption = format!("Figure 1: {}", "very long caption text ".repeat(15));
        assert!(long_caption.chars().count() > 200);
        let blocks = vec![block(1, &long_caption, BoundingBox::new(100.0, 270.0, 300.0, 290.0), 0)];

        // With a floor of 0.65 the halved confidence cannot clear it.
        let config = AssociationConfig {
            caption_confidence_floor: 0.65,
        };
        let associations = associate_regions(&[image], &blocks, &config);
        assert_eq!(associations[0].caption_index, None);
    }

    #[test]
    fn test_relationships() {
        let text = BoundingBox::new(100.0, 300.0, 400.0, 360.0);
        assert_eq!(
            spatial_relationship(&BoundingBox::new(100.0, 100.0, 300.0, 260.0), &text),
            SpatialRelationship::Before
        );
        assert_eq!(
            spatial_relationship(&BoundingBox::new(100.0, 400.0, 300.0, 500.0), &text),
            SpatialRelationship::After
        );
        assert_eq!(
            spatial_relationship(&BoundingBox::new(450.0, 300.0, 550.0, 360.0), &text),
            SpatialRelationship::Alongside
        );
        assert_eq!(
            spatial_relationship(&BoundingBox::new(150.0, 320.0, 350.0, 340.0), &text),
            SpatialRelationship::Wrapped
        );
    }

    #[test]
    fn test_insert_position_relative_to_nearest() {
        // Region above its nearest block inserts at the block's position.
        let image = region_with_bbox(BoundingBox::new(100.0, 100.0, 300.0, 200.0));
        let blocks = vec![
            block(1, "Below the image sits this paragraph of text.", BoundingBox::new(100.0, 220.0, 500.0, 260.0), 5),
        ];
        let config = AssociationConfig::default();
        let associations = associate_regions(&[image], &blocks, &config);
        assert_eq!(associations[0].relationship, SpatialRelationship::Before);
        assert_eq!(associations[0].insert_position, 5);
    }

    #[test]
    fn test_standalone_without_blocks() {
        let image = region_with_bbox(BoundingBox::new(100.0, 100.0, 300.0, 200.0));
        let config = AssociationConfig::default();
        let associations = associate_regions(&[image], &[], &config);
        assert_eq!(associations[0].relationship, SpatialRelationship::Standalone);
        assert_eq!(associations[0].insert_position, 0);
    }
}
