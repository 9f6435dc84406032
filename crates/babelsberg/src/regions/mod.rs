//! Visual region extraction: raster images, detected tables, detected
//! equations, and sparse-text visual areas.
//!
//! Sub-passes run in a fixed order, then guards reject false positives and
//! competing extractions are resolved. The extractor owns its regions until
//! the pipeline folds the survivors into content blocks.

pub mod dedup;
pub mod guards;
pub mod tables;

pub use dedup::{quality_score, resolve_competing};
pub use tables::TableCandidate;

use crate::classify::patterns;
use crate::config::RegionConfig;
use crate::source::PageData;
use crate::types::{BoundingBox, Region, RegionKind};
use tracing::debug;

/// Maximum aspect ratio for a raster image worth keeping.
const MAX_ASPECT_RATIO: f32 = 20.0;

/// Preemptive filter: encoded files below this size are decorative noise.
const MIN_IMAGE_BYTES: usize = 1024;

/// Vector drawing count that marks a page as visual.
const MIN_DRAWINGS_FOR_VISUAL: usize = 3;

/// Text coverage below which a page counts as sparse (visual).
const SPARSE_TEXT_COVERAGE: f32 = 0.20;

/// Page margin fraction excluded from visual-area regions.
const VISUAL_MARGIN: f32 = 0.05;

/// Emission priorities by kind (visual areas scale with size).
const PRIORITY_RASTER: f32 = 0.95;
const PRIORITY_DETECTED: f32 = 0.8;
const PRIORITY_VISUAL_BASE: f32 = 0.7;
const PRIORITY_VISUAL_SPAN: f32 = 0.2;

/// Result of region extraction for one page.
#[derive(Debug, Default)]
pub struct PageRegions {
    pub regions: Vec<Region>,
    /// Count of candidates rejected by guards and filters.
    pub filtered_count: usize,
}

/// Stateful extractor allocating document-unique region ids.
pub struct RegionExtractor {
    config: RegionConfig,
    next_region_id: u64,
}

impl RegionExtractor {
    pub fn new(config: RegionConfig) -> Self {
        RegionExtractor {
            config,
            next_region_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_region_id;
        self.next_region_id += 1;
        id
    }

    /// Run all sub-passes, guards, and dedup for one page.
    pub fn extract_page(&mut self, page: &PageData) -> PageRegions {
        let mut candidates: Vec<Region> = Vec::new();
        let mut filtered = 0usize;

        filtered += self.raster_pass(page, &mut candidates);
        if self.config.extract_tables_as_images {
            filtered += self.table_pass(page, &mut candidates);
        }
        if self.config.extract_equations_as_images {
            self.equation_pass(page, &mut candidates);
        }
        self.visual_area_pass(page, &mut candidates);

        // Guards over the assembled candidate set.
        let page_text = page.full_text();
        let has_context = guards::page_has_image_context(&page_text);
        let before_guards = candidates.len();
        candidates.retain(|region| match region.kind {
            RegionKind::VisualArea => {
                let clipped = clipped_text(page, &region.bbox);
                !guards::is_mostly_prose(&clipped) && has_context
            }
            RegionKind::RasterImage => has_context,
            _ => true,
        });
        filtered += before_guards - candidates.len();

        let before_dedup = candidates.len();
        let mut regions = resolve_competing(candidates);
        filtered += before_dedup - regions.len();

        let page_area = page.width * page.height;
        for region in &mut regions {
            region.priority = match region.kind {
                RegionKind::RasterImage => PRIORITY_RASTER,
                RegionKind::DetectedTable | RegionKind::DetectedEquation => PRIORITY_DETECTED,
                RegionKind::VisualArea => {
                    let span = if page_area > 0.0 {
                        (region.bbox.area() / page_area).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    PRIORITY_VISUAL_BASE + PRIORITY_VISUAL_SPAN * span
                }
            };
        }

        debug!(
            page = page.page_number,
            kept = regions.len(),
            filtered,
            "region extraction finished"
        );

        PageRegions {
            regions,
            filtered_count: filtered,
        }
    }

    /// Embedded raster images, filtered by dimensions, aspect, and size.
    fn raster_pass(&mut self, page: &PageData, out: &mut Vec<Region>) -> usize {
        let mut filtered = 0usize;
        for image in &page.images {
            let keep = image.width >= self.config.min_image_width_px
                && image.height >= self.config.min_image_height_px
                && aspect_ratio_ok(image.width, image.height)
                && image.data.len() >= MIN_IMAGE_BYTES;
            if !keep {
                filtered += 1;
                continue;
            }
            out.push(Region {
                region_id: self.next_id(),
                kind: RegionKind::RasterImage,
                bbox: image.bbox,
                page_num: page.page_number,
                source_path: String::new(),
                confidence: 0.9,
                ocr_text: None,
                extracted_text: None,
                file_size: image.data.len(),
                data: Some(image.data.clone()),
                priority: 0.0,
            });
        }
        filtered
    }

    /// Table candidates from text geometry, minus assessment prose.
    fn table_pass(&mut self, page: &PageData, out: &mut Vec<Region>) -> usize {
        let mut filtered = 0usize;
        for candidate in tables::detect_tables(page, &self.config) {
            if guards::is_assessment_prose(&candidate.full_text()) {
                filtered += 1;
                continue;
            }
            out.push(Region {
                region_id: self.next_id(),
                kind: RegionKind::DetectedTable,
                bbox: candidate.bbox,
                page_num: page.page_number,
                source_path: String::new(),
                confidence: 0.8,
                ocr_text: None,
                extracted_text: Some(candidate.to_markdown()),
                data: None,
                file_size: 0,
                priority: 0.0,
            });
        }
        filtered
    }

    /// Equation-bearing spans become equation regions.
    fn equation_pass(&mut self, page: &PageData, out: &mut Vec<Region>) {
        for span in &page.spans {
            let text = span.text.trim();
            if text.is_empty() || !patterns::is_equation_like(text) {
                continue;
            }
            out.push(Region {
                region_id: self.next_id(),
                kind: RegionKind::DetectedEquation,
                bbox: span.bbox,
                page_num: page.page_number,
                source_path: String::new(),
                confidence: 0.8,
                ocr_text: None,
                extracted_text: Some(text.to_string()),
                data: None,
                file_size: 0,
                priority: 0.0,
            });
        }
    }

    /// Whole-page visual area when the page looks graphic-heavy or sparse.
    fn visual_area_pass(&mut self, page: &PageData, out: &mut Vec<Region>) {
        let is_visual = page.drawing_count >= MIN_DRAWINGS_FOR_VISUAL
            || !page.images.is_empty()
            || page.text_coverage() < SPARSE_TEXT_COVERAGE;
        if !is_visual {
            return;
        }

        let margin_x = page.width * VISUAL_MARGIN;
        let margin_y = page.height * VISUAL_MARGIN;
        out.push(Region {
            region_id: self.next_id(),
            kind: RegionKind::VisualArea,
            bbox: BoundingBox::new(margin_x, margin_y, page.width - margin_x, page.height - margin_y),
            page_num: page.page_number,
            source_path: String::new(),
            confidence: 0.6,
            ocr_text: None,
            extracted_text: None,
            data: None,
            file_size: 0,
            priority: 0.0,
        });
    }
}

fn aspect_ratio_ok(width: u32, height: u32) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    let (long, short) = if width > height {
        (width as f32, height as f32)
    } else {
        (height as f32, width as f32)
    };
    long / short <= MAX_ASPECT_RATIO
}

/// Text of all spans whose boxes intersect the clip region.
fn clipped_text(page: &PageData, clip: &BoundingBox) -> String {
    let mut out = String::new();
    for span in &page.spans {
        if span.bbox.intersects(clip) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&span.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ImageObject, SpanFlags, TextSpan};

    fn image(width: u32, height: u32, bytes: usize) -> ImageObject {
        ImageObject {
            bbox: BoundingBox::new(100.0, 100.0, 100.0 + width as f32, 100.0 + height as f32),
            width,
            height,
            data: vec![0u8; bytes],
        }
    }

    fn span(text: &str, y: f32) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            bbox: BoundingBox::new(50.0, y, 550.0, y + 14.0),
            font_name: "Times".to_string(),
            font_size: 12.0,
            flags: SpanFlags::default(),
            color: 0,
        }
    }

    fn figure_page(images: Vec<ImageObject>) -> PageData {
        PageData {
            page_number: 1,
            width: 612.0,
            height: 792.0,
            spans: vec![span("Figure 1 shows the measured data over 10 runs.", 600.0)],
            images,
            drawing_count: 0,
        }
    }

    #[test]
    fn test_raster_pass_keeps_valid_image() {
        let mut extractor = RegionExtractor::new(RegionConfig::default());
        let result = extractor.extract_page(&figure_page(vec![image(200, 150, 80 * 1024)]));
        assert!(result.regions.iter().any(|r| r.kind == RegionKind::RasterImage));
    }

    #[test]
    fn test_tiny_image_filtered() {
        let mut extractor = RegionExtractor::new(RegionConfig::default());
        let result = extractor.extract_page(&figure_page(vec![image(4, 4, 80 * 1024)]));
        assert!(!result.regions.iter().any(|r| r.kind == RegionKind::RasterImage));
        assert!(result.filtered_count >= 1);
    }

    #[test]
    fn test_extreme_aspect_ratio_filtered() {
        let mut extractor = RegionExtractor::new(RegionConfig::default());
        // A 1000x10 strip is a rule, not a figure.
        let result = extractor.extract_page(&figure_page(vec![image(1000, 10, 80 * 1024)]));
        assert!(!result.regions.iter().any(|r| r.kind == RegionKind::RasterImage));
    }

    #[test]
    fn test_small_file_preemptive_filter() {
        let mut extractor = RegionExtractor::new(RegionConfig::default());
        let result = extractor.extract_page(&figure_page(vec![image(200, 150, 512)]));
        assert!(!result.regions.iter().any(|r| r.kind == RegionKind::RasterImage));
    }

    #[test]
    fn test_no_image_context_rejects_raster() {
        let mut extractor = RegionExtractor::new(RegionConfig::default());
        let page = PageData {
            page_number: 1,
            width: 612.0,
            height: 792.0,
            spans: vec![span("This chapter narrates the early life of the author.", 300.0)],
            images: vec![image(200, 150, 80 * 1024)],
            drawing_count: 0,
        };
        let result = extractor.extract_page(&page);
        assert!(!result.regions.iter().any(|r| r.kind == RegionKind::RasterImage));
    }

    #[test]
    fn test_visual_area_on_drawing_heavy_page() {
        let mut extractor = RegionExtractor::new(RegionConfig::default());
        let page = PageData {
            page_number: 3,
            width: 612.0,
            height: 792.0,
            spans: vec![span("Diagram of the system; see Figure 2 for details.", 80.0)],
            images: vec![],
            drawing_count: 12,
        };
        let result = extractor.extract_page(&page);
        let visual: Vec<_> = result
            .regions
            .iter()
            .filter(|r| r.kind == RegionKind::VisualArea)
            .collect();
        assert_eq!(visual.len(), 1);
        assert!(visual[0].priority >= PRIORITY_VISUAL_BASE);
        assert!(visual[0].priority <= PRIORITY_VISUAL_BASE + PRIORITY_VISUAL_SPAN);
    }

    #[test]
    fn test_prose_page_produces_no_visual_area() {
        let mut extractor = RegionExtractor::new(RegionConfig::default());
        let spans: Vec<TextSpan> = (0..30)
            .map(|i| {
                span(
                    "A long discussion follows. However, the argument continues. Therefore we proceed.",
                    40.0 + (i as f32) * 24.0,
                )
            })
            .collect();
        let page = PageData {
            page_number: 4,
            width: 612.0,
            height: 792.0,
            spans,
            images: vec![],
            drawing_count: 5,
        };
        let result = extractor.extract_page(&page);
        assert!(!result.regions.iter().any(|r| r.kind == RegionKind::VisualArea));
    }

    #[test]
    fn test_equation_pass_emits_regions() {
        let mut extractor = RegionExtractor::new(RegionConfig::default());
        let page = PageData {
            page_number: 2,
            width: 612.0,
            height: 792.0,
            spans: vec![span("E = mc^2", 200.0), span("Figure 4 plots energy against 3 masses.", 300.0)],
            images: vec![],
            drawing_count: 0,
        };
        let result = extractor.extract_page(&page);
        let eq: Vec<_> = result
            .regions
            .iter()
            .filter(|r| r.kind == RegionKind::DetectedEquation)
            .collect();
        assert_eq!(eq.len(), 1);
        assert_eq!(eq[0].extracted_text.as_deref(), Some("E = mc^2"));
        assert!((eq[0].priority - PRIORITY_DETECTED).abs() < 1e-6);
    }

    #[test]
    fn test_region_ids_unique_across_pages() {
        let mut extractor = RegionExtractor::new(RegionConfig::default());
        let first = extractor.extract_page(&figure_page(vec![image(200, 150, 80 * 1024)]));
        let second = extractor.extract_page(&figure_page(vec![image(200, 150, 80 * 1024)]));
        let mut ids: Vec<u64> = first
            .regions
            .iter()
            .chain(second.regions.iter())
            .map(|r| r.region_id)
            .collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }
}
