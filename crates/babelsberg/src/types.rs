//! Core data model: documents, typed content blocks, regions, and tasks.
//!
//! A `Document` owns an ordered stream of `ContentBlock`s for the lifetime of
//! a pipeline run. Cross references between blocks (image to caption, caption
//! to target) are `block_id` index lookups into that stream, never shared
//! owning references.
//!
//! All geometry uses a top-left origin: `y` grows downward, matching the
//! coordinate space the page source adapters normalize to.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A bounding box in page coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left x-coordinate
    pub x0: f32,
    /// Top y-coordinate
    pub y0: f32,
    /// Right x-coordinate
    pub x1: f32,
    /// Bottom y-coordinate
    pub y1: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        BoundingBox { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        (self.width().max(0.0)) * (self.height().max(0.0))
    }

    /// Center coordinates of this box.
    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Euclidean distance between the centers of two boxes.
    pub fn center_distance(&self, other: &BoundingBox) -> f32 {
        let (cx, cy) = self.center();
        let (ox, oy) = other.center();
        ((cx - ox).powi(2) + (cy - oy).powi(2)).sqrt()
    }

    /// Intersection area between this box and another.
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        (x1 - x0).max(0.0) * (y1 - y0).max(0.0)
    }

    /// Intersection area as a fraction of this box's area.
    pub fn intersection_ratio(&self, other: &BoundingBox) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            0.0
        } else {
            self.intersection_area(other) / area
        }
    }

    /// Intersection area as a fraction of the smaller of the two boxes.
    ///
    /// Used by competing-extraction resolution, where a small region nested
    /// inside a large one must count as overlapping.
    pub fn overlap_of_smaller(&self, other: &BoundingBox) -> f32 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            0.0
        } else {
            self.intersection_area(other) / smaller
        }
    }

    /// Whether the two boxes share any area.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.intersection_area(other) > 0.0
    }

    /// Smallest box containing both.
    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1
    }
}

/// Typographic attributes of a text run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Formatting {
    pub font_name: String,
    pub font_size: f32,
    pub is_bold: bool,
    pub is_italic: bool,
    /// Packed sRGB color as 0xRRGGBB.
    pub color: u32,
    /// Raw span flags from the page source, passed through untouched.
    pub flags: u32,
}

/// How an image region sits relative to its nearest text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialRelationship {
    /// Region appears above the associated text.
    Before,
    /// Region appears below the associated text.
    After,
    /// Region sits to the left or right of the text.
    Alongside,
    /// Region overlaps the text block.
    Wrapped,
    /// No text block close enough to associate with.
    Standalone,
}

/// Classification of non-content metadata blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    /// Processing artifact, e.g. a page that failed extraction.
    Artifact,
    /// Running header.
    Header,
    /// Running footer.
    Footer,
    /// Standalone page number.
    PageNum,
}

/// List marker style for list items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStyle {
    #[default]
    Bullet,
    Numbered,
    Lettered,
}

/// Type-specific payload of a content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Heading {
        /// 1..=6
        level: u8,
        content: String,
    },
    Paragraph {
        content: String,
    },
    ListItem {
        content: String,
        marker_style: MarkerStyle,
    },
    Table {
        markdown_content: String,
        row_count: usize,
        column_count: usize,
    },
    CodeBlock {
        content: String,
    },
    Equation {
        content: String,
    },
    Caption {
        content: String,
        /// Block id of the image/table this caption describes, if linked.
        target_block_id: Option<u64>,
    },
    ImagePlaceholder {
        image_path: String,
        width: f32,
        height: f32,
        ocr_text: Option<String>,
        caption_block_id: Option<u64>,
        spatial_relationship: SpatialRelationship,
        translation_needed: bool,
    },
    Metadata {
        content: String,
        metadata_type: MetadataKind,
    },
}

impl BlockKind {
    /// Translatable text carried by this block, if any.
    ///
    /// Code blocks and equations are intentionally excluded; their content
    /// must pass through translation untouched.
    pub fn translatable_text(&self) -> Option<&str> {
        match self {
            BlockKind::Heading { content, .. }
            | BlockKind::Paragraph { content }
            | BlockKind::ListItem { content, .. }
            | BlockKind::Caption { content, .. } => Some(content),
            BlockKind::Table { markdown_content, .. } => Some(markdown_content),
            BlockKind::ImagePlaceholder {
                ocr_text: Some(text),
                translation_needed: true,
                ..
            } => Some(text),
            _ => None,
        }
    }

    /// Replace the translatable text of this block in place.
    pub fn set_translated_text(&mut self, translated: String) {
        match self {
            BlockKind::Heading { content, .. }
            | BlockKind::Paragraph { content }
            | BlockKind::ListItem { content, .. }
            | BlockKind::Caption { content, .. } => *content = translated,
            BlockKind::Table { markdown_content, .. } => *markdown_content = translated,
            BlockKind::ImagePlaceholder { ocr_text, .. } => *ocr_text = Some(translated),
            _ => {}
        }
    }

    /// Short tag for logging and the metadata sidecar.
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockKind::Heading { .. } => "heading",
            BlockKind::Paragraph { .. } => "paragraph",
            BlockKind::ListItem { .. } => "list_item",
            BlockKind::Table { .. } => "table",
            BlockKind::CodeBlock { .. } => "code_block",
            BlockKind::Equation { .. } => "equation",
            BlockKind::Caption { .. } => "caption",
            BlockKind::ImagePlaceholder { .. } => "image_placeholder",
            BlockKind::Metadata { .. } => "metadata",
        }
    }
}

/// A typed unit of content bound to a page region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Globally unique id, assigned by the pipeline.
    pub block_id: u64,
    /// 1-based page number.
    pub page_num: u32,
    /// Index of the source run within its page, before reordering.
    pub block_num: u32,
    pub bbox: BoundingBox,
    pub formatting: Formatting,
    /// Position within the page's reading order; unique per page.
    pub reading_order_position: u32,
    #[serde(flatten)]
    pub kind: BlockKind,
}

/// An ordered, translated (or to-be-translated) document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub title: Option<String>,
    pub source_path: String,
    pub total_pages: u32,
    /// Globally ordered by (page_num, reading_order_position).
    pub blocks: Vec<ContentBlock>,
    pub toc: Vec<TocEntry>,
}

impl Document {
    /// Look up a block by id.
    pub fn block(&self, block_id: u64) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| b.block_id == block_id)
    }

    /// Sort blocks into the global (page, reading order) invariant order.
    pub fn sort_blocks(&mut self) {
        self.blocks
            .sort_by_key(|b| (b.page_num, b.reading_order_position));
    }
}

/// Kind of an extracted candidate region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    RasterImage,
    DetectedTable,
    DetectedEquation,
    VisualArea,
}

impl RegionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::RasterImage => "raster_image",
            RegionKind::DetectedTable => "detected_table",
            RegionKind::DetectedEquation => "detected_equation",
            RegionKind::VisualArea => "visual_area",
        }
    }
}

/// An extracted rectangular area that will become an image-bearing block, a
/// table, or an equation, or be dropped by a guard.
///
/// Regions exist only between extraction and block folding; the extractor
/// owns them until they are consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub region_id: u64,
    pub kind: RegionKind,
    pub bbox: BoundingBox,
    /// 1-based page number.
    pub page_num: u32,
    /// Path of the written image file, empty until emitted.
    pub source_path: String,
    pub confidence: f32,
    pub ocr_text: Option<String>,
    /// Extracted text payload: markdown for detected tables, source text for
    /// detected equations.
    pub extracted_text: Option<String>,
    /// Encoded image bytes, present until the region is written to disk.
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    /// Encoded size in bytes; retained after `data` is dropped.
    pub file_size: usize,
    /// Emission priority in [0, 1].
    pub priority: f32,
}

/// Provenance of a table-of-contents entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TocSource {
    /// Dot-leader or "Chapter N:" style line on an explicit ToC page.
    TocPageChapter,
    /// Numbered section line on an explicit ToC page.
    TocPageNumbered,
    /// Derived from classified heading blocks.
    HeadingStructure,
    /// Derived from content analysis fallbacks.
    ContentAnalysis,
}

/// A hierarchical outline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub page: Option<u32>,
    /// 1..=6
    pub level: u8,
    pub source: TocSource,
    /// [0, 1]
    pub confidence: f32,
}

/// A single unit of work for the translation orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationTask {
    /// Deterministic id: truncated SHA-256 of (text, target_language).
    pub task_id: String,
    pub text: String,
    pub target_language: String,
    /// Block type tag, forwarded to the backend for prompt shaping.
    pub item_type: String,
    /// 1 = high, 2 = medium, 3 = low. Lower issues first.
    pub priority: u8,
    pub context_before: String,
    pub context_after: String,
}

impl TranslationTask {
    pub fn new(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        let text = text.into();
        let target_language = target_language.into();
        let task_id = Self::compute_id(&text, &target_language);
        TranslationTask {
            task_id,
            text,
            target_language,
            item_type: "text".to_string(),
            priority: 2,
            context_before: String::new(),
            context_after: String::new(),
        }
    }

    pub fn with_item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 3);
        self
    }

    pub fn with_context(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.context_before = before.into();
        self.context_after = after.into();
        self
    }

    /// Truncated SHA-256 of the text and target language.
    pub fn compute_id(text: &str, target_language: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(target_language.as_bytes());
        let digest = hasher.finalize();
        let mut id = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            id.push_str(&format!("{:02x}", byte));
        }
        id
    }
}
