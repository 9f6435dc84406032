//! Interfaces to the external collaborators: the page source, the OCR
//! engine, and the machine-translation backend.
//!
//! The pipeline never talks to a PDF library, an OCR engine, or a
//! translation service directly. It consumes `PageData` values from a
//! `DocumentSource` and hands text to a `TranslationBackend`; everything
//! else is an implementation detail behind these traits.

use crate::error::Result;
use crate::types::BoundingBox;
use async_trait::async_trait;

/// Span-level style flags from the page source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpanFlags {
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    /// Raw flag bits from the source, passed through untouched.
    pub raw: u32,
}

/// A contiguous run of same-style text on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BoundingBox,
    pub font_name: String,
    pub font_size: f32,
    pub flags: SpanFlags,
    /// Packed sRGB color as 0xRRGGBB.
    pub color: u32,
}

/// An embedded image object on a page.
#[derive(Debug, Clone)]
pub struct ImageObject {
    pub bbox: BoundingBox,
    /// Pixel width of the underlying raster.
    pub width: u32,
    /// Pixel height of the underlying raster.
    pub height: u32,
    /// Encoded image bytes (PNG or JPEG).
    pub data: Vec<u8>,
}

/// Everything the pipeline needs from one page.
///
/// Geometry is normalized to a top-left origin before a `PageData` is
/// constructed; adapters own the coordinate flip.
#[derive(Debug, Clone, Default)]
pub struct PageData {
    /// 1-based page number.
    pub page_number: u32,
    pub width: f32,
    pub height: f32,
    pub spans: Vec<TextSpan>,
    pub images: Vec<ImageObject>,
    /// Count of vector drawing objects on the page.
    pub drawing_count: usize,
}

impl PageData {
    /// Concatenated text of all spans, newline separated.
    pub fn full_text(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&span.text);
        }
        out
    }

    /// Fraction of the page area covered by text spans.
    pub fn text_coverage(&self) -> f32 {
        let page_area = self.width * self.height;
        if page_area <= 0.0 {
            return 0.0;
        }
        let text_area: f32 = self.spans.iter().map(|s| s.bbox.area()).sum();
        (text_area / page_area).min(1.0)
    }
}

/// A parsed document yielding pages one at a time.
///
/// Page-level failures must be returned as `BabelsbergError::Extraction`;
/// the pipeline converts them into artifact metadata blocks and continues.
pub trait DocumentSource {
    fn page_count(&self) -> usize;
    fn load_page(&mut self, index: usize) -> Result<PageData>;
    /// Path or identifier of the underlying document, for diagnostics.
    fn source_path(&self) -> &str;

    /// Render a page clip to encoded image bytes, when the source can.
    ///
    /// Visual-area regions need a rasterization of the page region they
    /// cover; sources that cannot render return `None` and those regions
    /// are dropped instead of emitting dangling image paths.
    fn render_clip(&mut self, _page_index: usize, _clip: &BoundingBox) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Optional OCR collaborator for rasterized text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8], language: &str) -> Result<String>;
}

/// One translation request, borrowed from the owning task.
#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    pub text: &'a str,
    pub target_language: &'a str,
    /// Block type tag ("heading", "paragraph", "table", ...).
    pub item_type: &'a str,
    pub context_before: &'a str,
    pub context_after: &'a str,
    pub model: Option<&'a str>,
}

/// The external machine-translation service.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<String>;

    /// Backend model identifier pinned into cache keys.
    fn model_name(&self) -> &str {
        "default"
    }
}

/// Pass-through backend: returns the source text unchanged.
///
/// Used for structure-only runs and as the CLI default when no endpoint is
/// configured.
#[derive(Debug, Clone, Default)]
pub struct IdentityBackend;

#[async_trait]
impl TranslationBackend for IdentityBackend {
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<String> {
        Ok(request.text.to_string())
    }

    fn model_name(&self) -> &str {
        "identity"
    }
}

/// In-memory source over pre-built pages.
///
/// The unit-test workhorse, and the seam any non-PDF page producer can use.
#[derive(Debug, Default)]
pub struct InMemorySource {
    path: String,
    pages: Vec<PageData>,
}

impl InMemorySource {
    pub fn new(path: impl Into<String>, pages: Vec<PageData>) -> Self {
        InMemorySource {
            path: path.into(),
            pages,
        }
    }
}

impl DocumentSource for InMemorySource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn load_page(&mut self, index: usize) -> Result<PageData> {
        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| crate::error::BabelsbergError::extraction(format!("page index {index} out of range")))
    }

    fn source_path(&self) -> &str {
        &self.path
    }
}
