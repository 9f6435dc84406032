//! pdfium-render adapter implementing `DocumentSource`.
//!
//! Characters come out of pdfium with bottom-left-origin geometry and
//! per-char font metrics; this adapter flips them to the pipeline's
//! top-left origin and merges them into line-level spans. Embedded images
//! are re-encoded as PNG, and visual-area clips are produced by rendering
//! the page and cropping.
//!
//! Requires the `pdf` feature.

use crate::error::{BabelsbergError, Result};
use crate::source::{DocumentSource, ImageObject, PageData, SpanFlags, TextSpan};
use crate::types::BoundingBox;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;

/// Fallback font size when pdfium reports none.
const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Horizontal gap (in multiples of the font size) that splits two chars
/// into separate spans.
const SPAN_GAP_FACTOR: f32 = 1.5;

/// Render scale for visual-area clips (2x the 72 dpi page space).
const CLIP_RENDER_SCALE: f32 = 2.0;

/// One extracted character with normalized geometry.
struct CharData {
    ch: char,
    bbox: BoundingBox,
    font_size: f32,
}

/// `DocumentSource` backed by a pdfium-rendered PDF file.
///
/// The document is reopened per page load; pdfium's internal caching makes
/// repeat loads cheap, and it keeps this type free of self-referential
/// lifetimes.
pub struct PdfiumSource {
    pdfium: Pdfium,
    path: PathBuf,
    path_display: String,
    page_count: usize,
}

impl PdfiumSource {
    /// Bind pdfium and open the document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| BabelsbergError::extraction(format!("failed to bind pdfium: {e:?}")))?;
        let pdfium = Pdfium::new(bindings);

        let page_count = {
            let document = pdfium
                .load_pdf_from_file(&path, None)
                .map_err(|e| BabelsbergError::extraction(format!("failed to open PDF: {e:?}")))?;
            document.pages().len() as usize
        };

        let path_display = path.to_string_lossy().to_string();
        Ok(PdfiumSource {
            pdfium,
            path,
            path_display,
            page_count,
        })
    }

    fn load_document(&self) -> Result<PdfDocument<'_>> {
        self.pdfium
            .load_pdf_from_file(&self.path, None)
            .map_err(|e| BabelsbergError::extraction(format!("failed to reopen PDF: {e:?}")))
    }
}

impl DocumentSource for PdfiumSource {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn source_path(&self) -> &str {
        &self.path_display
    }

    fn load_page(&mut self, index: usize) -> Result<PageData> {
        let document = self.load_document()?;
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| BabelsbergError::extraction(format!("page {index} unavailable: {e:?}")))?;

        let page_width = page.width().value;
        let page_height = page.height().value;

        let chars = extract_chars(&page, page_height)?;
        let spans = merge_chars_into_spans(chars);
        let (images, drawing_count) = extract_objects(&page, page_height);

        Ok(PageData {
            page_number: (index + 1) as u32,
            width: page_width,
            height: page_height,
            spans,
            images,
            drawing_count,
        })
    }

    fn render_clip(&mut self, page_index: usize, clip: &BoundingBox) -> Result<Option<Vec<u8>>> {
        let document = self.load_document()?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|e| BabelsbergError::extraction(format!("page {page_index} unavailable: {e:?}")))?;

        let pixel_width = (page.width().value * CLIP_RENDER_SCALE) as i32;
        let pixel_height = (page.height().value * CLIP_RENDER_SCALE) as i32;

        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(pixel_width)
                    .set_target_height(pixel_height),
            )
            .map_err(|e| BabelsbergError::extraction(format!("page render failed: {e:?}")))?;
        let rendered = bitmap.as_image();

        let x = (clip.x0.max(0.0) * CLIP_RENDER_SCALE) as u32;
        let y = (clip.y0.max(0.0) * CLIP_RENDER_SCALE) as u32;
        let width = (clip.width().max(1.0) * CLIP_RENDER_SCALE) as u32;
        let height = (clip.height().max(1.0) * CLIP_RENDER_SCALE) as u32;
        let cropped = rendered.crop_imm(
            x.min(rendered.width().saturating_sub(1)),
            y.min(rendered.height().saturating_sub(1)),
            width.min(rendered.width()),
            height.min(rendered.height()),
        );

        let mut buffer = Vec::new();
        cropped
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| BabelsbergError::extraction(format!("clip encode failed: {e}")))?;
        Ok(Some(buffer))
    }
}

/// Extract characters with font metrics, flipping to a top-left origin.
fn extract_chars(page: &PdfPage<'_>, page_height: f32) -> Result<Vec<CharData>> {
    let text = page
        .text()
        .map_err(|e| BabelsbergError::extraction(format!("page text unavailable: {e:?}")))?;

    let chars = text.chars();
    let char_count = chars.len();
    let mut out = Vec::with_capacity(char_count);

    for i in 0..char_count {
        let Ok(pdf_char) = chars.get(i) else {
            continue;
        };
        let Some(ch) = pdf_char.unicode_char() else {
            continue;
        };
        let Ok(bounds) = pdf_char.loose_bounds() else {
            continue;
        };

        let font_size = pdf_char.unscaled_font_size().value;
        let font_size = if font_size > 0.0 { font_size } else { DEFAULT_FONT_SIZE };

        // pdfium's origin is bottom-left; the pipeline's is top-left.
        out.push(CharData {
            ch,
            bbox: BoundingBox::new(
                bounds.left().value,
                page_height - bounds.top().value,
                bounds.right().value,
                page_height - bounds.bottom().value,
            ),
            font_size,
        });
    }

    Ok(out)
}

/// Merge characters into line-level spans.
///
/// Characters are sorted into vertical bands, then split on horizontal
/// gaps wider than `SPAN_GAP_FACTOR` font sizes. Whitespace-only spans are
/// dropped.
fn merge_chars_into_spans(mut chars: Vec<CharData>) -> Vec<TextSpan> {
    if chars.is_empty() {
        return Vec::new();
    }

    chars.sort_by(|a, b| {
        a.bbox
            .y0
            .partial_cmp(&b.bbox.y0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut spans: Vec<TextSpan> = Vec::new();
    let mut current_text = String::new();
    let mut current_bbox: Option<BoundingBox> = None;
    let mut current_size = 0.0f32;
    let mut count = 0usize;
    let mut last_char_bbox: Option<BoundingBox> = None;

    let mut flush = |text: &mut String, bbox: &mut Option<BoundingBox>, size: &mut f32, n: &mut usize| {
        if let Some(b) = bbox.take() {
            let trimmed = text.trim();
            if !trimmed.is_empty() && *n > 0 {
                spans.push(TextSpan {
                    text: trimmed.to_string(),
                    bbox: b,
                    font_name: String::new(),
                    font_size: *size / *n as f32,
                    flags: SpanFlags::default(),
                    color: 0,
                });
            }
        }
        text.clear();
        *size = 0.0;
        *n = 0;
    };

    for char_data in chars {
        let start_new = match (&current_bbox, &last_char_bbox) {
            (Some(span_bbox), Some(last)) => {
                let line_height = span_bbox.height().max(char_data.bbox.height()).max(1.0);
                let vertical_jump = (char_data.bbox.y0 - span_bbox.y0).abs() > line_height * 0.6;
                let gap = char_data.bbox.x0 - last.x1;
                let horizontal_jump = gap > char_data.font_size.max(1.0) * SPAN_GAP_FACTOR;
                vertical_jump || horizontal_jump
            }
            _ => false,
        };

        if start_new {
            flush(&mut current_text, &mut current_bbox, &mut current_size, &mut count);
        }

        current_text.push(char_data.ch);
        current_bbox = Some(match current_bbox {
            Some(b) => b.merge(&char_data.bbox),
            None => char_data.bbox,
        });
        current_size += char_data.font_size;
        count += 1;
        last_char_bbox = Some(char_data.bbox);
    }
    flush(&mut current_text, &mut current_bbox, &mut current_size, &mut count);

    spans
}

/// Collect embedded raster images (re-encoded as PNG) and count vector
/// drawings.
fn extract_objects(page: &PdfPage<'_>, page_height: f32) -> (Vec<ImageObject>, usize) {
    let mut images = Vec::new();
    let mut drawing_count = 0usize;

    for object in page.objects().iter() {
        match &object {
            PdfPageObject::Path(_) => drawing_count += 1,
            PdfPageObject::Image(image_object) => {
                let Ok(bounds) = object.bounds() else {
                    continue;
                };
                let Ok(raw) = image_object.get_raw_image() else {
                    continue;
                };

                let mut buffer = Vec::new();
                if raw.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png).is_err() {
                    continue;
                }

                images.push(ImageObject {
                    bbox: BoundingBox::new(
                        bounds.left().value,
                        page_height - bounds.top().value,
                        bounds.right().value,
                        page_height - bounds.bottom().value,
                    ),
                    width: raw.width(),
                    height: raw.height(),
                    data: buffer,
                });
            }
            _ => {}
        }
    }

    (images, drawing_count)
}
