//! End-to-end pipeline tests over synthetic pages.
//!
//! These build in-memory documents with known structure (headings, body
//! text, a figure with a caption, a table grid, a contents page) and check
//! the invariants the pipeline guarantees: typed classification, unique
//! per-page reading order, region folding, caption linking, ToC
//! reconciliation, and translation with order preservation.

use babelsberg::config::PipelineConfig;
use babelsberg::error::Result;
use babelsberg::pipeline::Pipeline;
use babelsberg::source::{
    ImageObject, InMemorySource, PageData, SpanFlags, TextSpan, TranslationBackend, TranslationRequest,
};
use babelsberg::types::{BlockKind, BoundingBox, SpatialRelationship};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;

struct UppercaseBackend;

#[async_trait]
impl TranslationBackend for UppercaseBackend {
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<String> {
        Ok(request.text.to_uppercase())
    }

    fn model_name(&self) -> &str {
        "uppercase"
    }
}

fn span(text: &str, x: f32, y: f32, size: f32, bold: bool) -> TextSpan {
    TextSpan {
        text: text.to_string(),
        bbox: BoundingBox::new(x, y, x + 440.0, y + size + 2.0),
        font_name: "Times".to_string(),
        font_size: size,
        flags: SpanFlags {
            bold,
            ..Default::default()
        },
        color: 0,
    }
}

fn body(text: &str, y: f32) -> TextSpan {
    span(text, 60.0, y, 12.0, false)
}

/// Page 1: title, section heading, and body text.
fn text_page() -> PageData {
    let mut spans = vec![
        span("Adaptive Extraction", 60.0, 80.0, 22.0, true),
        span("Introduction", 60.0, 140.0, 16.0, true),
    ];
    for i in 0..14 {
        spans.push(body(
            "The analysis of layout requires measured statistics from every page of the document.",
            190.0 + (i as f32) * 22.0,
        ));
    }
    PageData {
        page_number: 1,
        width: PAGE_WIDTH,
        height: PAGE_HEIGHT,
        spans,
        ..Default::default()
    }
}

/// Page 2: a figure with a caption beneath it and surrounding prose.
fn figure_page() -> PageData {
    let image = ImageObject {
        bbox: BoundingBox::new(150.0, 200.0, 450.0, 420.0),
        width: 600,
        height: 440,
        data: vec![0u8; 90 * 1024],
    };
    let spans = vec![
        body("As shown in Figure 1, the measured throughput of 4 nodes increases over 12 runs.", 100.0),
        span("Figure 1: Throughput by node count", 150.0, 430.0, 10.0, false),
        body("Subsequent sections analyze these results in detail.", 500.0),
    ];
    PageData {
        page_number: 2,
        width: PAGE_WIDTH,
        height: PAGE_HEIGHT,
        spans,
        images: vec![image],
        drawing_count: 0,
    }
}

/// Page 3: a 4x3 table grid plus a paragraph.
fn table_page() -> PageData {
    let mut spans = vec![body(
        "The configuration matrix below summarizes every combination we evaluated in depth.",
        80.0,
    )];
    for r in 0..4 {
        for c in 0..3 {
            spans.push(TextSpan {
                text: format!("cell{r}{c}"),
                bbox: BoundingBox::new(
                    60.0 + (c as f32) * 150.0,
                    160.0 + (r as f32) * 24.0,
                    120.0 + (c as f32) * 150.0,
                    174.0 + (r as f32) * 24.0,
                ),
                font_name: "Times".to_string(),
                font_size: 10.0,
                flags: SpanFlags::default(),
                color: 0,
            });
        }
    }
    // Fill the page with prose so the sparse-text visual pass stays quiet.
    for i in 0..10 {
        spans.push(body(
            "Additional observations recorded during the experiment follow in order.",
            300.0 + (i as f32) * 24.0,
        ));
    }
    PageData {
        page_number: 3,
        width: PAGE_WIDTH,
        height: PAGE_HEIGHT,
        spans,
        ..Default::default()
    }
}

/// Page 4: an explicit contents page.
fn toc_page() -> PageData {
    let lines = [
        "Table of Contents",
        "Introduction ........ 1",
        "2.1 Measurements 3",
        "Results ........ 9",
        "Chapter 5: Discussion",
    ];
    let spans = lines
        .iter()
        .enumerate()
        .map(|(i, line)| body(line, 80.0 + (i as f32) * 24.0))
        .collect();
    PageData {
        page_number: 4,
        width: PAGE_WIDTH,
        height: PAGE_HEIGHT,
        spans,
        ..Default::default()
    }
}

fn full_source() -> InMemorySource {
    InMemorySource::new("synthetic.pdf", vec![text_page(), figure_page(), table_page(), toc_page()])
}

fn pipeline_with_output(dir: &tempfile::TempDir) -> (Pipeline, PipelineConfig) {
    let mut config = PipelineConfig::default();
    config.target_language = "de".to_string();
    config.cache.cache_file_path = dir.path().join("translation_cache.json");
    (Pipeline::new(config.clone()).unwrap(), config)
}

#[test]
fn test_extraction_classifies_structure() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with_output(&dir);
    let mut source = full_source();

    let output = pipeline.extract(&mut source, dir.path()).unwrap();
    let document = &output.document;

    assert_eq!(document.total_pages, 4);
    assert_eq!(document.title.as_deref(), Some("Adaptive Extraction"));

    let page1: Vec<_> = document.blocks.iter().filter(|b| b.page_num == 1).collect();
    assert!(matches!(
        &page1[0].kind,
        BlockKind::Heading { level: 1, content } if content == "Adaptive Extraction"
    ));
    assert!(matches!(
        &page1[1].kind,
        BlockKind::Heading { level, content } if *level >= 2 && content == "Introduction"
    ));
    assert!(page1[2..]
        .iter()
        .all(|b| matches!(b.kind, BlockKind::Paragraph { .. })));
}

#[test]
fn test_reading_order_unique_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with_output(&dir);
    let mut source = full_source();

    let output = pipeline.extract(&mut source, dir.path()).unwrap();

    for page in 1..=4u32 {
        let positions: Vec<u32> = output
            .document
            .blocks
            .iter()
            .filter(|b| b.page_num == page)
            .map(|b| b.reading_order_position)
            .collect();
        let unique: HashSet<u32> = positions.iter().copied().collect();
        assert_eq!(unique.len(), positions.len(), "page {page} has duplicate positions");
    }

    // Global order invariant.
    let keys: Vec<(u32, u32)> = output
        .document
        .blocks
        .iter()
        .map(|b| (b.page_num, b.reading_order_position))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);
}

#[test]
fn test_figure_folded_with_caption_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with_output(&dir);
    let mut source = full_source();

    let output = pipeline.extract(&mut source, dir.path()).unwrap();

    let image_block = output
        .document
        .blocks
        .iter()
        .find(|b| matches!(b.kind, BlockKind::ImagePlaceholder { .. }))
        .expect("figure page must yield an image placeholder");

    let BlockKind::ImagePlaceholder {
        image_path,
        caption_block_id,
        spatial_relationship,
        ..
    } = &image_block.kind
    else {
        unreachable!();
    };

    // The written file exists on disk.
    assert!(std::path::Path::new(image_path).is_file(), "missing {image_path}");

    // The caption beneath the image was linked and converted.
    let caption_id = caption_block_id.expect("caption should be linked");
    let caption = output.document.block(caption_id).expect("caption block exists");
    assert!(matches!(
        &caption.kind,
        BlockKind::Caption { target_block_id: Some(target), .. } if *target == image_block.block_id
    ));

    // The image sits above its nearest text; relationship reflects that.
    assert_eq!(*spatial_relationship, SpatialRelationship::Before);
}

#[test]
fn test_table_grid_folds_to_single_table_block() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with_output(&dir);
    let mut source = full_source();

    let output = pipeline.extract(&mut source, dir.path()).unwrap();

    let tables: Vec<_> = output
        .document
        .blocks
        .iter()
        .filter(|b| b.page_num == 3 && matches!(b.kind, BlockKind::Table { .. }))
        .collect();
    assert_eq!(tables.len(), 1);

    let BlockKind::Table {
        markdown_content,
        row_count,
        column_count,
    } = &tables[0].kind
    else {
        unreachable!();
    };
    assert_eq!(*row_count, 4);
    assert_eq!(*column_count, 3);
    assert!(markdown_content.contains("cell00"));
    assert!(markdown_content.contains("| --- |"));

    // The grid cells were consumed; none leak out as paragraphs.
    assert!(!output.document.blocks.iter().any(
        |b| matches!(&b.kind, BlockKind::Paragraph { content } if content.starts_with("cell"))
    ));
}

#[test]
fn test_toc_reconciled_from_page_and_headings() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with_output(&dir);
    let mut source = full_source();

    let output = pipeline.extract(&mut source, dir.path()).unwrap();
    let toc = &output.document.toc;
    assert!(!toc.is_empty());

    // "Introduction" appears on the contents page and as a heading: one entry.
    let intro_count = toc
        .iter()
        .filter(|e| e.title.to_lowercase().contains("introduction"))
        .count();
    assert_eq!(intro_count, 1);

    // Every entry ends up with a page number.
    assert!(toc.iter().all(|e| e.page.is_some()));
}

#[tokio::test]
async fn test_full_run_translates_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with_output(&dir);
    let mut source = full_source();

    let output = pipeline
        .run(&mut source, Arc::new(UppercaseBackend), None, dir.path())
        .await
        .unwrap();

    let heading = output
        .document
        .blocks
        .iter()
        .find(|b| matches!(b.kind, BlockKind::Heading { level: 1, .. }))
        .unwrap();
    assert!(matches!(
        &heading.kind,
        BlockKind::Heading { content, .. } if content == "ADAPTIVE EXTRACTION"
    ));

    assert!(output.stats.api_calls > 0);
    assert_eq!(output.stats.fallback_translations, 0);

    // The metadata sidecar was written alongside the images.
    let sidecar = dir.path().join("visual_processing_metadata.json");
    assert!(sidecar.is_file());
    let parsed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(sidecar).unwrap()).unwrap();
    assert!(parsed["block_counts"]["image_placeholder"].as_u64().unwrap_or(0) >= 1);
}

#[tokio::test]
async fn test_failed_page_becomes_artifact_block() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with_output(&dir);

    // A source whose second page always fails.
    struct FlakySource {
        inner: InMemorySource,
    }
    impl babelsberg::source::DocumentSource for FlakySource {
        fn page_count(&self) -> usize {
            2
        }
        fn load_page(&mut self, index: usize) -> Result<PageData> {
            if index == 1 {
                Err(babelsberg::BabelsbergError::extraction("synthetic page fault"))
            } else {
                self.inner.load_page(index)
            }
        }
        fn source_path(&self) -> &str {
            "flaky.pdf"
        }
    }

    let mut source = FlakySource {
        inner: InMemorySource::new("flaky.pdf", vec![text_page()]),
    };

    let output = pipeline
        .run(&mut source, Arc::new(UppercaseBackend), None, dir.path())
        .await
        .unwrap();

    assert_eq!(output.stats.pages_failed, 1);
    let artifact = output
        .document
        .blocks
        .iter()
        .find(|b| matches!(b.kind, BlockKind::Metadata { .. }))
        .expect("artifact block for the failed page");
    assert!(matches!(
        &artifact.kind,
        BlockKind::Metadata { content, .. } if content.contains("synthetic page fault")
    ));
}

#[tokio::test]
async fn test_empty_document_yields_error_block() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with_output(&dir);
    let mut source = InMemorySource::new("empty.pdf", vec![]);

    let output = pipeline
        .run(&mut source, Arc::new(UppercaseBackend), None, dir.path())
        .await
        .unwrap();

    assert_eq!(output.document.blocks.len(), 1);
    assert!(matches!(output.document.blocks[0].kind, BlockKind::Metadata { .. }));
}

#[tokio::test]
async fn test_repeat_run_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _) = pipeline_with_output(&dir);

    let first = pipeline
        .run(&mut full_source(), Arc::new(UppercaseBackend), None, dir.path())
        .await
        .unwrap();
    assert!(first.stats.api_calls > 0);

    // Same document, fresh run: the persistent cache answers everything.
    let second = pipeline
        .run(&mut full_source(), Arc::new(UppercaseBackend), None, dir.path())
        .await
        .unwrap();
    assert_eq!(second.stats.api_calls, 0);
    assert!(second.stats.cache_hits_persistent > 0);
}
