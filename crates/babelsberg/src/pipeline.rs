//! End-to-end pipeline: pages in, translated document out.
//!
//! Stages run in dataflow order. Document-wide font statistics are computed
//! before any per-page classification; per-page failures become artifact
//! metadata blocks and never abort the run. Extraction is synchronous;
//! translation runs through the bounded-concurrency orchestrator.

use crate::associate::{Association, associate_regions};
use crate::classify::{ContentClassifier, Outcome};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::layout::{assign_reading_order, detect_columns};
use crate::regions::{PageRegions, RegionExtractor};
use crate::source::{DocumentSource, PageData};
use crate::toc;
use crate::types::{
    BlockKind, BoundingBox, ContentBlock, Document, Formatting, MetadataKind, Region, RegionKind, TocEntry,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(feature = "tokio-runtime")]
use crate::cache::TwoTierCache;
#[cfg(feature = "tokio-runtime")]
use crate::source::{OcrEngine, TranslationBackend};
#[cfg(feature = "tokio-runtime")]
use crate::translate::TranslationOrchestrator;
#[cfg(feature = "tokio-runtime")]
use crate::types::TranslationTask;
#[cfg(feature = "tokio-runtime")]
use std::sync::Arc;

/// Fraction of a span covered by a region for the span to be consumed by it.
const SPAN_CONSUMED_OVERLAP: f32 = 0.5;

/// Maximum context length attached to translation tasks.
const TASK_CONTEXT_CHARS: usize = 200;

/// Aggregate diagnostics for one run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunStats {
    pub pages_total: u32,
    pub pages_failed: u32,
    pub blocks_total: usize,
    pub regions_kept: usize,
    pub regions_filtered: usize,
    pub spans_filtered: usize,
    pub api_calls: u64,
    pub cache_hits_memory: u64,
    pub cache_hits_persistent: u64,
    pub translation_errors: u64,
    pub fallback_translations: usize,
}

/// Extraction output: the untranslated document plus diagnostics.
#[derive(Debug)]
pub struct ExtractionOutput {
    pub document: Document,
    pub stats: RunStats,
}

/// Full pipeline output after translation.
#[derive(Debug)]
pub struct PipelineOutput {
    pub document: Document,
    pub stats: RunStats,
}

/// Staged extraction-and-translation pipeline.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extract the structured document without translating.
    ///
    /// Image files for surviving regions are written under
    /// `<output_dir>/images/`.
    pub fn extract(&self, source: &mut dyn DocumentSource, output_dir: &Path) -> Result<ExtractionOutput> {
        let image_dir = output_dir.join("images");
        std::fs::create_dir_all(&image_dir)?;

        let mut stats = RunStats::default();
        let page_count = source.page_count();
        stats.pages_total = page_count as u32;

        // Load all pages first: the font statistics must see the whole
        // document before any page is classified.
        let mut pages: Vec<PageData> = Vec::with_capacity(page_count);
        let mut failed_pages: Vec<(u32, String)> = Vec::new();
        for index in 0..page_count {
            match source.load_page(index) {
                Ok(page) => pages.push(page),
                Err(e) => {
                    warn!(page = index + 1, error = %e, "page extraction failed");
                    failed_pages.push(((index + 1) as u32, e.to_string()));
                    stats.pages_failed += 1;
                }
            }
        }

        let mut analysis = crate::layout::analyze_document(&pages);
        for page in &pages {
            let bboxes: Vec<BoundingBox> = page.spans.iter().map(|s| s.bbox).collect();
            analysis
                .columns_per_page
                .insert(page.page_number, detect_columns(&bboxes).len());
        }
        debug!(
            body_size = analysis.dominant_font_size,
            bands = analysis.size_bands.len(),
            "document structure analysis complete"
        );

        let classifier = ContentClassifier::new(&analysis, &self.config.classifier);
        let mut region_extractor = RegionExtractor::new(self.config.regions.clone());

        let mut document = Document {
            title: None,
            source_path: source.source_path().to_string(),
            total_pages: page_count as u32,
            blocks: Vec::new(),
            toc: Vec::new(),
        };
        let mut next_block_id: u64 = 0;
        let mut toc_page_entries: Vec<TocEntry> = Vec::new();

        for page in &pages {
            let page_text = page.full_text();
            if toc::is_toc_page(&page_text) {
                toc_page_entries.extend(toc::extract_page_entries(&page_text));
            }

            let page_regions = region_extractor.extract_page(page);
            stats.regions_filtered += page_regions.filtered_count;

            let blocks = self.build_page_blocks(
                source,
                page,
                &classifier,
                page_regions,
                &image_dir,
                &mut next_block_id,
                &mut stats,
            )?;
            document.blocks.extend(blocks);
        }

        for (page_num, error) in failed_pages {
            document.blocks.push(ContentBlock {
                block_id: next_block_id,
                page_num,
                block_num: 0,
                bbox: BoundingBox::default(),
                formatting: Formatting::default(),
                reading_order_position: 0,
                kind: BlockKind::Metadata {
                    content: format!("page {page_num} extraction failed: {error}"),
                    metadata_type: MetadataKind::Artifact,
                },
            });
            next_block_id += 1;
        }

        if document.blocks.is_empty() {
            document.blocks.push(ContentBlock {
                block_id: next_block_id,
                page_num: 1,
                block_num: 0,
                bbox: BoundingBox::default(),
                formatting: Formatting::default(),
                reading_order_position: 0,
                kind: BlockKind::Metadata {
                    content: "document produced no content blocks".to_string(),
                    metadata_type: MetadataKind::Artifact,
                },
            });
        }

        document.sort_blocks();
        document.title = extract_title(&document);

        let mut entries = toc_page_entries;
        entries.extend(toc::entries_from_headings(&document.blocks));
        document.toc = toc::reconcile(entries);

        stats.blocks_total = document.blocks.len();
        info!(
            pages = stats.pages_total,
            blocks = stats.blocks_total,
            regions = stats.regions_kept,
            toc_entries = document.toc.len(),
            "extraction complete"
        );

        Ok(ExtractionOutput { document, stats })
    }

    /// Build the ordered block list for one page.
    #[allow(clippy::too_many_arguments)]
    fn build_page_blocks(
        &self,
        source: &mut dyn DocumentSource,
        page: &PageData,
        classifier: &ContentClassifier<'_>,
        page_regions: PageRegions,
        image_dir: &Path,
        next_block_id: &mut u64,
        stats: &mut RunStats,
    ) -> Result<Vec<ContentBlock>> {
        let mut regions = page_regions.regions;

        // Spans inside detected tables or equations are consumed by the
        // folded block; classifying them too would duplicate content.
        let consuming: Vec<BoundingBox> = regions
            .iter()
            .filter(|r| matches!(r.kind, RegionKind::DetectedTable | RegionKind::DetectedEquation))
            .map(|r| r.bbox)
            .collect();

        let mut spans_with_nums: Vec<(u32, &crate::source::TextSpan)> = Vec::new();
        for (block_num, span) in page.spans.iter().enumerate() {
            let consumed = consuming
                .iter()
                .any(|region| span.bbox.intersection_ratio(region) > SPAN_CONSUMED_OVERLAP);
            if !consumed {
                spans_with_nums.push((block_num as u32, span));
            }
        }

        // Classify the surviving spans.
        let mut text_blocks: Vec<ContentBlock> = Vec::new();
        for (block_num, span) in spans_with_nums {
            match classifier.classify(span, page.height) {
                Outcome::Filtered(_) => stats.spans_filtered += 1,
                Outcome::Block(kind) => {
                    text_blocks.push(ContentBlock {
                        block_id: 0, // assigned after ordering
                        page_num: page.page_number,
                        block_num,
                        bbox: span.bbox,
                        formatting: Formatting {
                            font_name: span.font_name.clone(),
                            font_size: span.font_size,
                            is_bold: span.flags.bold,
                            is_italic: span.flags.italic,
                            color: span.color,
                            flags: span.flags.raw,
                        },
                        reading_order_position: 0,
                        kind,
                    });
                }
            }
        }

        // Spatial reading order over the classified text blocks.
        let bboxes: Vec<BoundingBox> = text_blocks.iter().map(|b| b.bbox).collect();
        let positions = assign_reading_order(&bboxes);
        for (block, position) in text_blocks.iter_mut().zip(positions) {
            block.reading_order_position = position;
        }
        text_blocks.sort_by_key(|b| b.reading_order_position);
        for block in &mut text_blocks {
            block.block_id = *next_block_id;
            *next_block_id += 1;
        }

        // Render visual areas through the source; undrawable ones are dropped
        // rather than emitting dangling image paths.
        let mut drop_ids: Vec<u64> = Vec::new();
        for region in &mut regions {
            if region.kind == RegionKind::VisualArea && region.data.is_none() {
                match source.render_clip((page.page_number - 1) as usize, &region.bbox) {
                    Ok(Some(bytes)) => {
                        region.file_size = bytes.len();
                        region.data = Some(bytes);
                    }
                    Ok(None) => drop_ids.push(region.region_id),
                    Err(e) => {
                        warn!(region = region.region_id, error = %e, "visual area render failed");
                        drop_ids.push(region.region_id);
                    }
                }
            }
        }
        if !drop_ids.is_empty() {
            stats.regions_filtered += drop_ids.len();
            regions.retain(|r| !drop_ids.contains(&r.region_id));
        }

        stats.regions_kept += regions.len();

        // Associate regions with the ordered text blocks.
        let mut associations = associate_regions(&regions, &text_blocks, &self.config.association);
        if !self.config.regions.extract_figures_by_caption {
            for association in &mut associations {
                association.caption_index = None;
            }
        }

        let mut region_blocks: Vec<(u32, ContentBlock)> = Vec::new();
        for (region_index, region) in regions.iter_mut().enumerate() {
            let association = &associations[region_index];
            let block = self.fold_region(page, region, association, &text_blocks, image_dir, next_block_id)?;
            if let Some(block) = block {
                region_blocks.push((association.insert_position, block));
            }
        }

        // Caption linking: the caption block learns its target; link back
        // happens inside fold_region via the association.
        for (_, region_block) in &region_blocks {
            if let BlockKind::ImagePlaceholder {
                caption_block_id: Some(caption_id),
                ..
            } = &region_block.kind
            {
                if let Some(caption) = text_blocks.iter_mut().find(|b| b.block_id == *caption_id) {
                    if let BlockKind::Caption { target_block_id, .. } = &mut caption.kind {
                        *target_block_id = Some(region_block.block_id);
                    } else if let BlockKind::Paragraph { content } = &caption.kind.clone() {
                        caption.kind = BlockKind::Caption {
                            content: content.clone(),
                            target_block_id: Some(region_block.block_id),
                        };
                    }
                }
            }
        }

        // Interleave: text blocks keep their order; a region block lands
        // just ahead of the text block at its insertion position ("before"
        // regions precede their text, "after" regions precede the next
        // block). Positions are then renumbered densely.
        let mut keyed: Vec<((u32, u8), ContentBlock)> = text_blocks
            .into_iter()
            .map(|b| ((b.reading_order_position, 1u8), b))
            .collect();
        keyed.extend(region_blocks.into_iter().map(|(pos, b)| ((pos, 0u8), b)));
        keyed.sort_by_key(|(key, _)| *key);

        let mut blocks: Vec<ContentBlock> = Vec::with_capacity(keyed.len());
        for (position, (_, mut block)) in keyed.into_iter().enumerate() {
            block.reading_order_position = position as u32;
            blocks.push(block);
        }

        Ok(blocks)
    }

    /// Fold one surviving region into a content block.
    fn fold_region(
        &self,
        page: &PageData,
        region: &mut Region,
        association: &Association,
        text_blocks: &[ContentBlock],
        image_dir: &Path,
        next_block_id: &mut u64,
    ) -> Result<Option<ContentBlock>> {
        let kind = match region.kind {
            RegionKind::DetectedTable => {
                let markdown = region.extracted_text.clone().unwrap_or_default();
                let (rows, cols) = markdown_table_shape(&markdown);
                BlockKind::Table {
                    markdown_content: markdown,
                    row_count: rows,
                    column_count: cols,
                }
            }
            RegionKind::DetectedEquation => BlockKind::Equation {
                content: region.extracted_text.clone().unwrap_or_default(),
            },
            RegionKind::RasterImage | RegionKind::VisualArea => {
                let Some(data) = region.data.take() else {
                    return Ok(None);
                };
                let file_name = format!(
                    "page_{}_{}_{}.png",
                    page.page_number,
                    region.kind.as_str(),
                    region.region_id
                );
                let path: PathBuf = image_dir.join(&file_name);
                std::fs::write(&path, &data)?;
                region.source_path = path.to_string_lossy().to_string();
                region.file_size = data.len();

                let caption_block_id = association
                    .caption_index
                    .and_then(|idx| text_blocks.get(idx))
                    .map(|b| b.block_id);

                BlockKind::ImagePlaceholder {
                    image_path: region.source_path.clone(),
                    width: region.bbox.width(),
                    height: region.bbox.height(),
                    ocr_text: region.ocr_text.clone(),
                    caption_block_id,
                    spatial_relationship: association.relationship,
                    translation_needed: region.ocr_text.as_deref().is_some_and(|t| !t.trim().is_empty()),
                }
            }
        };

        let block = ContentBlock {
            block_id: *next_block_id,
            page_num: page.page_number,
            block_num: 0,
            bbox: region.bbox,
            formatting: Formatting::default(),
            reading_order_position: association.insert_position,
            kind,
        };
        *next_block_id += 1;
        Ok(Some(block))
    }
}

#[cfg(feature = "tokio-runtime")]
impl Pipeline {
    /// Run the full pipeline: extract, OCR, translate, and write the
    /// metadata sidecar.
    pub async fn run(
        &self,
        source: &mut dyn DocumentSource,
        backend: Arc<dyn TranslationBackend>,
        ocr: Option<Arc<dyn OcrEngine>>,
        output_dir: &Path,
    ) -> Result<PipelineOutput> {
        let ExtractionOutput {
            mut document,
            mut stats,
        } = self.extract(source, output_dir)?;

        if let Some(engine) = ocr {
            self.run_ocr(&mut document, engine).await;
        }

        let cache = Arc::new(TwoTierCache::from_config(&self.config.cache));
        let orchestrator = TranslationOrchestrator::new(
            backend,
            Arc::clone(&cache),
            self.config.translation.clone(),
            self.config.model_name.clone(),
        );

        let (task_indices, tasks) = self.build_tasks(&document);
        info!(tasks = tasks.len(), "translating document blocks");
        let outcomes = orchestrator.translate_batch(tasks).await;

        for (block_index, outcome) in task_indices.into_iter().zip(outcomes) {
            if outcome.fell_back {
                stats.fallback_translations += 1;
            }
            document.blocks[block_index].kind.set_translated_text(outcome.text);
        }

        let cache_stats = cache.stats();
        let orchestrator_stats = orchestrator.stats();
        stats.api_calls = orchestrator_stats.api_calls;
        stats.translation_errors = orchestrator_stats.translation_errors + orchestrator_stats.timeouts;
        stats.cache_hits_memory = cache_stats.hits_memory;
        stats.cache_hits_persistent = cache_stats.hits_persistent + cache_stats.hits_fuzzy;

        if let Err(e) = cache.save() {
            warn!(error = %e, "persistent cache save failed, continuing");
        }

        if let Err(e) = write_sidecar(&document, &stats, output_dir) {
            warn!(error = %e, "metadata sidecar write failed, continuing");
        }

        Ok(PipelineOutput { document, stats })
    }

    /// OCR pass over image placeholders that still lack text.
    async fn run_ocr(&self, document: &mut Document, engine: Arc<dyn OcrEngine>) {
        for block in &mut document.blocks {
            let BlockKind::ImagePlaceholder {
                image_path,
                ocr_text,
                translation_needed,
                ..
            } = &mut block.kind
            else {
                continue;
            };
            if ocr_text.is_some() {
                continue;
            }
            let Ok(bytes) = std::fs::read(image_path.as_str()) else {
                continue;
            };
            match engine.recognize(&bytes, &self.config.ocr_language).await {
                Ok(text) if !text.trim().is_empty() => {
                    *ocr_text = Some(text);
                    *translation_needed = true;
                }
                Ok(_) => {}
                Err(e) => {
                    // OCR failures leave ocr_text empty.
                    debug!(path = %image_path, error = %e, "ocr failed");
                }
            }
        }
    }

    /// Build translation tasks for every translatable block, with context
    /// windows from the neighboring blocks.
    fn build_tasks(&self, document: &Document) -> (Vec<usize>, Vec<TranslationTask>) {
        let mut indices = Vec::new();
        let mut tasks = Vec::new();

        for (index, block) in document.blocks.iter().enumerate() {
            let Some(text) = block.kind.translatable_text() else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }

            let context_before = index
                .checked_sub(1)
                .and_then(|i| document.blocks[i].kind.translatable_text())
                .map(|t| tail_chars(t, TASK_CONTEXT_CHARS))
                .unwrap_or_default();
            let context_after = document
                .blocks
                .get(index + 1)
                .and_then(|b| b.kind.translatable_text())
                .map(|t| head_chars(t, TASK_CONTEXT_CHARS))
                .unwrap_or_default();

            let priority = match &block.kind {
                BlockKind::Heading { .. } | BlockKind::Caption { .. } => 1,
                BlockKind::Paragraph { .. } | BlockKind::ListItem { .. } => 2,
                _ => 3,
            };

            tasks.push(
                TranslationTask::new(text, self.config.target_language.clone())
                    .with_item_type(block.kind.type_name())
                    .with_priority(priority)
                    .with_context(context_before, context_after),
            );
            indices.push(index);
        }

        (indices, tasks)
    }
}

/// First heading in reading order becomes the document title.
fn extract_title(document: &Document) -> Option<String> {
    let mut best: Option<(u8, &str)> = None;
    for block in &document.blocks {
        if let BlockKind::Heading { level, content } = &block.kind {
            match best {
                Some((best_level, _)) if *level >= best_level => {}
                _ => best = Some((*level, content.as_str())),
            }
            if *level == 1 {
                break;
            }
        }
    }
    best.map(|(_, title)| title.to_string())
}

/// Row and column counts of a pipe-markdown table.
fn markdown_table_shape(markdown: &str) -> (usize, usize) {
    let mut rows = 0usize;
    let mut cols = 0usize;
    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.chars().all(|c| matches!(c, '|' | '-' | ' ' | ':')) {
            continue; // separator row
        }
        rows += 1;
        cols = cols.max(trimmed.split('|').filter(|c| !c.trim().is_empty()).count());
    }
    (rows, cols)
}

fn tail_chars(text: &str, limit: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(limit);
    chars[start..].iter().collect()
}

fn head_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Write the `visual_processing_metadata.json` sidecar.
fn write_sidecar(document: &Document, stats: &RunStats, output_dir: &Path) -> Result<()> {
    use serde_json::json;

    let mut kind_counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    let mut placeholder_map = serde_json::Map::new();
    for block in &document.blocks {
        if let BlockKind::ImagePlaceholder { image_path, .. } = &block.kind {
            *kind_counts.entry("image_placeholder").or_default() += 1;
            placeholder_map.insert(block.block_id.to_string(), json!(image_path));
        }
        if let BlockKind::Table { .. } = &block.kind {
            *kind_counts.entry("table").or_default() += 1;
        }
        if let BlockKind::Equation { .. } = &block.kind {
            *kind_counts.entry("equation").or_default() += 1;
        }
    }

    let sidecar = json!({
        "source": document.source_path,
        "total_pages": document.total_pages,
        "block_counts": kind_counts,
        "placeholders": placeholder_map,
        "stats": stats,
    });

    let path = output_dir.join("visual_processing_metadata.json");
    std::fs::write(path, serde_json::to_string_pretty(&sidecar)?)?;
    Ok(())
}
