//! Content classification: text runs to typed blocks.
//!
//! Headings are scored with a weighted multi-signal model against the
//! document's own font statistics; everything that is not a heading, list
//! item, table row, code line, equation, or artifact falls through to a
//! paragraph. The length guard is absolute: long runs are never headings
//! no matter how they score.

pub mod filters;
pub mod patterns;

pub use filters::{FilterReason, filter_span};

use crate::config::ClassifierConfig;
use crate::layout::StructureAnalysis;
use crate::source::TextSpan;
use crate::types::{BlockKind, MarkerStyle, MetadataKind};

/// Hard ceilings for heading classification; beyond either, a run is forced
/// to be a paragraph regardless of score. Lowered from 100 to 90 for more
/// conservative heading detection.
const HEADING_MAX_CHARS: usize = 90;

/// Result of classifying one text run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Block(BlockKind),
    Filtered(FilterReason),
}

/// Multi-signal classifier bound to one document's font statistics.
pub struct ContentClassifier<'a> {
    analysis: &'a StructureAnalysis,
    config: &'a ClassifierConfig,
}

impl<'a> ContentClassifier<'a> {
    pub fn new(analysis: &'a StructureAnalysis, config: &'a ClassifierConfig) -> Self {
        ContentClassifier { analysis, config }
    }

    /// Classify one span into a typed block, or filter it out.
    pub fn classify(&self, span: &TextSpan, page_height: f32) -> Outcome {
        if let Some(reason) = filter_span(span, page_height) {
            return Outcome::Filtered(reason);
        }

        let text = span.text.trim();

        if patterns::ARTIFACT.is_match(text) {
            return Outcome::Block(BlockKind::Metadata {
                content: text.to_string(),
                metadata_type: MetadataKind::Artifact,
            });
        }

        let is_heading = self.could_be_heading(span, text)
            && self.heading_score(span, text) >= self.config.heading_score_threshold;

        // Numbered headings ("1. Introduction") also match list patterns;
        // strong heading signals win that conflict.
        if !is_heading && let Some(marker) = list_marker(text) {
            return Outcome::Block(BlockKind::ListItem {
                content: text.to_string(),
                marker_style: marker,
            });
        }

        if patterns::CODE_LINE.is_match(&span.text) || span.flags.monospace {
            return Outcome::Block(BlockKind::CodeBlock {
                content: span.text.clone(),
            });
        }

        if patterns::is_equation_like(text) && !is_heading {
            return Outcome::Block(BlockKind::Equation {
                content: text.to_string(),
            });
        }

        if patterns::TABLE_ROW.is_match(text) {
            let column_count = text.split('|').filter(|c| !c.trim().is_empty()).count();
            return Outcome::Block(BlockKind::Table {
                markdown_content: text.to_string(),
                row_count: 1,
                column_count,
            });
        }

        if is_heading {
            let level = self.heading_level(span.font_size);
            return Outcome::Block(BlockKind::Heading {
                level,
                content: text.to_string(),
            });
        }

        Outcome::Block(BlockKind::Paragraph {
            content: text.to_string(),
        })
    }

    /// Length guard: long runs can never be headings.
    fn could_be_heading(&self, _span: &TextSpan, text: &str) -> bool {
        let word_count = text.split_whitespace().count();
        word_count <= self.config.heading_max_words && text.chars().count() <= HEADING_MAX_CHARS
    }

    /// Weighted heading score in [0, 1].
    ///
    /// Signals and weights:
    /// - size z-score vs body (0.40)
    /// - bold (0.30) or italic alone (0.10)
    /// - font family differs from body (0.10)
    /// - shortness (0.20 band)
    /// - heading-shaped pattern (0.10)
    /// - section-start keyword (0.10)
    pub fn heading_score(&self, span: &TextSpan, text: &str) -> f64 {
        let mut score = 0.0f64;

        let z = self.analysis.z_score(span.font_size) as f64;
        if z > 2.0 {
            score += 0.40;
        } else if z > 1.5 {
            score += 0.30;
        } else if z > 1.0 {
            score += 0.20;
        }

        if span.flags.bold {
            score += 0.30;
        } else if span.flags.italic {
            score += 0.10;
        }

        if !span.font_name.is_empty()
            && !self.analysis.body_font_name.is_empty()
            && span.font_name != self.analysis.body_font_name
        {
            score += 0.10;
        }

        let chars = text.chars().count();
        if chars <= 50 {
            score += 0.10;
        } else if chars <= 100 {
            score += 0.05;
        }

        if patterns::matches_heading_pattern(text) {
            score += 0.10;
        }

        if patterns::starts_section(text) {
            score += 0.10;
        }

        score.min(1.0)
    }

    /// Heading level: size band wins when within half a point, otherwise the
    /// z-score estimate capped to 1..=6.
    fn heading_level(&self, font_size: f32) -> u8 {
        self.analysis
            .heading_level_for_size(font_size)
            .unwrap_or_else(|| self.analysis.estimate_level_from_z(font_size))
    }
}

fn list_marker(text: &str) -> Option<MarkerStyle> {
    if patterns::BULLET_ITEM.is_match(text) {
        Some(MarkerStyle::Bullet)
    } else if patterns::NUMBERED_ITEM.is_match(text) {
        Some(MarkerStyle::Numbered)
    } else if patterns::LETTERED_ITEM.is_match(text) {
        Some(MarkerStyle::Lettered)
    } else {
        None
    }
}
