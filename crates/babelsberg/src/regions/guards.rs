//! Quantitative guards against false-positive regions.
//!
//! Prose enumerations frequently trigger table detection, and text-dense
//! pages trigger visual-area detection. These guards measure the text and
//! reject candidates that read like continuous prose, assessment criteria,
//! or bibliographic matter. `is_mostly_prose` is the single canonical
//! "text-only" test; no other module re-implements it.

use once_cell::sync::Lazy;
use regex::Regex;

/// Evaluation-prose markers that disqualify a table candidate.
const ASSESSMENT_MARKERS: &[&str] = &[
    "first point",
    "second point",
    "third point",
    "assessment criterion",
    "assessment criteria",
    "evaluation criteria",
    "marking scheme",
    "grading rubric",
    "key points",
    "in summary",
];

/// Academic connectives counted by the prose guard.
const CONNECTIVES: &[&str] = &[
    "however",
    "therefore",
    "furthermore",
    "moreover",
    "consequently",
    "nevertheless",
    "additionally",
    "thus",
];

/// ToC / bibliography keywords that mark a page as non-visual.
const TOC_BIBLIO_KEYWORDS: &[&str] = &[
    "table of contents",
    "bibliography",
    "references",
    "works cited",
    "index",
];

/// Strong visual keywords; one explicit reference or two of these validate a page.
const STRONG_VISUAL_KEYWORDS: &[&str] = &["figure", "chart", "diagram", "graph", "plot", "illustration"];

/// Weaker visual vocabulary accepted alongside technical content.
const VISUAL_KEYWORDS: &[&str] = &[
    "figure",
    "fig",
    "chart",
    "diagram",
    "graph",
    "plot",
    "illustration",
    "image",
    "map",
    "schematic",
    "visualization",
];

static NUMBERED_ASSESSMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d{1,2}[.)]\s+[A-Za-z]").expect("Numbered assessment regex is valid and should compile")
});

static FIGURE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(figure|fig\.?|table|chart|diagram|graph)\s+\d+")
        .expect("Figure reference regex is valid and should compile")
});

static SENTENCE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\s+").expect("Sentence split regex is valid and should compile"));

/// Reject a table candidate whose text reads like evaluation prose.
///
/// Fires when the text contains any curated assessment marker, or when at
/// least 30% of its lines look like numbered assessment points.
pub fn is_assessment_prose(text: &str) -> bool {
    let lower = text.to_lowercase();
    if ASSESSMENT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return true;
    }

    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return false;
    }
    let numbered = lines
        .iter()
        .filter(|line| NUMBERED_ASSESSMENT_LINE.is_match(line))
        .count();
    (numbered as f32) / (lines.len() as f32) >= 0.30
}

/// Canonical "text-only" test for visual-area candidates.
///
/// A region's clipped text is mostly continuous prose when any of:
/// - average sentence length > 40 chars AND long-sentence ratio > 0.3 AND
///   at least two paragraph breaks;
/// - at least two academic connectives with more than five sentences;
/// - ToC / bibliography keywords are present.
pub fn is_mostly_prose(text: &str) -> bool {
    let lower = text.to_lowercase();

    if TOC_BIBLIO_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return true;
    }

    let sentences: Vec<&str> = SENTENCE_SPLIT
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let sentence_count = sentences.len();

    let connective_count: usize = CONNECTIVES.iter().map(|c| lower.matches(c).count()).sum();
    if connective_count >= 2 && sentence_count > 5 {
        return true;
    }

    if sentence_count > 0 {
        let avg_len = sentences.iter().map(|s| s.chars().count()).sum::<usize>() as f32 / sentence_count as f32;
        let long_ratio =
            sentences.iter().filter(|s| s.chars().count() > 40).count() as f32 / sentence_count as f32;
        let paragraph_breaks = text.matches("\n\n").count();
        if avg_len > 40.0 && long_ratio > 0.3 && paragraph_breaks >= 2 {
            return true;
        }
    }

    false
}

/// Per-page image-context validation.
///
/// A visual region is kept only when the page's text suggests visual
/// content: an explicit figure/table reference, two strong visual keywords,
/// or technical content alongside at least one visual keyword.
pub fn page_has_image_context(page_text: &str) -> bool {
    if FIGURE_REFERENCE.is_match(page_text) {
        return true;
    }

    let lower = page_text.to_lowercase();
    let strong = STRONG_VISUAL_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .count();
    if strong >= 2 {
        return true;
    }

    let any_visual = VISUAL_KEYWORDS.iter().any(|kw| lower.contains(kw));
    any_visual && has_technical_content(&lower)
}

/// Cheap technical-content test: enough numeric tokens or measurement vocabulary.
fn has_technical_content(lower: &str) -> bool {
    let numeric_tokens = lower
        .split_whitespace()
        .filter(|tok| tok.chars().any(|c| c.is_ascii_digit()))
        .count();
    numeric_tokens >= 3
        || lower.contains("data")
        || lower.contains("measurement")
        || lower.contains("analysis")
        || lower.contains("results")
}
