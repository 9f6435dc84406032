//! Pre-classification filtering of non-content runs.
//!
//! Page furniture never becomes a content block: standalone page numbers,
//! running headers, and boilerplate footers are suppressed before scoring.
//! The position tests use fractions of the page height, so the same rules
//! hold across page sizes.

use super::patterns::{CHAPTER_PREFIX, FOOTER_NOISE, STANDALONE_NUMBER};
use crate::source::TextSpan;

/// Fraction of the page height treated as the header / footer margin.
const EDGE_BAND: f32 = 0.10;

/// Minimum text length (chars, trimmed) worth keeping.
const MIN_TEXT_LEN: usize = 3;

/// Why a run was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    PageNumber,
    RunningHeader,
    Footer,
    TooShort,
}

/// Check whether a span should be suppressed instead of classified.
///
/// Returns `None` when the span must continue into classification.
pub fn filter_span(span: &TextSpan, page_height: f32) -> Option<FilterReason> {
    let text = span.text.trim();

    let top_limit = page_height * EDGE_BAND;
    let bottom_limit = page_height * (1.0 - EDGE_BAND);
    let in_top_band = span.bbox.y1 <= top_limit;
    let in_bottom_band = span.bbox.y0 >= bottom_limit;

    if (in_top_band || in_bottom_band) && STANDALONE_NUMBER.is_match(text) {
        return Some(FilterReason::PageNumber);
    }

    if in_top_band && CHAPTER_PREFIX.is_match(text) {
        return Some(FilterReason::RunningHeader);
    }

    if in_bottom_band && FOOTER_NOISE.is_match(text) {
        return Some(FilterReason::Footer);
    }

    if text.chars().count() < MIN_TEXT_LEN {
        return Some(FilterReason::TooShort);
    }

    None
}
