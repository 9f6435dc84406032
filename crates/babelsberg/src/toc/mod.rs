//! Table-of-contents extraction and reconciliation.
//!
//! Two passes feed the reconciler: explicit ToC pages parsed line by line,
//! and the document's classified heading structure. Reconciliation
//! normalizes titles, collapses canonical section synonyms, deduplicates by
//! substring containment, and fills missing page numbers with a running
//! counter. Running the reconciler twice over the same input yields the
//! same entries.

use crate::types::{BlockKind, ContentBlock, TocEntry, TocSource};
use once_cell::sync::Lazy;
use regex::Regex;

/// Score at or above which a page is treated as an explicit ToC page.
const TOC_PAGE_SCORE: i32 = 5;

/// Title length cap (words) applied during normalization.
const MAX_TITLE_WORDS: usize = 16;

/// Canonical section names that absorb their variants during dedup.
const CANONICAL_HEADINGS: &[&str] = &["introduction", "background", "methods", "history", "results"];

static TOC_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(table of contents|contents|index of contents)\s*$")
        .expect("ToC title regex is valid and should compile")
});

static DOTTED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\.{3,}\s*(\d+)$").expect("Dotted line regex is valid and should compile"));

static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)*)\s+(.+?)\s+(\d+)$").expect("Numbered line regex is valid and should compile")
});

static CHAPTER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:chapter|section)\s+(\d+):\s*(.+)$").expect("Chapter line regex is valid and should compile")
});

static TRAILING_PAGE_NUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s\d{1,4}$").expect("Trailing page number regex is valid and should compile"));

static TRAILING_DOT_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\s*\d{1,4}$").expect("Trailing dot-page regex is valid and should compile"));

const TOC_KEYWORDS: &[&str] = &[
    "chapter",
    "section",
    "appendix",
    "preface",
    "introduction",
    "bibliography",
    "index",
    "acknowledgments",
];

/// Score a page's text for ToC-ness.
pub fn score_toc_page(text: &str) -> i32 {
    let mut score = 0i32;

    if TOC_TITLE.is_match(text) {
        score += 3;
    }

    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    // Structure lines, capped at 3 points.
    let structure_lines = lines
        .iter()
        .filter(|line| DOTTED_LINE.is_match(line) || NUMBERED_LINE.is_match(line) || CHAPTER_LINE.is_match(line))
        .count();
    score += (structure_lines as i32).min(3);

    // Trailing page-number patterns, capped at 2 points.
    let trailing = lines
        .iter()
        .filter(|line| TRAILING_DOT_PAGE.is_match(line) || TRAILING_PAGE_NUM.is_match(line))
        .count();
    score += (trailing as i32 / 2).min(2);

    // Mostly short lines.
    if !lines.is_empty() {
        let short = lines
            .iter()
            .filter(|l| {
                let len = l.chars().count();
                (3..=60).contains(&len)
            })
            .count();
        if (short as f32) / (lines.len() as f32) >= 0.60 {
            score += 2;
        }
    }

    // ToC vocabulary, capped at 2 points.
    let lower = text.to_lowercase();
    let keywords = TOC_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    score += (keywords as i32).min(2);

    score
}

/// Whether the page qualifies as an explicit ToC page.
pub fn is_toc_page(text: &str) -> bool {
    score_toc_page(text) >= TOC_PAGE_SCORE
}

/// Extract entries from an explicit ToC page's text.
pub fn extract_page_entries(text: &str) -> Vec<TocEntry> {
    let mut entries = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = NUMBERED_LINE.captures(line) {
            let number = &caps[1];
            let level = (number.matches('.').count() + 1).min(6) as u8;
            entries.push(TocEntry {
                title: format!("{} {}", number, caps[2].trim()),
                page: caps[3].parse().ok(),
                level,
                source: TocSource::TocPageNumbered,
                confidence: 0.95,
            });
        } else if let Some(caps) = DOTTED_LINE.captures(line) {
            entries.push(TocEntry {
                title: caps[1].trim().to_string(),
                page: caps[2].parse().ok(),
                level: 1,
                source: TocSource::TocPageChapter,
                confidence: 0.9,
            });
        } else if let Some(caps) = CHAPTER_LINE.captures(line) {
            entries.push(TocEntry {
                title: caps[2].trim().to_string(),
                page: None,
                level: 1,
                source: TocSource::TocPageChapter,
                confidence: 0.85,
            });
        }
    }

    entries
}

/// Derive entries from classified heading blocks.
pub fn entries_from_headings(blocks: &[ContentBlock]) -> Vec<TocEntry> {
    blocks
        .iter()
        .filter_map(|block| match &block.kind {
            BlockKind::Heading { level, content } => Some(TocEntry {
                title: content.clone(),
                page: Some(block.page_num),
                level: *level,
                source: TocSource::HeadingStructure,
                confidence: 0.8,
            }),
            _ => None,
        })
        .collect()
}

/// Merge, deduplicate, and order entries from all passes.
pub fn reconcile(entries: Vec<TocEntry>) -> Vec<TocEntry> {
    // Process shortest titles first; confidence breaks ties.
    let mut ordered = entries;
    ordered.sort_by(|a, b| {
        a.title
            .chars()
            .count()
            .cmp(&b.title.chars().count())
            .then(b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut seen: Vec<String> = Vec::new();
    let mut refined: Vec<(String, TocEntry)> = Vec::new();

    for entry in ordered {
        let key = normalize_title(&entry.title);
        if key.is_empty() {
            continue;
        }

        // Drop a title contained in one already kept.
        if seen.iter().any(|existing| existing.contains(&key)) {
            continue;
        }
        // A longer new title absorbs shorter seen ones it contains.
        seen.retain(|existing| {
            let absorbed = key.contains(existing.as_str());
            if absorbed {
                refined.retain(|(k, _)| k != existing);
            }
            !absorbed
        });

        seen.push(key.clone());
        refined.push((key, entry));
    }

    let mut result: Vec<TocEntry> = refined.into_iter().map(|(_, entry)| entry).collect();
    result.sort_by_key(|entry| (entry.page.unwrap_or(u32::MAX), entry.level));

    // Fill missing page numbers with a running counter.
    let mut current_page = 1u32;
    for entry in &mut result {
        match entry.page {
            Some(page) => current_page = page.saturating_add(1),
            None => {
                entry.page = Some(current_page);
                current_page = current_page.saturating_add(1);
            }
        }
    }

    result
}

/// Lowercase, collapse canonical synonyms, and cap the word count.
fn normalize_title(title: &str) -> String {
    let mut lower = title.trim().to_lowercase();

    for canonical in CANONICAL_HEADINGS {
        if lower.contains(canonical) {
            lower = (*canonical).to_string();
            break;
        }
    }

    let words: Vec<&str> = lower.split_whitespace().collect();
    if words.len() > MAX_TITLE_WORDS {
        words[..MAX_TITLE_WORDS].join(" ")
    } else {
        words.join(" ")
    }
}
