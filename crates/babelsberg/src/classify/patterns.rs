//! Shared text patterns for classification.
//!
//! All regexes live here as lazy statics so the classifier, the region
//! detectors, and the ToC reconciler agree on what counts as a heading
//! number, a list marker, or mathematical notation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Numbered heading: "3", "2.1", "4.1.2" followed by text.
pub static NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*\.?\s+\S").expect("Numbered heading regex is valid and should compile"));

/// Chapter/section prefix.
pub static CHAPTER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(chapter|section|part|appendix)\b").expect("Chapter prefix regex is valid and should compile")
});

/// Bullet list marker.
pub static BULLET_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-•*‣◦]\s+\S").expect("Bullet item regex is valid and should compile"));

/// Numbered list marker: "1. text", "12) text".
pub static NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}[.)]\s+\S").expect("Numbered item regex is valid and should compile"));

/// Lettered list marker: "a) text", "B. text".
pub static LETTERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][.)]\s+\S").expect("Lettered item regex is valid and should compile"));

/// Standalone page number: 1 to 4 digits and nothing else.
pub static STANDALONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,4}$").expect("Standalone number regex is valid and should compile"));

/// Footer noise: copyright lines, URLs, confidentiality banners.
pub static FOOTER_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(©|\(c\)\s*\d{4}|copyright|all rights reserved|https?://|www\.|confidential|proprietary)")
        .expect("Footer noise regex is valid and should compile")
});

/// Processing artifacts left by upstream tools.
pub static ARTIFACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[MISSING_PAGE[^\]]*\]|\\begin\{[^}]*\}|\\end\{[^}]*\}")
        .expect("Artifact regex is valid and should compile")
});

/// LaTeX-style command with braces: `\frac{..}`, `\sum{..}`.
pub static TEX_COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[a-zA-Z]+\{[^}]*\}").expect("TeX command regex is valid and should compile"));

/// Simple equation shapes: `a = b + c`, `x^2`, `a_n`.
pub static EQUATION_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|\s)\w+\s*=\s*\S|\w\^\S|\w_\{?\w").expect("Equation shape regex is valid and should compile")
});

/// Code-like line: leading indentation or a statement-shaped keyword line.
pub static CODE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s{4,}|\t)|^(fn|def|class|import|#include|return|pub|static|void|int)\b.*[;{})]\s*$")
        .expect("Code line regex is valid and should compile")
});

/// Markdown-style table row.
pub static TABLE_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|.+\|$|\S\s*\|\s*\S.*\|").expect("Table row regex is valid and should compile"));

/// Mathematical symbols that mark equation content.
pub const MATH_SYMBOLS: &[char] = &[
    '∑', '∫', '∂', '∆', '∇', '±', '≤', '≥', '≠', '≈', '∝', '∈', '⊂', '∪', '∩', '√', '∞', 'π', 'θ', 'λ', 'μ', 'σ',
    'Σ', 'Π', '×', '÷',
];

/// Section-start keywords that boost heading scores.
pub const SECTION_KEYWORDS: &[&str] = &[
    "introduction",
    "conclusion",
    "methodology",
    "methods",
    "results",
    "discussion",
    "references",
    "abstract",
    "summary",
    "overview",
    "background",
    "acknowledgments",
    "appendix",
    "bibliography",
    "preface",
];

/// Whether the text contains at least one mathematical symbol.
pub fn has_math_symbol(text: &str) -> bool {
    text.chars().any(|c| MATH_SYMBOLS.contains(&c))
}

/// Whether the text is equation-like: math symbols or equation shapes.
pub fn is_equation_like(text: &str) -> bool {
    has_math_symbol(text) || TEX_COMMAND.is_match(text) || EQUATION_SHAPE.is_match(text)
}

/// ALL-CAPS heading of at most five words.
pub fn is_all_caps_heading(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || words.len() > 5 {
        return false;
    }
    text.chars().any(|c| c.is_alphabetic()) && !text.chars().any(|c| c.is_lowercase())
}

/// Title-Case heading of at most seven words.
pub fn is_title_case_heading(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || words.len() > 7 {
        return false;
    }
    words
        .iter()
        .all(|w| w.chars().next().is_some_and(|c| c.is_uppercase() || c.is_numeric()))
}

/// Any heading-shaped pattern match.
pub fn matches_heading_pattern(text: &str) -> bool {
    NUMBERED_HEADING.is_match(text)
        || CHAPTER_PREFIX.is_match(text)
        || is_all_caps_heading(text)
        || is_title_case_heading(text)
}

/// Whether the text begins with a section-start keyword.
pub fn starts_section(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    let first = lower
        .trim_start_matches(|c: char| c.is_numeric() || c == '.' || c == ' ')
        .split_whitespace()
        .next()
        .unwrap_or("");
    SECTION_KEYWORDS.contains(&first)
}
