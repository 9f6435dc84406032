//! Page geometry analysis and reading-order recovery.
//!
//! Font statistics adapt per document: fixed point-size thresholds do not
//! survive contact with real PDFs, so heading bands are derived from each
//! document's own size histogram. Column layouts are recovered from
//! x-coordinate clustering and drive the spatial reading order.

pub mod columns;
pub mod fonts;
pub mod order;

pub use columns::{Column, detect_columns};
pub use fonts::{SizeBand, StructureAnalysis, analyze_document};
pub use order::assign_reading_order;
