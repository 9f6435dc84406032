//! Spatial reading-order recovery.
//!
//! Multi-column pages are sorted column by column (top to bottom, then left
//! to right within a column) and concatenated left to right. Single-column
//! pages use an adaptive vertical band so small baseline jitter does not
//! reorder words that sit on the same visual line.

use super::columns::{Column, column_index_for, detect_columns};
use crate::types::BoundingBox;

/// Bounds for the adaptive single-column vertical tolerance.
const MIN_BAND_TOLERANCE: f32 = 10.0;
const MAX_BAND_TOLERANCE: f32 = 30.0;

/// Compute reading-order positions for a page's elements.
///
/// The result is a permutation: `positions[i]` is the reading-order position
/// of the element with bounding box `bboxes[i]`. Positions are unique and
/// cover `0..bboxes.len()`. Deterministic for a fixed input.
pub fn assign_reading_order(bboxes: &[BoundingBox]) -> Vec<u32> {
    let columns = detect_columns(bboxes);
    let order = if columns.len() > 1 {
        sort_multi_column(bboxes, &columns)
    } else {
        sort_single_column(bboxes)
    };

    let mut positions = vec![0u32; bboxes.len()];
    for (position, index) in order.into_iter().enumerate() {
        positions[index] = position as u32;
    }
    positions
}

/// Sort indices for a multi-column layout: per-column (y, x), columns
/// concatenated left to right. Gutter outliers attach to the nearest column.
pub fn sort_multi_column(bboxes: &[BoundingBox], columns: &[Column]) -> Vec<usize> {
    let mut per_column: Vec<Vec<usize>> = vec![Vec::new(); columns.len()];
    for (idx, bbox) in bboxes.iter().enumerate() {
        let (cx, _) = bbox.center();
        per_column[column_index_for(columns, cx)].push(idx);
    }

    let mut order = Vec::with_capacity(bboxes.len());
    for column in &mut per_column {
        column.sort_by(|&a, &b| {
            let (ab, bb) = (&bboxes[a], &bboxes[b]);
            ab.y0
                .partial_cmp(&bb.y0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ab.x0.partial_cmp(&bb.x0).unwrap_or(std::cmp::Ordering::Equal))
        });
        order.extend_from_slice(column);
    }
    order
}

/// Sort indices for a single-column layout using banded y-coordinates.
pub fn sort_single_column(bboxes: &[BoundingBox]) -> Vec<usize> {
    if bboxes.is_empty() {
        return Vec::new();
    }

    let avg_height = bboxes.iter().map(|b| b.height().max(0.0)).sum::<f32>() / bboxes.len() as f32;
    let tolerance = (avg_height * 0.5).clamp(MIN_BAND_TOLERANCE, MAX_BAND_TOLERANCE);

    let mut order: Vec<usize> = (0..bboxes.len()).collect();
    order.sort_by(|&a, &b| {
        let band_a = (bboxes[a].y0 / tolerance).round() * tolerance;
        let band_b = (bboxes[b].y0 / tolerance).round() * tolerance;
        band_a
            .partial_cmp(&band_b)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                bboxes[a]
                    .x0
                    .partial_cmp(&bboxes[b].x0)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    order
}
