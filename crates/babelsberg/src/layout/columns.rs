//! Column layout detection from x-coordinate clustering.
//!
//! The left and right edges of every element are projected onto the x axis;
//! a sorted scan over those positions finds the gutters. A gap wider than
//! `COLUMN_GAP` splits the page into columns at the gap midpoint.

use crate::types::BoundingBox;

/// Minimum x-gap worth recording as a gutter candidate.
const MIN_GAP: f32 = 50.0;

/// Gap width that establishes a column boundary.
const COLUMN_GAP: f32 = 100.0;

/// A vertical column band on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub left: f32,
    pub right: f32,
}

impl Column {
    pub fn center(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    pub fn contains_x(&self, x: f32) -> bool {
        self.left <= x && x < self.right
    }
}

/// Detect column bands from element bounding boxes.
///
/// Returns one column spanning the full element extent for single-column
/// pages; two or more bands when a gutter wider than `COLUMN_GAP` exists.
pub fn detect_columns(bboxes: &[BoundingBox]) -> Vec<Column> {
    if bboxes.is_empty() {
        return Vec::new();
    }

    let mut x_positions: Vec<f32> = Vec::with_capacity(bboxes.len() * 2);
    for bbox in bboxes {
        x_positions.push(bbox.x0);
        x_positions.push(bbox.x1);
    }
    x_positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let page_left = x_positions[0];
    let page_right = x_positions[x_positions.len() - 1];

    // Gutter candidates: midpoints of wide gaps in the sorted edge positions.
    let mut boundaries: Vec<f32> = Vec::new();
    for pair in x_positions.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > MIN_GAP && gap > COLUMN_GAP {
            boundaries.push((pair[0] + pair[1]) / 2.0);
        }
    }

    if boundaries.is_empty() {
        return vec![Column {
            left: page_left,
            right: page_right,
        }];
    }

    let mut columns = Vec::with_capacity(boundaries.len() + 1);
    let mut prev = page_left;
    for boundary in boundaries {
        columns.push(Column {
            left: prev,
            right: boundary,
        });
        prev = boundary;
    }
    columns.push(Column {
        left: prev,
        right: page_right,
    });
    columns
}

/// Index of the column containing `x`, falling back to the nearest column
/// center for gutter outliers.
pub fn column_index_for(columns: &[Column], x: f32) -> usize {
    if let Some(idx) = columns.iter().position(|c| c.contains_x(x)) {
        return idx;
    }
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (idx, column) in columns.iter().enumerate() {
        let dist = (column.center() - x).abs();
        if dist < best_dist {
            best_dist = dist;
            best = idx;
        }
    }
    best
}
