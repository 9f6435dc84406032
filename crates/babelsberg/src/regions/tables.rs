//! Table detection from text geometry.
//!
//! Spans are clustered into rows by y-proximity; consecutive rows with
//! similar column x-starts form a table candidate. A candidate survives when
//! it is deep and wide enough and at least 70% of its rows agree on the
//! column count within one.

use crate::config::RegionConfig;
use crate::source::{PageData, TextSpan};
use crate::types::BoundingBox;

/// Maximum x-distance between column starts still considered "the same column".
const COLUMN_START_TOLERANCE: f32 = 20.0;

/// Fraction of rows that must agree on the column count.
const CONSISTENCY_FLOOR: f32 = 0.70;

/// Fallback row tolerance when a page has no measurable span height.
const MIN_ROW_TOLERANCE: f32 = 4.0;

/// One detected table: cell grid plus geometry.
#[derive(Debug, Clone)]
pub struct TableCandidate {
    pub bbox: BoundingBox,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub column_count: usize,
}

impl TableCandidate {
    /// Render the grid as pipe-delimited markdown with a separator row.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for (idx, row) in self.rows.iter().enumerate() {
            out.push('|');
            for cell in row {
                out.push(' ');
                out.push_str(cell.trim());
                out.push_str(" |");
            }
            out.push('\n');
            if idx == 0 {
                out.push('|');
                for _ in 0..self.column_count.max(row.len()) {
                    out.push_str(" --- |");
                }
                out.push('\n');
            }
        }
        out
    }

    /// Concatenated cell text, for guard checks.
    pub fn full_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Detect table candidates on a page.
pub fn detect_tables(page: &PageData, config: &RegionConfig) -> Vec<TableCandidate> {
    let rows = cluster_rows(&page.spans);

    // Candidate rows: enough cells to look tabular.
    let mut candidates: Vec<TableCandidate> = Vec::new();
    let mut current: Vec<&[usize]> = Vec::new();

    let row_slices: Vec<Vec<usize>> = rows;
    let mut idx = 0;
    while idx < row_slices.len() {
        let row = &row_slices[idx];
        if row.len() >= config.min_table_columns {
            current.push(row);
            // Extend with following rows sharing a similar column structure.
            let mut next = idx + 1;
            while next < row_slices.len() {
                let candidate_row = &row_slices[next];
                if candidate_row.len() >= config.min_table_columns.saturating_sub(1).max(1)
                    && similar_columns(&page.spans, row, candidate_row)
                {
                    current.push(candidate_row);
                    next += 1;
                } else {
                    break;
                }
            }
            if current.len() >= config.min_table_rows {
                if let Some(candidate) = build_candidate(&page.spans, &current, config) {
                    candidates.push(candidate);
                }
            }
            current.clear();
            idx = next;
        } else {
            idx += 1;
        }
    }

    candidates
}

/// Cluster span indices into rows by y-center proximity.
fn cluster_rows(spans: &[TextSpan]) -> Vec<Vec<usize>> {
    if spans.is_empty() {
        return Vec::new();
    }

    let avg_height = spans.iter().map(|s| s.bbox.height().max(0.0)).sum::<f32>() / spans.len() as f32;
    let tolerance = (avg_height * 0.6).max(MIN_ROW_TOLERANCE);

    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by(|&a, &b| {
        let (_, ya) = spans[a].bbox.center();
        let (_, yb) = spans[b].bbox.center();
        ya.partial_cmp(&yb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                spans[a]
                    .bbox
                    .x0
                    .partial_cmp(&spans[b].bbox.x0)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let mut rows: Vec<Vec<usize>> = Vec::new();
    for index in order {
        let (_, cy) = spans[index].bbox.center();
        match rows.last_mut() {
            Some(row) if (spans[row[0]].bbox.center().1 - cy).abs() <= tolerance => row.push(index),
            _ => rows.push(vec![index]),
        }
    }

    for row in &mut rows {
        row.sort_by(|&a, &b| {
            spans[a]
                .bbox
                .x0
                .partial_cmp(&spans[b].bbox.x0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    rows
}

/// Whether two rows share a similar column structure: column counts within
/// one and matching x-starts within tolerance.
fn similar_columns(spans: &[TextSpan], a: &[usize], b: &[usize]) -> bool {
    if a.len().abs_diff(b.len()) > 1 {
        return false;
    }
    let matched = a
        .iter()
        .filter(|&&ai| {
            b.iter()
                .any(|&bi| (spans[ai].bbox.x0 - spans[bi].bbox.x0).abs() <= COLUMN_START_TOLERANCE)
        })
        .count();
    matched as f32 >= a.len() as f32 * 0.5
}

fn build_candidate(spans: &[TextSpan], rows: &[&[usize]], config: &RegionConfig) -> Option<TableCandidate> {
    let column_count = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if column_count < config.min_table_columns || rows.len() < config.min_table_rows {
        return None;
    }

    // Consistency check: at least 70% of rows within ±1 of the most common count.
    let mut counts: Vec<usize> = rows.iter().map(|r| r.len()).collect();
    counts.sort_unstable();
    let most_common = *counts
        .iter()
        .max_by_key(|&&c| counts.iter().filter(|&&x| x == c).count())?;
    let consistent = counts.iter().filter(|&&c| c.abs_diff(most_common) <= 1).count();
    if (consistent as f32) < (rows.len() as f32) * CONSISTENCY_FLOOR {
        return None;
    }

    let mut bbox = spans[rows[0][0]].bbox;
    let mut grid: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut cells = Vec::with_capacity(row.len());
        for &index in row.iter() {
            bbox = bbox.merge(&spans[index].bbox);
            cells.push(spans[index].text.clone());
        }
        grid.push(cells);
    }

    Some(TableCandidate {
        bbox,
        row_count: grid.len(),
        column_count,
        rows: grid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SpanFlags;

    fn cell(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            bbox: BoundingBox::new(x, y, x + 60.0, y + 12.0),
            font_name: "Times".to_string(),
            font_size: 10.0,
            flags: SpanFlags::default(),
            color: 0,
        }
    }

    fn grid_page(rows: usize, cols: usize) -> PageData {
        let mut spans = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                spans.push(cell(
                    &format!("r{r}c{c}"),
                    50.0 + (c as f32) * 120.0,
                    100.0 + (r as f32) * 20.0,
                ));
            }
        }
        PageData {
            page_number: 1,
            width: 612.0,
            height: 792.0,
            spans,
            ..Default::default()
        }
    }

    #[test]
    fn test_detects_clean_grid() {
        let page = grid_page(4, 3);
        let tables = detect_tables(&page, &RegionConfig::default());
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.row_count, 4);
        assert_eq!(table.column_count, 3);
    }

    #[test]
    fn test_single_row_rejected() {
        let page = grid_page(1, 4);
        let tables = detect_tables(&page, &RegionConfig::default());
        assert!(tables.is_empty());
    }

    #[test]
    fn test_single_column_rejected() {
        let page = grid_page(5, 1);
        let tables = detect_tables(&page, &RegionConfig::default());
        assert!(tables.is_empty());
    }

    #[test]
    fn test_prose_page_yields_nothing() {
        // One wide span per line: no multi-cell rows, no tables.
        let spans = (0..10)
            .map(|i| cell("a long prose line of text", 50.0, 100.0 + (i as f32) * 20.0))
            .collect();
        let page = PageData {
            page_number: 1,
            width: 612.0,
            height: 792.0,
            spans,
            ..Default::default()
        };
        assert!(detect_tables(&page, &RegionConfig::default()).is_empty());
    }

    #[test]
    fn test_markdown_rendering() {
        let page = grid_page(2, 2);
        let tables = detect_tables(&page, &RegionConfig::default());
        let md = tables[0].to_markdown();
        assert!(md.starts_with("| r0c0 | r0c1 |\n| --- | --- |\n"));
        assert!(md.contains("| r1c0 | r1c1 |"));
    }

    #[test]
    fn test_ragged_grid_within_tolerance() {
        // Four rows of three columns, one row missing the last cell: still
        // consistent within ±1.
        let mut page = grid_page(4, 3);
        let drop_index = page
            .spans
            .iter()
            .position(|s| s.text == "r2c2")
            .expect("cell exists");
        page.spans.remove(drop_index);
        let tables = detect_tables(&page, &RegionConfig::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_count, 4);
    }
}
