//! Header-row detection and multi-level label flattening.

use std::collections::HashMap;

use super::{looks_numeric, TableGrid};
use crate::error::TableError;

/// Only the first rows of a table are ever considered header candidates.
pub const MAX_HEADER_ROWS: usize = 3;

const HEADER_KEYWORDS: &[&str] = &[
    "年度", "年份", "学校", "名称", "情况", "人数", "合计", "备注",
    "year", "school", "name", "total", "count", "remark",
];

const KEYWORD_RATIO: f64 = 0.3;
const NUMERIC_RATIO: f64 = 0.3;
const EMPTY_RATIO: f64 = 0.5;

/// A heuristic returns how many leading rows look like header rows.
pub type HeaderHeuristic = fn(&TableGrid) -> usize;

pub const HEADER_HEURISTICS: [HeaderHeuristic; 3] = [by_merges, by_content, by_structure];

fn candidate_rows(grid: &TableGrid) -> usize { grid.row_count().min(MAX_HEADER_ROWS) }

/// Counts leading candidate rows accepted by `is_header`, defaulting to 1.
fn leading_rows(grid: &TableGrid, is_header: impl Fn(usize) -> bool) -> usize {
    let n = (0..candidate_rows(grid)).take_while(|&r| is_header(r)).count();
    n.max(1)
}

/// Rows touched by any merge span.
pub fn by_merges(grid: &TableGrid) -> usize { leading_rows(grid, |r| grid.row_in_merge(r)) }

/// Rows rich in header keywords or poor in numbers.
pub fn by_content(grid: &TableGrid) -> usize {
    leading_rows(grid, |r| {
        let cells = grid.row_texts(r);
        if cells.is_empty() {
            return false;
        }
        let total = cells.len() as f64;
        let keyword_hits = cells.iter().filter(|t| has_header_keyword(t)).count() as f64;
        if keyword_hits / total >= KEYWORD_RATIO {
            return true;
        }
        let numeric = cells
            .iter()
            .filter(|t| !t.is_empty() && looks_numeric(t, &[',', '%', '+', '-']))
            .count() as f64;
        numeric / total < NUMERIC_RATIO
    })
}

/// Rows with merges or mostly filled cells.
pub fn by_structure(grid: &TableGrid) -> usize {
    leading_rows(grid, |r| {
        if grid.row_in_merge(r) {
            return true;
        }
        let cells = grid.row_texts(r);
        if cells.is_empty() {
            return false;
        }
        let empty = cells.iter().filter(|t| t.is_empty()).count() as f64;
        empty / (cells.len() as f64) < EMPTY_RATIO
    })
}

fn has_header_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    HEADER_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Majority vote over the heuristics; falls back to the median, then to 1.
/// Empty grids have no header rows.
pub fn detect_header_rows(grid: &TableGrid) -> usize {
    if grid.is_empty() {
        return 0;
    }
    let votes: Vec<usize> = HEADER_HEURISTICS.iter().map(|h| h(grid)).filter(|&n| n > 0).collect();
    combine_votes(&votes)
}

pub fn combine_votes(votes: &[usize]) -> usize {
    if votes.is_empty() {
        return 1;
    }
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &v in votes {
        *counts.entry(v).or_default() += 1;
    }
    // first-seen value wins among equal counts
    let mut best: Option<(usize, usize)> = None;
    for &v in votes {
        let c = counts[&v];
        if best.map_or(true, |(_, bc)| c > bc) {
            best = Some((v, c));
        }
    }
    match best {
        Some((value, count)) if count > 1 => value,
        _ => {
            let mut sorted = votes.to_vec();
            sorted.sort_unstable();
            sorted[sorted.len() / 2]
        }
    }
}

/// One label per column, `/`-joining the header-row values top to bottom.
///
/// A cell covered by a merge that started on an earlier row contributes
/// nothing (the anchor row already did); a cell covered by a merge starting
/// on the same row reads the anchor's text. Spans that start inside the
/// header rows prefix their label when it is still missing.
pub fn header_labels(grid: &TableGrid, header_rows: usize) -> Vec<String> {
    let header_rows = header_rows.min(grid.row_count());
    let cols = grid.col_count();
    let mut labels = Vec::with_capacity(cols);
    for col in 0..cols {
        let mut parts: Vec<String> = Vec::new();
        for row in 0..header_rows {
            let text = match grid.merge_covering(row, col) {
                Some(m) if m.row < row => continue,
                Some(m) => grid.cell(m.row, m.col),
                None => grid.cell(row, col),
            };
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }
        for m in grid.merges().iter().filter(|m| m.row < header_rows && m.colspan > 1 && m.covers(m.row, col)) {
            let anchor = grid.cell(m.row, m.col);
            if !anchor.is_empty() && !parts.iter().any(|p| p == anchor) {
                parts.insert(0, anchor.to_string());
            }
        }
        labels.push(parts.join("/"));
    }
    labels
}

/// Rejects label sets that are mostly empty or nested deeper than three levels.
pub fn validate_header_labels(labels: &[String]) -> Result<(), TableError> {
    let empty = labels.iter().filter(|l| l.trim().is_empty()).count();
    if empty * 2 > labels.len() {
        return Err(TableError::InvalidHeader(format!("{} of {} labels are empty", empty, labels.len())));
    }
    if let Some(deep) = labels.iter().find(|l| l.split('/').count() > MAX_HEADER_ROWS) {
        return Err(TableError::InvalidHeader(format!("label '{}' has too many levels", deep)));
    }
    Ok(())
}
