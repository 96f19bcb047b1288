//! Table structure resolution: header detection, label flattening, rendering
//! and chunk emission for grids extracted from documents and workbooks.

pub mod blocks;
pub mod chunks;
pub mod header;
pub mod render;

use chunk_model::MergeDescriptor;

use crate::error::TableError;

/// Merged region in table coordinates (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeRange {
    pub row: usize,
    pub col: usize,
    pub rowspan: usize,
    pub colspan: usize,
}

impl MergeRange {
    pub fn new(row: usize, col: usize, rowspan: usize, colspan: usize) -> Self {
        Self { row, col, rowspan, colspan }
    }

    pub fn last_row(&self) -> usize { self.row + self.rowspan.saturating_sub(1) }

    pub fn last_col(&self) -> usize { self.col + self.colspan.saturating_sub(1) }

    pub fn covers(&self, row: usize, col: usize) -> bool {
        self.touches_row(row) && col >= self.col && col <= self.last_col()
    }

    pub fn touches_row(&self, row: usize) -> bool { row >= self.row && row <= self.last_row() }

    pub fn is_start(&self, row: usize, col: usize) -> bool { self.row == row && self.col == col }
}

/// Rectangular (after validation) grid of cell texts plus merge spans.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableGrid {
    rows: Vec<Vec<String>>,
    merges: Vec<MergeRange>,
}

impl TableGrid {
    pub fn new(rows: Vec<Vec<String>>, merges: Vec<MergeRange>) -> Self {
        Self { rows, merges }
    }

    pub fn rows(&self) -> &[Vec<String>] { &self.rows }

    pub fn merges(&self) -> &[MergeRange] { &self.merges }

    pub fn row_count(&self) -> usize { self.rows.len() }

    pub fn col_count(&self) -> usize { self.rows.iter().map(|r| r.len()).max().unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.row_count() == 0 || self.col_count() == 0 }

    /// Trimmed cell text; missing cells read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows.get(row).and_then(|r| r.get(col)).map(|s| s.trim()).unwrap_or("")
    }

    pub fn row_texts(&self, row: usize) -> Vec<&str> {
        (0..self.col_count()).map(|c| self.cell(row, c)).collect()
    }

    pub fn merge_covering(&self, row: usize, col: usize) -> Option<&MergeRange> {
        self.merges.iter().find(|m| m.covers(row, col))
    }

    pub fn row_in_merge(&self, row: usize) -> bool { self.merges.iter().any(|m| m.touches_row(row)) }

    pub fn row_is_blank(&self, row: usize) -> bool { self.row_texts(row).iter().all(|t| t.is_empty()) }

    /// Fails on empty grids, ragged rows and merges that leave the grid.
    pub fn check_shape(&self) -> Result<(), TableError> {
        if self.is_empty() {
            return Err(TableError::EmptyTable);
        }
        let cols = self.col_count();
        for (row, cells) in self.rows.iter().enumerate() {
            if cells.len() != cols {
                return Err(TableError::RaggedRows { row, expected: cols, found: cells.len() });
            }
        }
        let rows = self.row_count();
        for m in &self.merges {
            if m.rowspan == 0 || m.colspan == 0 || m.last_row() >= rows || m.last_col() >= cols {
                return Err(TableError::MergeOutOfBounds { row: m.row, col: m.col, rows, cols });
            }
        }
        Ok(())
    }

    /// Merge spans as persisted metadata, labelled with their anchor text.
    pub fn merge_descriptors(&self) -> Vec<MergeDescriptor> {
        self.merges
            .iter()
            .filter_map(|m| MergeDescriptor::new(m.row, m.col, m.rowspan, m.colspan, self.cell(m.row, m.col)))
            .collect()
    }
}

/// Numeric test used by the header and alignment heuristics: thousands
/// separators, percent and sign characters are ignored.
pub(crate) fn looks_numeric(text: &str, strip: &[char]) -> bool {
    let cleaned: String = text.trim().chars().filter(|c| !strip.contains(c)).collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    cleaned.parse::<f64>().is_ok()
}
