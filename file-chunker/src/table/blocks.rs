//! Splitting a worksheet into independent table blocks.

use super::header::detect_header_rows;
use super::{MergeRange, TableGrid};

/// Worksheet cells in absolute sheet coordinates; `None` is an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetGrid {
    cells: Vec<Vec<Option<String>>>,
    merges: Vec<MergeRange>,
}

impl SheetGrid {
    pub fn new(cells: Vec<Vec<Option<String>>>, merges: Vec<MergeRange>) -> Self {
        Self { cells, merges }
    }

    pub fn row_count(&self) -> usize {
        let merged = self.merges.iter().map(|m| m.last_row() + 1).max().unwrap_or(0);
        self.cells.len().max(merged)
    }

    pub fn col_count(&self) -> usize {
        let merged = self.merges.iter().map(|m| m.last_col() + 1).max().unwrap_or(0);
        self.cells.iter().map(|r| r.len()).max().unwrap_or(0).max(merged)
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn row_has_data(&self, row: usize) -> bool {
        (0..self.col_count()).any(|c| self.value(row, c).is_some())
    }

    pub fn row_in_merge(&self, row: usize) -> bool { self.merges.iter().any(|m| m.touches_row(row)) }

    /// Non-empty values of a row joined with " | ", used for neighbour context.
    pub fn row_summary(&self, row: usize) -> String {
        (0..self.col_count()).filter_map(|c| self.value(row, c)).map(|s| s.trim()).collect::<Vec<_>>().join(" | ")
    }
}

/// One logical table cut out of a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBlock {
    /// First and last sheet rows (0-based, inclusive).
    pub start_row: usize,
    pub end_row: usize,
    pub grid: TableGrid,
}

impl TableBlock {
    pub fn header_row_count(&self) -> usize { detect_header_rows(&self.grid) }
}

/// Inclusive row ranges of contiguous blocks. A row belongs to the open block
/// when it holds any value or is touched by a merge.
pub fn block_ranges(sheet: &SheetGrid) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;
    for r in 0..sheet.row_count() {
        if sheet.row_has_data(r) || sheet.row_in_merge(r) {
            open.get_or_insert(r);
        } else if let Some(start) = open.take() {
            ranges.push((start, r - 1));
        }
    }
    if let Some(start) = open {
        ranges.push((start, sheet.row_count() - 1));
    }
    ranges
}

/// Cuts rows `start..=end` out of the sheet, drops all-empty columns and
/// re-bases the merges that intersect the block. `None` if nothing is left.
pub fn extract_block(sheet: &SheetGrid, start: usize, end: usize) -> Option<TableBlock> {
    let kept: Vec<usize> =
        (0..sheet.col_count()).filter(|&c| (start..=end).any(|r| sheet.value(r, c).is_some())).collect();
    if kept.is_empty() {
        return None;
    }

    let rows: Vec<Vec<String>> = (start..=end)
        .map(|r| kept.iter().map(|&c| sheet.value(r, c).unwrap_or("").to_string()).collect())
        .collect();

    let new_col = |c: usize| kept.iter().filter(|&&k| k < c).count();
    let merges = sheet
        .merges
        .iter()
        .filter(|m| m.row <= end && m.last_row() >= start)
        .filter_map(|m| {
            let first = m.row.max(start);
            let last = m.last_row().min(end);
            let width = kept.iter().filter(|&&k| k >= m.col && k <= m.last_col()).count();
            let anchor = kept.iter().copied().find(|&k| k >= m.col && k <= m.last_col())?;
            let range = MergeRange::new(first - start, new_col(anchor), last - first + 1, width);
            (range.rowspan > 1 || range.colspan > 1).then_some(range)
        })
        .collect();

    Some(TableBlock { start_row: start, end_row: end, grid: TableGrid::new(rows, merges) })
}

pub fn split_table_blocks(sheet: &SheetGrid) -> Vec<TableBlock> {
    block_ranges(sheet).into_iter().filter_map(|(s, e)| extract_block(sheet, s, e)).collect()
}
