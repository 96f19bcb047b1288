//! Turning a resolved table into `table_full` / `table_row` chunks.

use chunk_model::{Chunk, ChunkBody, DocumentId, MergeDescriptor, TableAnchor, TableMeta, TableRowMeta};

use super::render::{render_row, render_table};
use super::TableGrid;
use crate::config::{TableChunkingStrategy, TableProcessingConfig};

/// Paragraphs around a table in the source document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableNeighbours {
    pub preceding_paragraph_index: Option<usize>,
    pub following_paragraph_index: Option<usize>,
    pub preceding_content: Option<String>,
    pub following_content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TableSource<'a> {
    pub doc_id: &'a DocumentId,
    pub table_id: String,
    pub sheet: Option<&'a str>,
    pub grid: &'a TableGrid,
    pub neighbours: TableNeighbours,
    pub context: String,
    /// Sheet row of the grid's first row. Row chunks of sheet tables number
    /// rows by sheet position and take their context from adjacent rows.
    pub sheet_offset: Option<usize>,
}

pub fn table_context(preceding: Option<&str>, following: Option<&str>) -> String {
    format!("Preceding: {}. Following: {}", preceding.unwrap_or(""), following.unwrap_or(""))
}

pub fn parent_table_info(header: &[String], merges: &[MergeDescriptor]) -> String {
    let merges: Vec<String> = merges.iter().map(|m| m.to_string()).collect();
    format!("header: [{}] merged_cells: [{}]", header.join(", "), merges.join(", "))
}

/// One `table_full` chunk, plus one `table_row` chunk per body row when the
/// strategy asks for rows.
pub fn build_table_chunks(src: TableSource<'_>, cfg: &TableProcessingConfig) -> Vec<Chunk> {
    let rendered = render_table(src.grid, cfg.table_format);
    let anchor = TableAnchor {
        table_id: src.table_id.clone(),
        sheet: src.sheet.map(str::to_string),
        header: rendered.header.clone(),
        table_format: cfg.table_format,
        parent_table_info: parent_table_info(&rendered.header, &rendered.merged_cells),
        preceding_paragraph_index: src.neighbours.preceding_paragraph_index,
        following_paragraph_index: src.neighbours.following_paragraph_index,
        preceding_paragraph_content: src.neighbours.preceding_content.clone(),
        following_paragraph_content: src.neighbours.following_content.clone(),
    };

    let rows = src.grid.row_count();
    let meta = TableMeta {
        anchor: anchor.clone(),
        header_rows: rendered.header_rows,
        merged_cells: rendered.merged_cells.clone(),
        start_row: src.sheet_offset,
        end_row: src.sheet_offset.map(|o| o + rows.saturating_sub(1)),
    };
    let mut out = vec![Chunk::new(src.doc_id.clone(), rendered.content, ChunkBody::TableFull(meta))
        .with_context(src.context.clone())];

    if cfg.table_chunking_strategy == TableChunkingStrategy::FullAndRows {
        for r in rendered.header_rows..rows {
            let row_no = src.sheet_offset.unwrap_or(0) + r + 1;
            let context = match src.sheet_offset {
                Some(_) => row_context(src.grid, rendered.header_rows, r),
                None => src.context.clone(),
            };
            let body = ChunkBody::TableRow(TableRowMeta { anchor: anchor.clone(), row: row_no });
            out.push(
                Chunk::new(src.doc_id.clone(), render_row(src.grid, r, cfg.table_format), body).with_context(context),
            );
        }
    }
    out
}

fn row_context(grid: &TableGrid, header_rows: usize, row: usize) -> String {
    let summary = |r: usize| grid.row_texts(r).into_iter().filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" | ");
    let prev = (row > header_rows).then(|| summary(row - 1));
    let next = (row + 1 < grid.row_count()).then(|| summary(row + 1));
    table_context(prev.as_deref(), next.as_deref())
}
