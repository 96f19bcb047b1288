use calamine::{open_workbook, Data, Dimensions, Range, Reader, Xlsx};
use chunk_model::{Chunk, DocumentId};
use tracing::{debug, info};

use crate::config::TableProcessingConfig;
use crate::error::ReaderError;
use crate::table::blocks::{block_ranges, extract_block, SheetGrid};
use crate::table::chunks::{build_table_chunks, table_context, TableNeighbours, TableSource};
use crate::table::MergeRange;

/// XLSX reader: every sheet is cut into table blocks and each block becomes
/// table chunks (`{sheet}_table_{k}`).
pub fn read_xlsx_to_chunks(
    path: &str,
    doc_id: &DocumentId,
    cfg: &TableProcessingConfig,
) -> Result<Vec<Chunk>, ReaderError> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| ReaderError::Workbook(format!("{e}")))?;
    workbook
        .load_merged_regions()
        .map_err(|e| ReaderError::Workbook(format!("failed to load merged regions: {e}")))?;

    let mut out = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ReaderError::Workbook(format!("failed to read sheet {name}: {e}")))?;
        let merged = workbook.worksheet_merge_cells(&name).unwrap_or(Ok(Vec::new())).unwrap_or_default();
        let sheet = sheet_grid(&range, &merged);
        let before = out.len();
        out.extend(sheet_to_chunks(&sheet, &name, doc_id, cfg));
        debug!(sheet = %name, chunks = out.len() - before, "sheet chunked");
    }
    info!(path, chunks = out.len(), "xlsx read");
    Ok(out)
}

/// Absolute sheet grid; rows and columns before the used range stay empty.
pub fn sheet_grid(range: &Range<Data>, merged: &[Dimensions]) -> SheetGrid {
    let (row0, col0) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => (0, 0),
    };
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); row0];
    for row in range.rows() {
        let mut line: Vec<Option<String>> = vec![None; col0];
        line.extend(row.iter().map(cell_to_string));
        cells.push(line);
    }
    let merges = merged
        .iter()
        .map(|d| {
            let (r0, c0) = (d.start.0 as usize, d.start.1 as usize);
            let (r1, c1) = (d.end.0 as usize, d.end.1 as usize);
            MergeRange::new(r0, c0, r1.saturating_sub(r0) + 1, c1.saturating_sub(c0) + 1)
        })
        .collect();
    SheetGrid::new(cells, merges)
}

/// Chunks for every block of one sheet. A block's context quotes the last
/// row of the previous block and the first row of the next one.
pub fn sheet_to_chunks(sheet: &SheetGrid, sheet_name: &str, doc_id: &DocumentId, cfg: &TableProcessingConfig) -> Vec<Chunk> {
    let ranges = block_ranges(sheet);
    let mut out = Vec::new();
    let mut table_no = 0usize;
    for (i, &(start, end)) in ranges.iter().enumerate() {
        let Some(block) = extract_block(sheet, start, end) else {
            continue;
        };
        table_no += 1;
        let preceding = i.checked_sub(1).map(|p| sheet.row_summary(ranges[p].1));
        let following = ranges.get(i + 1).map(|n| sheet.row_summary(n.0));
        let source = TableSource {
            doc_id,
            table_id: format!("{}_table_{}", sheet_name, table_no),
            sheet: Some(sheet_name),
            grid: &block.grid,
            context: table_context(preceding.as_deref(), following.as_deref()),
            neighbours: TableNeighbours::default(),
            sheet_offset: Some(block.start_row),
        };
        out.extend(build_table_chunks(source, cfg));
    }
    out
}

fn cell_to_string(c: &Data) -> Option<String> {
    let s = match c {
        Data::Empty => return None,
        Data::String(s) => s.replace("\r\n", "\n").replace('\r', "\n"),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 { format!("{}", *f as i64) } else { f.to_string() }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => if *b { "TRUE".into() } else { "FALSE".into() },
        Data::Error(e) => format!("#ERR:{:?}", e),
        other => other.to_string(),
    };
    if s.trim().is_empty() { None } else { Some(s) }
}
