//! Markdown/HTML serialization with an ordered fallback ladder.

use chunk_model::{MergeDescriptor, TableFormat};
use tracing::warn;

use super::header::{detect_header_rows, header_labels, validate_header_labels};
use super::{looks_numeric, TableGrid};
use crate::error::TableError;

/// Share of numeric body values above which a column is right-aligned.
const RIGHT_ALIGN_RATIO: f64 = 0.7;

pub const MINIMAL_TABLE: &str = "<table></table>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTable {
    pub content: String,
    pub header: Vec<String>,
    pub header_rows: usize,
    pub merged_cells: Vec<MergeDescriptor>,
}

impl RenderedTable {
    /// Last rung of the ladder; never fails.
    pub fn minimal() -> Self {
        Self { content: MINIMAL_TABLE.to_string(), header: Vec::new(), header_rows: 0, merged_cells: Vec::new() }
    }
}

/// A pure grid-to-table function; an error hands over to the next strategy.
pub type RenderStrategy = fn(&TableGrid, TableFormat) -> Result<RenderedTable, TableError>;

pub const RENDER_LADDER: [(&str, RenderStrategy); 2] = [("enhanced", render_enhanced), ("basic", render_basic)];

pub fn render_table(grid: &TableGrid, format: TableFormat) -> RenderedTable {
    render_with_ladder(grid, format, &RENDER_LADDER)
}

/// Tries each strategy in order and returns the minimal table when all fail.
pub fn render_with_ladder(grid: &TableGrid, format: TableFormat, ladder: &[(&str, RenderStrategy)]) -> RenderedTable {
    for (name, strategy) in ladder {
        match strategy(grid, format) {
            Ok(table) => return table,
            Err(e) => warn!(strategy = %name, error = %e, "table strategy failed, falling back"),
        }
    }
    RenderedTable::minimal()
}

/// Merge-aware rendering with detected header rows and flattened labels.
pub fn render_enhanced(grid: &TableGrid, format: TableFormat) -> Result<RenderedTable, TableError> {
    grid.check_shape()?;
    let header_rows = detect_header_rows(grid);
    let header = header_labels(grid, header_rows);
    validate_header_labels(&header)?;

    let content = match format {
        TableFormat::Markdown => markdown_enhanced(grid, header_rows, &header),
        TableFormat::Html => html_enhanced(grid, header_rows),
    };
    Ok(RenderedTable { content, header, header_rows, merged_cells: grid.merge_descriptors() })
}

/// Row 0 is the header, merges are ignored, ragged rows are padded.
pub fn render_basic(grid: &TableGrid, format: TableFormat) -> Result<RenderedTable, TableError> {
    if grid.is_empty() {
        return Err(TableError::EmptyTable);
    }
    let header: Vec<String> = grid.row_texts(0).iter().map(|t| t.to_string()).collect();
    let body = 1..grid.row_count();

    let content = match format {
        TableFormat::Markdown => {
            let mut lines = vec![markdown_line(header.iter().map(|h| dash_if_blank(h)))];
            let seps = (0..header.len()).map(|c| if c == 0 { "---".to_string() } else { "---:".to_string() });
            lines.push(markdown_line(seps));
            for r in body {
                lines.push(markdown_row(grid, r));
            }
            lines.join("\n")
        }
        TableFormat::Html => {
            let mut html = vec!["<table border='1'>".to_string()];
            let ths: String = header.iter().map(|h| format!("<th>{}</th>", escape_html(&dash_if_blank(h)))).collect();
            html.push(format!("<tr>{}</tr>", ths));
            for r in body {
                html.push(format!("<tr>{}</tr>", html_cells(grid, r)));
            }
            html.push("</table>".to_string());
            html.join("\n")
        }
    };
    Ok(RenderedTable { content, header, header_rows: 1, merged_cells: Vec::new() })
}

fn markdown_enhanced(grid: &TableGrid, header_rows: usize, header: &[String]) -> String {
    let mut lines = vec![markdown_line(header.iter().map(|h| escape_markdown(h)))];
    let seps = (0..header.len()).map(|c| column_alignment(grid, header_rows, c).to_string());
    lines.push(markdown_line(seps));
    for r in header_rows..grid.row_count() {
        if grid.row_is_blank(r) {
            continue;
        }
        lines.push(markdown_row(grid, r));
    }
    lines.join("\n")
}

fn html_enhanced(grid: &TableGrid, header_rows: usize) -> String {
    let mut html = vec!["<table border='1'>".to_string()];
    for r in 0..header_rows {
        let mut row = String::from("<tr>");
        for c in 0..grid.col_count() {
            match grid.merge_covering(r, c) {
                Some(m) if m.is_start(r, c) => {
                    let mut attrs = String::new();
                    if m.colspan > 1 {
                        attrs.push_str(&format!(" colspan=\"{}\"", m.colspan));
                    }
                    let rowspan = m.rowspan.min(header_rows - r);
                    if rowspan > 1 {
                        attrs.push_str(&format!(" rowspan=\"{}\"", rowspan));
                    }
                    row.push_str(&format!("<th{}>{}</th>", attrs, escape_html(&dash_if_blank(grid.cell(r, c)))));
                }
                Some(_) => {}
                None => row.push_str(&format!("<th>{}</th>", escape_html(&dash_if_blank(grid.cell(r, c))))),
            }
        }
        row.push_str("</tr>");
        html.push(row);
    }
    for r in header_rows..grid.row_count() {
        html.push(format!("<tr>{}</tr>", html_cells(grid, r)));
    }
    html.push("</table>".to_string());
    html.join("\n")
}

/// `---:` when more than 70% of the non-blank body values are numeric.
pub fn column_alignment(grid: &TableGrid, header_rows: usize, col: usize) -> &'static str {
    let values: Vec<&str> = (header_rows..grid.row_count()).map(|r| grid.cell(r, col)).filter(|t| !t.is_empty()).collect();
    if values.is_empty() {
        return "---";
    }
    let numeric = values.iter().filter(|t| looks_numeric(t, &[',', '%'])).count() as f64;
    if numeric / values.len() as f64 > RIGHT_ALIGN_RATIO { "---:" } else { "---" }
}

/// Single body row in the configured format, used for row chunks.
pub fn render_row(grid: &TableGrid, row: usize, format: TableFormat) -> String {
    match format {
        TableFormat::Markdown => markdown_row(grid, row),
        TableFormat::Html => format!("<table border='1'><tr>{}</tr></table>", html_cells(grid, row)),
    }
}

fn markdown_row(grid: &TableGrid, row: usize) -> String {
    markdown_line(grid.row_texts(row).into_iter().map(|t| escape_markdown(&dash_if_blank(t))))
}

fn markdown_line(cells: impl Iterator<Item = String>) -> String {
    format!("| {} |", cells.collect::<Vec<_>>().join(" | "))
}

fn html_cells(grid: &TableGrid, row: usize) -> String {
    grid.row_texts(row).into_iter().map(|t| format!("<td>{}</td>", escape_html(&dash_if_blank(t)))).collect()
}

fn dash_if_blank(text: &str) -> String {
    let t = text.trim();
    if t.is_empty() { "-".to_string() } else { t.to_string() }
}

fn escape_markdown(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ").replace('|', "\\|")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('\n', "<br>")
}
