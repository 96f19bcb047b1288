use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;

use chunk_model::{Chunk, ChunkBody, DocumentId, ImageAnchor, ImageMeta};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info};

use crate::config::TableProcessingConfig;
use crate::error::ReaderError;
use crate::table::chunks::{build_table_chunks, table_context, TableNeighbours, TableSource};
use crate::table::{MergeRange, TableGrid};

fn local_name(q: &[u8]) -> &[u8] {
    match q.iter().position(|&b| b == b':') { Some(i) => &q[i + 1..], None => q }
}

fn attr_val(e: &BytesStart<'_>, key_local: &[u8]) -> Option<String> {
    for attr in e.attributes().with_checks(false).flatten() {
        if local_name(attr.key.as_ref()) == key_local {
            return Some(String::from_utf8_lossy(&attr.value).into_owned());
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VMerge {
    Restart,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocxCell {
    pub text: String,
    pub grid_span: usize,
    pub v_merge: Option<VMerge>,
    /// Relationship ids of pictures inside the cell.
    pub images: Vec<String>,
}

impl Default for DocxCell {
    fn default() -> Self {
        Self { text: String::new(), grid_span: 1, v_merge: None, images: Vec::new() }
    }
}

/// Top-level body element in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyItem {
    Paragraph { text: String, images: Vec<String> },
    Table(Vec<Vec<DocxCell>>),
}

/// Streaming state for `word/document.xml`. Nested tables are folded into
/// the text of the enclosing top-level cell.
#[derive(Debug, Default)]
struct BodyParser {
    items: Vec<BodyItem>,
    tbl_depth: usize,
    p_depth: usize,
    in_t: bool,
    para_text: String,
    para_images: Vec<String>,
    rows: Vec<Vec<DocxCell>>,
    row: Vec<DocxCell>,
    cell: DocxCell,
    cell_paras: Vec<String>,
    cell_para: String,
}

impl BodyParser {
    fn sink(&mut self) -> &mut String {
        if self.tbl_depth > 0 { &mut self.cell_para } else { &mut self.para_text }
    }

    fn open(&mut self, e: &BytesStart<'_>, empty: bool) {
        let top_table = self.tbl_depth == 1;
        match local_name(e.name().as_ref()) {
            b"p" if !empty => self.p_depth += 1,
            b"t" if !empty => self.in_t = true,
            b"tab" => self.sink().push('\t'),
            b"br" | b"cr" => self.sink().push('\n'),
            b"tbl" if !empty => {
                self.tbl_depth += 1;
                if self.tbl_depth == 1 {
                    self.rows.clear();
                }
            }
            b"tr" if top_table && !empty => self.row.clear(),
            b"tc" if top_table && !empty => {
                self.cell = DocxCell::default();
                self.cell_paras.clear();
                self.cell_para.clear();
            }
            b"gridSpan" if top_table => {
                if let Some(n) = attr_val(e, b"val").and_then(|v| v.parse::<usize>().ok()) {
                    self.cell.grid_span = n.max(1);
                }
            }
            b"vMerge" if top_table => {
                let restart = attr_val(e, b"val").map(|v| v.eq_ignore_ascii_case("restart")).unwrap_or(false);
                self.cell.v_merge = Some(if restart { VMerge::Restart } else { VMerge::Continue });
            }
            b"blip" => {
                if let Some(rel) = attr_val(e, b"embed") {
                    if self.tbl_depth > 0 { self.cell.images.push(rel) } else { self.para_images.push(rel) }
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match local_name(name) {
            b"t" => self.in_t = false,
            b"p" => {
                self.p_depth = self.p_depth.saturating_sub(1);
                if self.tbl_depth > 0 {
                    let para = std::mem::take(&mut self.cell_para);
                    self.cell_paras.push(para);
                } else if self.p_depth == 0 {
                    self.items.push(BodyItem::Paragraph {
                        text: std::mem::take(&mut self.para_text),
                        images: std::mem::take(&mut self.para_images),
                    });
                }
            }
            b"tc" if self.tbl_depth == 1 => {
                let mut cell = std::mem::take(&mut self.cell);
                cell.text = self.cell_paras.join("\n");
                self.cell_paras.clear();
                self.row.push(cell);
            }
            b"tr" if self.tbl_depth == 1 => {
                let row = std::mem::take(&mut self.row);
                self.rows.push(row);
            }
            b"tbl" => {
                if self.tbl_depth == 1 {
                    let rows = std::mem::take(&mut self.rows);
                    self.items.push(BodyItem::Table(rows));
                }
                self.tbl_depth = self.tbl_depth.saturating_sub(1);
            }
            _ => {}
        }
    }
}

pub fn parse_document_xml(xml: &str) -> Result<Vec<BodyItem>, ReaderError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut parser = BodyParser::default();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => parser.open(&e, false),
            Ok(Event::Empty(e)) => parser.open(&e, true),
            Ok(Event::End(e)) => parser.close(e.name().as_ref()),
            Ok(Event::Text(t)) => {
                if parser.in_t {
                    let s = t.unescape().map_err(|e| ReaderError::Xml(e.to_string()))?;
                    parser.sink().push_str(&s);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ReaderError::Xml(format!("at {}: {}", reader.buffer_position(), e))),
            _ => {}
        }
    }
    Ok(parser.items)
}

/// Image relationships of the main part, as package paths (`word/media/...`).
pub fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ReaderError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = HashMap::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if local_name(e.name().as_ref()) == b"Relationship" => {
                let external = attr_val(&e, b"TargetMode").map(|m| m.eq_ignore_ascii_case("external")).unwrap_or(false);
                let is_image = attr_val(&e, b"Type").map(|t| t.ends_with("/image")).unwrap_or(false);
                if let (false, true, Some(id), Some(target)) = (external, is_image, attr_val(&e, b"Id"), attr_val(&e, b"Target")) {
                    out.insert(id, package_path(&target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ReaderError::Xml(e.to_string())),
            _ => {}
        }
    }
    Ok(out)
}

fn package_path(target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        abs.to_string()
    } else if let Some(up) = target.strip_prefix("../") {
        up.to_string()
    } else {
        format!("word/{}", target)
    }
}

/// Rectangular grid of a document table plus where its pictures sit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedTable {
    pub grid: TableGrid,
    /// (row, col, relationship id)
    pub images: Vec<(usize, usize, String)>,
}

/// Expands `gridSpan` and `vMerge` so every grid position holds the text it
/// displays. Row spans are counted from consecutive `continue` cells in the
/// same grid column; layouts that shift columns between rows are not tracked.
pub fn expand_table(rows: &[Vec<DocxCell>]) -> ExpandedTable {
    let cols = rows.iter().map(|r| r.iter().map(|c| c.grid_span.max(1)).sum::<usize>()).max().unwrap_or(0);
    let mut grid = vec![vec![String::new(); cols]; rows.len()];
    let mut merges: Vec<MergeRange> = Vec::new();
    let mut open: HashMap<usize, usize> = HashMap::new();
    let mut images = Vec::new();

    for (r, row) in rows.iter().enumerate() {
        let mut c = 0usize;
        for cell in row {
            if c >= cols {
                break;
            }
            let span = cell.grid_span.max(1).min(cols - c);
            let text = match cell.v_merge {
                Some(VMerge::Continue) => match open.get(&c) {
                    Some(&idx) => {
                        merges[idx].rowspan += 1;
                        grid[merges[idx].row][merges[idx].col].clone()
                    }
                    None => cell.text.clone(),
                },
                Some(VMerge::Restart) => {
                    merges.push(MergeRange::new(r, c, 1, span));
                    open.insert(c, merges.len() - 1);
                    cell.text.clone()
                }
                None => {
                    open.remove(&c);
                    if span > 1 {
                        merges.push(MergeRange::new(r, c, 1, span));
                    }
                    cell.text.clone()
                }
            };
            for slot in grid[r].iter_mut().skip(c).take(span) {
                *slot = text.clone();
            }
            images.extend(cell.images.iter().map(|rel| (r, c, rel.clone())));
            c += span;
        }
    }
    merges.retain(|m| m.rowspan > 1 || m.colspan > 1);
    ExpandedTable { grid: TableGrid::new(grid, merges), images }
}

fn read_part<R: Read + std::io::Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Result<Option<String>, ReaderError> {
    match zip.by_name(name) {
        Ok(mut f) => {
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            Ok(Some(s))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Opens a .docx package and emits paragraph, table and image chunks in document order.
pub fn read_docx_to_chunks(
    path: &str,
    doc_id: &DocumentId,
    cfg: &TableProcessingConfig,
) -> Result<Vec<Chunk>, ReaderError> {
    let file = File::open(path)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let doc_xml = read_part(&mut zip, "word/document.xml")?
        .ok_or_else(|| ReaderError::MissingPart("word/document.xml".into()))?;
    let rels = match read_part(&mut zip, "word/_rels/document.xml.rels")? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };
    let items = parse_document_xml(&doc_xml)?;
    let chunks = assemble_chunks(&items, &rels, doc_id, cfg);
    info!(path, chunks = chunks.len(), "docx read");
    Ok(chunks)
}

/// Builds raw chunks from parsed body items. Paragraph indices are 1-based
/// and count non-blank paragraphs only.
pub fn assemble_chunks(
    items: &[BodyItem],
    rels: &HashMap<String, String>,
    doc_id: &DocumentId,
    cfg: &TableProcessingConfig,
) -> Vec<Chunk> {
    let paragraphs: Vec<&str> = items
        .iter()
        .filter_map(|it| match it {
            BodyItem::Paragraph { text, .. } if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        })
        .collect();
    let para_at = |idx: usize| idx.checked_sub(1).and_then(|i| paragraphs.get(i)).copied();

    let mut images = ImageCollector { rels, seen: HashSet::new(), count: 0 };
    let mut out: Vec<Chunk> = Vec::new();
    let mut para_count = 0usize;
    let mut table_count = 0usize;

    for item in items {
        match item {
            BodyItem::Paragraph { text, images: rel_ids } => {
                if !text.trim().is_empty() {
                    para_count += 1;
                    let ctx = table_context(para_at(para_count - 1), para_at(para_count + 1));
                    out.push(Chunk::text(doc_id.clone(), text.clone(), Some(para_count)).with_context(ctx));
                }
                for rel in rel_ids {
                    let ctx = table_context(para_at(para_count), para_at(para_count + 1));
                    let anchor = ImageAnchor::Paragraph { paragraph_index: para_count };
                    images.push(&mut out, doc_id, rel, anchor, ctx);
                }
            }
            BodyItem::Table(rows) => {
                table_count += 1;
                let table_id = format!("table_{}", table_count);
                let expanded = expand_table(rows);
                let preceding = (para_count > 0).then_some(para_count);
                let following = (para_count < paragraphs.len()).then_some(para_count + 1);
                let neighbours = TableNeighbours {
                    preceding_paragraph_index: preceding,
                    following_paragraph_index: following,
                    preceding_content: preceding.and_then(para_at).map(str::to_string),
                    following_content: following.and_then(para_at).map(str::to_string),
                };
                let context =
                    table_context(neighbours.preceding_content.as_deref(), neighbours.following_content.as_deref());
                let source = TableSource {
                    doc_id,
                    table_id: table_id.clone(),
                    sheet: None,
                    grid: &expanded.grid,
                    neighbours,
                    context: context.clone(),
                    sheet_offset: None,
                };
                out.extend(build_table_chunks(source, cfg));
                for (row, col, rel) in &expanded.images {
                    let anchor = ImageAnchor::TableCell { table_id: table_id.clone(), row: *row, col: *col };
                    images.push(&mut out, doc_id, rel, anchor, context.clone());
                }
            }
        }
    }
    out
}

struct ImageCollector<'a> {
    rels: &'a HashMap<String, String>,
    seen: HashSet<String>,
    count: usize,
}

impl ImageCollector<'_> {
    fn push(&mut self, out: &mut Vec<Chunk>, doc_id: &DocumentId, rel: &str, anchor: ImageAnchor, context: String) {
        if !self.seen.insert(rel.to_string()) {
            return;
        }
        let Some(target) = self.rels.get(rel) else {
            debug!(rel, "image relationship not found, skipping");
            return;
        };
        self.count += 1;
        let meta = ImageMeta {
            image_index: self.count,
            rel_id: rel.to_string(),
            anchor,
            anchor_index: out.len(),
            original_filename: target.rsplit('/').next().unwrap_or(target).to_string(),
        };
        out.push(Chunk::new(doc_id.clone(), target.clone(), ChunkBody::Image(meta)).with_context(context));
    }
}
