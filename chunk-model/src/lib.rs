//! Shared models used across crates

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Written as `schema_version` by [`Chunk::metadata_json`].
pub const SCHEMA_MAJOR: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub String);

/// Variant tag exposed to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Text,
    TableFull,
    TableRow,
    Image,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Text => "text",
            ChunkKind::TableFull => "table_full",
            ChunkKind::TableRow => "table_row",
            ChunkKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    #[default]
    Markdown,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeType {
    Horizontal,
    Vertical,
    Both,
}

/// One merged region of a table grid. Coordinates are 0-based and relative to the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeDescriptor {
    pub row: usize,
    pub col: usize,
    pub rowspan: usize,
    pub colspan: usize,
    pub text: String,
    pub merge_type: MergeType,
}

impl MergeDescriptor {
    /// Returns `None` for degenerate spans (zero rows or columns) and for plain 1x1 cells.
    pub fn new(row: usize, col: usize, rowspan: usize, colspan: usize, text: impl Into<String>) -> Option<Self> {
        let merge_type = match (rowspan, colspan) {
            (0, _) | (_, 0) | (1, 1) => return None,
            (1, _) => MergeType::Horizontal,
            (_, 1) => MergeType::Vertical,
            _ => MergeType::Both,
        };
        Some(Self { row, col, rowspan, colspan, text: text.into(), merge_type })
    }

    /// True iff `(row, col)` is the top-left cell of this span.
    pub fn is_merge_start(&self, row: usize, col: usize) -> bool {
        self.row == row && self.col == col && (self.rowspan > 1 || self.colspan > 1)
    }

    pub fn covers(&self, row: usize, col: usize) -> bool {
        row >= self.row && row < self.row + self.rowspan && col >= self.col && col < self.col + self.colspan
    }
}

impl std::fmt::Display for MergeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}C{} {}x{} '{}'", self.row + 1, self.col + 1, self.rowspan, self.colspan, self.text)
    }
}

/// Lineage of a fragment back to the oversized text chunk it was cut from.
/// Positions are counted in chars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentLineage {
    pub paragraph_index: Option<usize>,
    pub fragment_index: usize,
    pub total_fragments: usize,
    pub original_content: String,
    pub original_position: usize,
    /// `None` when the fragment text could not be found verbatim in the original.
    pub start_pos: Option<usize>,
    pub end_pos: usize,
}

impl FragmentLineage {
    pub fn parent_paragraph_id(&self) -> String {
        match self.paragraph_index {
            Some(idx) => format!("para_{}", idx),
            None => "para_unknown".to_string(),
        }
    }
}

/// Placement data shared by a table and its rows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableAnchor {
    pub table_id: String,
    pub sheet: Option<String>,
    pub header: Vec<String>,
    pub table_format: TableFormat,
    pub parent_table_info: String,
    pub preceding_paragraph_index: Option<usize>,
    pub following_paragraph_index: Option<usize>,
    pub preceding_paragraph_content: Option<String>,
    pub following_paragraph_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub anchor: TableAnchor,
    pub header_rows: usize,
    pub merged_cells: Vec<MergeDescriptor>,
    /// Sheet rows (0-based, inclusive) for spreadsheet blocks.
    pub start_row: Option<usize>,
    pub end_row: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRowMeta {
    pub anchor: TableAnchor,
    /// 1-based row number (within the table for documents, within the sheet for workbooks).
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageAnchor {
    Paragraph { paragraph_index: usize },
    TableCell { table_id: String, row: usize, col: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub image_index: usize,
    pub rel_id: String,
    pub anchor: ImageAnchor,
    /// Position in the raw chunk list at the time the image was inserted.
    pub anchor_index: usize,
    pub original_filename: String,
}

/// Kind-specific payload of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkBody {
    Text { paragraph_index: Option<usize> },
    Fragment(FragmentLineage),
    TableFull(TableMeta),
    TableRow(TableRowMeta),
    Image(ImageMeta),
}

impl ChunkBody {
    pub fn kind(&self) -> ChunkKind {
        match self {
            ChunkBody::Text { .. } | ChunkBody::Fragment(_) => ChunkKind::Text,
            ChunkBody::TableFull(_) => ChunkKind::TableFull,
            ChunkBody::TableRow(_) => ChunkKind::TableRow,
            ChunkBody::Image(_) => ChunkKind::Image,
        }
    }

    pub fn paragraph_index(&self) -> Option<usize> {
        match self {
            ChunkBody::Text { paragraph_index } => *paragraph_index,
            ChunkBody::Fragment(lineage) => lineage.paragraph_index,
            _ => None,
        }
    }

    pub fn table_anchor(&self) -> Option<&TableAnchor> {
        match self {
            ChunkBody::TableFull(meta) => Some(&meta.anchor),
            ChunkBody::TableRow(meta) => Some(&meta.anchor),
            _ => None,
        }
    }
}

/// LLM-derived annotations attached after chunking.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Enrichment {
    pub description: String,
    pub keywords: Vec<String>,
}

/// Atomic retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: Option<ChunkId>,
    pub doc_id: DocumentId,
    pub content: String,
    pub context: String,
    pub body: ChunkBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
}

impl Chunk {
    pub fn new(doc_id: DocumentId, content: impl Into<String>, body: ChunkBody) -> Self {
        Self { chunk_id: None, doc_id, content: content.into(), context: String::new(), body, enrichment: None }
    }

    pub fn text(doc_id: DocumentId, content: impl Into<String>, paragraph_index: Option<usize>) -> Self {
        Self::new(doc_id, content, ChunkBody::Text { paragraph_index })
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn kind(&self) -> ChunkKind { self.body.kind() }

    pub fn is_fragment(&self) -> bool { matches!(self.body, ChunkBody::Fragment(_)) }

    pub fn paragraph_index(&self) -> Option<usize> { self.body.paragraph_index() }

    pub fn fragment(&self) -> Option<&FragmentLineage> {
        match &self.body {
            ChunkBody::Fragment(lineage) => Some(lineage),
            _ => None,
        }
    }

    /// Owning table for row chunks.
    pub fn parent_id(&self) -> Option<&str> {
        match &self.body {
            ChunkBody::TableRow(meta) => Some(meta.anchor.table_id.as_str()),
            _ => None,
        }
    }

    /// Flat key/value view with the well-known metadata keys, for stores that
    /// only accept an open map next to the vector.
    pub fn metadata_json(&self) -> Value {
        let mut m = Map::new();
        m.insert("type".into(), json!(self.kind().as_str()));
        m.insert("schema_version".into(), json!(SCHEMA_MAJOR));
        m.insert("doc_id".into(), json!(self.doc_id.0));
        if let Some(id) = &self.chunk_id {
            m.insert("chunk_id".into(), json!(id.0));
        }
        match &self.body {
            ChunkBody::Text { paragraph_index } => {
                if let Some(idx) = paragraph_index {
                    m.insert("paragraph_index".into(), json!(idx));
                }
                m.insert("is_fragment".into(), json!(false));
            }
            ChunkBody::Fragment(f) => {
                if let Some(idx) = f.paragraph_index {
                    m.insert("paragraph_index".into(), json!(idx));
                }
                m.insert("is_fragment".into(), json!(true));
                m.insert("fragment_index".into(), json!(f.fragment_index));
                m.insert("total_fragments".into(), json!(f.total_fragments));
                m.insert("original_content".into(), json!(f.original_content));
                m.insert("original_position".into(), json!(f.original_position));
                m.insert("parent_paragraph_id".into(), json!(f.parent_paragraph_id()));
                let start = f.start_pos.map(|p| p as i64).unwrap_or(-1);
                m.insert("fragment_start_pos".into(), json!(start));
                m.insert("fragment_end_pos".into(), json!(f.end_pos));
            }
            ChunkBody::TableFull(t) => {
                insert_anchor(&mut m, &t.anchor);
                m.insert("header_rows".into(), json!(t.header_rows));
                m.insert("merged_cells".into(), json!(t.merged_cells));
                if let Some(r) = t.start_row {
                    m.insert("start_row".into(), json!(r));
                }
                if let Some(r) = t.end_row {
                    m.insert("end_row".into(), json!(r));
                }
            }
            ChunkBody::TableRow(r) => {
                insert_anchor(&mut m, &r.anchor);
                m.insert("row".into(), json!(r.row));
                m.insert("parent_id".into(), json!(r.anchor.table_id));
            }
            ChunkBody::Image(img) => {
                m.insert("image_index".into(), json!(img.image_index));
                m.insert("rel_id".into(), json!(img.rel_id));
                m.insert("anchor".into(), json!(img.anchor));
                m.insert("anchor_index".into(), json!(img.anchor_index));
                m.insert("original_filename".into(), json!(img.original_filename));
            }
        }
        if let Some(e) = &self.enrichment {
            m.insert("description".into(), json!(e.description));
            m.insert("keywords".into(), json!(e.keywords));
        }
        Value::Object(m)
    }
}

fn insert_anchor(m: &mut Map<String, Value>, a: &TableAnchor) {
    m.insert("table_id".into(), json!(a.table_id));
    if let Some(sheet) = &a.sheet {
        m.insert("sheet".into(), json!(sheet));
    }
    m.insert("header".into(), json!(a.header));
    m.insert("table_format".into(), json!(a.table_format));
    m.insert("parent_table_info".into(), json!(a.parent_table_info));
    if let Some(i) = a.preceding_paragraph_index {
        m.insert("preceding_paragraph_index".into(), json!(i));
    }
    if let Some(i) = a.following_paragraph_index {
        m.insert("following_paragraph_index".into(), json!(i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_descriptor_rejects_degenerate_spans() {
        assert!(MergeDescriptor::new(0, 0, 0, 2, "x").is_none());
        assert!(MergeDescriptor::new(0, 0, 1, 1, "x").is_none());
        let m = MergeDescriptor::new(0, 1, 1, 2, "Revenue").expect("1x2 span is a merge");
        assert_eq!(m.merge_type, MergeType::Horizontal);
        assert!(m.is_merge_start(0, 1));
        assert!(!m.is_merge_start(0, 2));
        assert!(m.covers(0, 2));
    }

    #[test]
    fn fragment_metadata_uses_minus_one_for_unknown_start() {
        let lineage = FragmentLineage {
            paragraph_index: None,
            fragment_index: 1,
            total_fragments: 2,
            original_content: "abc".into(),
            original_position: 0,
            start_pos: None,
            end_pos: 3,
        };
        let chunk = Chunk::new(DocumentId("d".into()), "abc", ChunkBody::Fragment(lineage));
        let meta = chunk.metadata_json();
        assert_eq!(meta["fragment_start_pos"], json!(-1));
        assert_eq!(meta["parent_paragraph_id"], json!("para_unknown"));
        assert_eq!(meta["type"], json!("text"));
        assert_eq!(meta["schema_version"], json!(SCHEMA_MAJOR));
    }
}
