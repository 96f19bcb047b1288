pub mod config;
pub mod context_rebuilder;
pub mod error;
pub mod fragment_manager;
pub mod ingest;
pub mod position_mapper;
pub mod reader_docx;
pub mod reader_excel;
pub mod table;
pub mod text_splitter;

use std::path::Path;

use chunk_model::{Chunk, ChunkId, DocumentId};
use tracing::info;

pub use config::{FragmentConfig, PipelineConfig, TableChunkingStrategy, TableProcessingConfig};
pub use error::{ChunkFileError, ConfigurationError};
pub use fragment_manager::{FragmentManager, FragmentStatistics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeFormat {
    Docx,
    Xlsx,
}

/// Format from the file extension; `.doc` is recognised but not readable.
pub fn detect_format(path: &str) -> Result<OfficeFormat, ChunkFileError> {
    let ext = Path::new(path).extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "docx" => Ok(OfficeFormat::Docx),
        "xlsx" => Ok(OfficeFormat::Xlsx),
        "doc" => Err(error::ReaderError::Unsupported("legacy .doc, convert to .docx first".into()).into()),
        other => Err(error::ReaderError::Unsupported(format!("extension '{}'", other)).into()),
    }
}

/// Result bundle of one document.
#[derive(Debug, Clone)]
pub struct ChunkOutput {
    pub doc_id: DocumentId,
    pub chunks: Vec<Chunk>,
    /// `None` when fragmentation is disabled.
    pub stats: Option<FragmentStatistics>,
}

/// Reads, fragments and numbers the chunks of an office file.
pub fn chunk_office_file(path: &str, config: &PipelineConfig) -> Result<ChunkOutput, ChunkFileError> {
    let format = detect_format(path)?;
    let doc_id = DocumentId(
        Path::new(path).file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.to_string()),
    );
    let mut manager = FragmentManager::new(config.fragmentation.clone())?;

    let raw = match format {
        OfficeFormat::Docx => reader_docx::read_docx_to_chunks(path, &doc_id, &config.table_processing)?,
        OfficeFormat::Xlsx => reader_excel::read_xlsx_to_chunks(path, &doc_id, &config.table_processing)?,
    };
    let raw_count = raw.len();
    let mut chunks = manager.process_chunks(raw);
    let stats = config.fragmentation.enable_fragmentation.then(|| manager.fragment_statistics(&chunks));
    assign_chunk_ids(&doc_id, &mut chunks);

    info!(path, raw = raw_count, chunks = chunks.len(), "document chunked");
    Ok(ChunkOutput { doc_id, chunks, stats })
}

/// `{doc_id}_{ordinal}` with a 1-based ordinal over the final list.
pub fn assign_chunk_ids(doc_id: &DocumentId, chunks: &mut [Chunk]) {
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.chunk_id = Some(ChunkId(format!("{}_{}", doc_id.0, i + 1)));
    }
}
