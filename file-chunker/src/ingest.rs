//! Hand-off of finished chunks to enrichment, embedding and vector storage.
//!
//! The collaborators are traits so callers can plug in any LLM or store client.

use chunk_model::{Chunk, ChunkBody, ChunkKind, Enrichment};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::IngestError;

/// Produces a description and keywords for a chunk (usually an LLM call).
pub trait ChunkEnricher: Send + Sync {
    fn enrich(&self, chunk: &Chunk) -> Result<Enrichment, IngestError>;
}

pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, IngestError>;
}

/// Destination of (vector, chunk) pairs; returns how many were stored.
pub trait VectorSink {
    fn upsert(&mut self, collection: &str, items: &[(Vec<f32>, Chunk)]) -> Result<usize, IngestError>;
}

pub fn collection_name(kb_id: u64) -> String { format!("Kb_{}", kb_id) }

/// Text handed to the embedder for a chunk.
pub fn embedding_text(chunk: &Chunk) -> String {
    let (description, keywords) = match &chunk.enrichment {
        Some(e) => (e.description.trim(), e.keywords.join(", ")),
        None => ("", String::new()),
    };
    let mut parts: Vec<String> = Vec::new();
    match chunk.kind() {
        ChunkKind::Image => {
            if !description.is_empty() {
                parts.push(format!("Image description: {}", description));
            }
            if !keywords.is_empty() {
                parts.push(format!("Keywords: {}", keywords));
            }
            if parts.is_empty() {
                match &chunk.body {
                    ChunkBody::Image(meta) if !meta.original_filename.is_empty() => {
                        parts.push(format!("Image file: {}", meta.original_filename))
                    }
                    _ => parts.push("Image".to_string()),
                }
            }
        }
        ChunkKind::TableFull | ChunkKind::TableRow => {
            if !description.is_empty() {
                parts.push(description.to_string());
            }
            if !keywords.is_empty() {
                parts.push(keywords);
            }
            if parts.is_empty() {
                parts.push(chunk.content.clone());
            }
        }
        ChunkKind::Text => {
            parts.push(chunk.content.clone());
            if !description.is_empty() {
                parts.push(description.to_string());
            }
            if !keywords.is_empty() {
                parts.push(keywords);
            }
        }
    }
    parts.join("\n")
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub total_chunks: usize,
    pub enriched: usize,
    pub enrichment_failures: usize,
    pub embedded: usize,
    pub embedding_failures: usize,
    pub stored: usize,
}

/// Enrich (non-image chunks), embed and store. Per-chunk enrichment or
/// embedding failures are logged and counted; a sink failure aborts.
pub fn ingest_chunks(
    chunks: Vec<Chunk>,
    kb_id: u64,
    enricher: Option<&dyn ChunkEnricher>,
    embedder: &dyn Embedder,
    sink: &mut dyn VectorSink,
) -> Result<IngestReport, IngestError> {
    let mut report = IngestReport { total_chunks: chunks.len(), ..Default::default() };

    let processed: Vec<(Chunk, Option<bool>, Result<Vec<f32>, IngestError>)> = chunks
        .into_par_iter()
        .map(|mut chunk| {
            let enriched = match enricher {
                Some(e) if chunk.kind() != ChunkKind::Image => match e.enrich(&chunk) {
                    Ok(annotation) => {
                        chunk.enrichment = Some(annotation);
                        Some(true)
                    }
                    Err(err) => {
                        warn!(chunk = ?chunk.chunk_id, error = %err, "enrichment failed, continuing without it");
                        Some(false)
                    }
                },
                _ => None,
            };
            let vector = embedder.embed(&embedding_text(&chunk));
            (chunk, enriched, vector)
        })
        .collect();

    let mut items = Vec::with_capacity(processed.len());
    for (chunk, enriched, vector) in processed {
        match enriched {
            Some(true) => report.enriched += 1,
            Some(false) => report.enrichment_failures += 1,
            None => {}
        }
        match vector {
            Ok(v) => {
                report.embedded += 1;
                items.push((v, chunk));
            }
            Err(err) => {
                report.embedding_failures += 1;
                warn!(chunk = ?chunk.chunk_id, error = %err, "embedding failed, chunk skipped");
            }
        }
    }

    let collection = collection_name(kb_id);
    if !items.is_empty() {
        report.stored = sink.upsert(&collection, &items)?;
    }
    info!(collection = %collection, ?report, "ingest finished");
    Ok(report)
}
