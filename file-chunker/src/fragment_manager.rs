use std::collections::BTreeMap;

use chunk_model::{Chunk, ChunkBody, ChunkKind, FragmentLineage};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::FragmentConfig;
use crate::context_rebuilder::ContextRebuilder;
use crate::error::{ConfigurationError, SplitError};
use crate::position_mapper::PositionMapper;
use crate::text_splitter::{Chunker, TextSplitter};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FragmentStatistics {
    pub total_chunks: usize,
    pub original_chunks: usize,
    pub fragment_chunks: usize,
    pub fragmented_paragraphs: usize,
    pub paragraph_fragments: BTreeMap<usize, usize>,
}

/// Splits oversized text chunks into fragments and re-contextualizes the result.
///
/// Each `process_chunks` call runs two phases: a per-chunk split (parallel,
/// failures keep the chunk as-is) followed by a sequential mapping and
/// context pass over the complete list.
pub struct FragmentManager {
    config: FragmentConfig,
    splitter: Box<dyn TextSplitter>,
    mapper: PositionMapper,
    rebuilder: ContextRebuilder,
}

impl std::fmt::Debug for FragmentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentManager").field("config", &self.config).field("mapper", &self.mapper).finish()
    }
}

impl FragmentManager {
    pub fn new(config: FragmentConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let chunker = Chunker::new(config.max_chunk_size, config.chunk_overlap)?;
        Self::with_splitter(config, Box::new(chunker))
    }

    /// Uses a custom splitter instead of the punctuation-aware [`Chunker`].
    pub fn with_splitter(config: FragmentConfig, splitter: Box<dyn TextSplitter>) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config, splitter, mapper: PositionMapper::new(), rebuilder: ContextRebuilder::new() })
    }

    pub fn config(&self) -> &FragmentConfig { &self.config }

    pub fn position_mapper(&self) -> &PositionMapper { &self.mapper }

    pub fn process_chunks(&mut self, chunks: Vec<Chunk>) -> Vec<Chunk> {
        self.mapper.reset();
        if !self.config.enable_fragmentation {
            info!(chunks = chunks.len(), "fragmentation disabled, returning chunks unchanged");
            return chunks;
        }
        info!(chunks = chunks.len(), "fragmentation started");

        let pieces: Vec<Vec<Chunk>> =
            chunks.par_iter().enumerate().map(|(pos, chunk)| self.fragment_or_keep(chunk, pos)).collect();
        let mut fragmented: Vec<Chunk> = pieces.into_iter().flatten().collect();

        self.mapper.build_mapping(&chunks, &fragmented);

        if self.config.enable_context_rebuild {
            self.rebuild_contexts(&mut fragmented);
        }
        info!(chunks = fragmented.len(), "fragmentation finished");
        fragmented
    }

    fn should_fragment(&self, chunk: &Chunk) -> bool {
        matches!(chunk.body, ChunkBody::Text { .. }) && chunk.content.chars().count() > self.config.max_chunk_size
    }

    /// Never loses content: any failure or an all-too-small split keeps the chunk.
    fn fragment_or_keep(&self, chunk: &Chunk, original_position: usize) -> Vec<Chunk> {
        if !self.should_fragment(chunk) {
            return vec![chunk.clone()];
        }
        match self.fragment_chunk(chunk, original_position) {
            Ok(Some(fragments)) => fragments,
            Ok(None) => {
                warn!(position = original_position, "no fragment reached the minimum size, keeping original chunk");
                vec![chunk.clone()]
            }
            Err(e) => {
                warn!(position = original_position, error = %e, "fragmentation failed, keeping original chunk");
                vec![chunk.clone()]
            }
        }
    }

    fn fragment_chunk(&self, chunk: &Chunk, original_position: usize) -> Result<Option<Vec<Chunk>>, SplitError> {
        let pieces = self.splitter.split_text(&chunk.content)?;
        let kept: Vec<String> =
            pieces.into_iter().filter(|p| p.trim().chars().count() >= self.config.min_fragment_size).collect();
        if kept.is_empty() {
            return Ok(None);
        }
        let total = kept.len();
        debug!(position = original_position, fragments = total, "chunk fragmented");
        Ok(Some(
            kept.into_iter()
                .enumerate()
                .map(|(i, piece)| make_fragment(chunk, piece, i + 1, total, original_position))
                .collect(),
        ))
    }

    fn rebuild_contexts(&self, chunks: &mut [Chunk]) {
        let view: &[Chunk] = chunks;
        let contexts: Vec<(usize, String)> = (0..view.len())
            .filter(|&i| self.mapper.is_fragment_at(i))
            .map(|i| (i, self.rebuilder.rebuild_fragment_context(i, view, &self.mapper)))
            .collect();
        for (i, context) in contexts {
            chunks[i].context = context;
        }

        let tables: Vec<usize> = chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c.kind(), ChunkKind::TableFull | ChunkKind::TableRow))
            .map(|(i, _)| i)
            .collect();
        if !tables.is_empty() {
            self.rebuilder.update_table_context_for_fragments(&tables, chunks, &self.mapper);
        }
    }

    /// Counts derived from the chunk list and the last position map.
    pub fn fragment_statistics(&self, chunks: &[Chunk]) -> FragmentStatistics {
        let mut paragraph_fragments: BTreeMap<usize, usize> = BTreeMap::new();
        let mut fragment_chunks = 0usize;
        for chunk in chunks.iter().filter(|c| self.mapper.is_fragment(c)) {
            fragment_chunks += 1;
            if let Some(p) = chunk.paragraph_index() {
                *paragraph_fragments.entry(p).or_default() += 1;
            }
        }
        FragmentStatistics {
            total_chunks: chunks.len(),
            original_chunks: chunks.len() - fragment_chunks,
            fragment_chunks,
            fragmented_paragraphs: paragraph_fragments.len(),
            paragraph_fragments,
        }
    }
}

fn make_fragment(original: &Chunk, piece: String, index: usize, total: usize, original_position: usize) -> Chunk {
    let piece_len = piece.chars().count();
    let start_pos = original.content.find(piece.as_str()).map(|byte| original.content[..byte].chars().count());
    let end_pos = match start_pos {
        Some(start) => start + piece_len,
        None => piece_len,
    };
    let lineage = FragmentLineage {
        paragraph_index: original.paragraph_index(),
        fragment_index: index,
        total_fragments: total,
        original_content: original.content.clone(),
        original_position,
        start_pos,
        end_pos,
    };
    Chunk::new(original.doc_id.clone(), piece, ChunkBody::Fragment(lineage)).with_context(original.context.clone())
}
