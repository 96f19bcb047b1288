use chunk_model::Chunk;

use crate::position_mapper::PositionMapper;
use crate::table::chunks::table_context;

/// Chars of each sibling fragment quoted in a fragment's context.
pub const SIBLING_PREVIEW_CHARS: usize = 50;

/// Recomputes `context` strings once the final chunk list is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextRebuilder;

impl ContextRebuilder {
    pub fn new() -> Self { Self }

    /// Context for the chunk at `index`. Chunks without a paragraph index keep
    /// their current context.
    pub fn rebuild_fragment_context(&self, index: usize, all_chunks: &[Chunk], mapper: &PositionMapper) -> String {
        let Some(chunk) = all_chunks.get(index) else {
            return String::new();
        };
        let Some(paragraph) = chunk.paragraph_index() else {
            return chunk.context.clone();
        };

        let original_context = all_chunks
            .iter()
            .find(|c| c.paragraph_index() == Some(paragraph) && !c.is_fragment())
            .map(|c| c.context.as_str())
            .unwrap_or("");

        let (fragment_index, total) = chunk.fragment().map(|f| (f.fragment_index, f.total_fragments)).unwrap_or((1, 1));

        let siblings: Vec<String> = mapper
            .sibling_fragments(index)
            .into_iter()
            .filter_map(|k| all_chunks.get(k))
            .filter_map(|c| {
                let f = c.fragment()?;
                let preview: String = c.content.chars().take(SIBLING_PREVIEW_CHARS).collect();
                Some(format!("Fragment{}: {}...", f.fragment_index, preview))
            })
            .collect();

        format!("{} Fragment {}/{} {}", original_context, fragment_index, total, siblings.join("; "))
    }

    /// Rewrites the context of the table chunks at `table_indices` from the
    /// (possibly fragmented) paragraphs recorded as their neighbours.
    ///
    /// Tables with neither a preceding nor a following paragraph index (every
    /// spreadsheet table) keep their existing context, which describes the
    /// neighbouring blocks of the sheet rather than paragraphs.
    pub fn update_table_context_for_fragments(
        &self,
        table_indices: &[usize],
        all_chunks: &mut [Chunk],
        mapper: &PositionMapper,
    ) {
        for &idx in table_indices {
            let Some(anchor) = all_chunks.get(idx).and_then(|c| c.body.table_anchor()) else {
                continue;
            };
            let (preceding, following) = (anchor.preceding_paragraph_index, anchor.following_paragraph_index);
            if preceding.is_none() && following.is_none() {
                continue;
            }
            let preceding = self.paragraph_text(preceding, all_chunks, mapper);
            let following = self.paragraph_text(following, all_chunks, mapper);
            all_chunks[idx].context = table_context(Some(&preceding), Some(&following));
        }
    }

    fn paragraph_text(&self, paragraph: Option<usize>, all_chunks: &[Chunk], mapper: &PositionMapper) -> String {
        let Some(p) = paragraph else {
            return String::new();
        };
        mapper
            .paragraph_fragments(p)
            .iter()
            .filter_map(|&k| all_chunks.get(k))
            .map(|c| match c.fragment() {
                Some(f) => format!("[Fragment{}] {}", f.fragment_index, c.content),
                None => c.content.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
