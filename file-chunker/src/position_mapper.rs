use std::collections::BTreeMap;

use chunk_model::Chunk;
use tracing::debug;

/// Ordinal index between a chunk list and its fragmented successor.
///
/// Everything is keyed by list position; chunk contents are only read while
/// building. Queries before the first build (or after `reset`) return empty
/// results.
#[derive(Debug, Clone, Default)]
pub struct PositionMapper {
    built: bool,
    /// original index -> final index (first fragment for split chunks)
    final_positions: Vec<Option<usize>>,
    /// original index -> final indices of its fragments
    fragment_positions: Vec<Vec<usize>>,
    /// paragraph index -> final indices of every chunk carrying it
    paragraph_members: BTreeMap<usize, Vec<usize>>,
    /// per final index
    fragment_flags: Vec<bool>,
    paragraph_of: Vec<Option<usize>>,
    origin_of: Vec<Option<usize>>,
}

impl PositionMapper {
    pub fn new() -> Self { Self::default() }

    pub fn reset(&mut self) { *self = Self::default(); }

    pub fn is_built(&self) -> bool { self.built }

    /// Rebuilds every map from scratch.
    pub fn build_mapping(&mut self, original: &[Chunk], fragmented: &[Chunk]) {
        self.reset();
        let n = original.len();
        self.final_positions = vec![None; n];
        self.fragment_positions = vec![Vec::new(); n];
        self.origin_of = vec![None; fragmented.len()];

        for (i, chunk) in fragmented.iter().enumerate() {
            self.fragment_flags.push(chunk.is_fragment());
            self.paragraph_of.push(chunk.paragraph_index());
            if let Some(p) = chunk.paragraph_index() {
                self.paragraph_members.entry(p).or_default().push(i);
            }
        }

        // Every original yields either itself or a run of new fragments, in
        // order. Only a fragment standing where a non-fragment original was is
        // new; fragments already present in `original` pass through.
        let mut cursor = 0usize;
        let mut open_run: Option<usize> = None;
        for (i, chunk) in fragmented.iter().enumerate() {
            let lineage = chunk.fragment();
            if let (Some(run), Some(l)) = (open_run, lineage) {
                if l.original_position == run && l.fragment_index > 1 {
                    self.fragment_positions[run].push(i);
                    self.origin_of[i] = Some(run);
                    continue;
                }
            }
            if let Some(run) = open_run.take() {
                cursor = run + 1;
            }
            if cursor >= n {
                break;
            }
            if lineage.is_some() && !original[cursor].is_fragment() {
                self.fragment_positions[cursor].push(i);
                self.final_positions[cursor] = Some(i);
                self.origin_of[i] = Some(cursor);
                open_run = Some(cursor);
            } else {
                self.final_positions[cursor] = Some(i);
                self.origin_of[i] = Some(cursor);
                cursor += 1;
            }
        }

        self.built = true;
        debug!(
            original = n,
            fragmented = fragmented.len(),
            paragraphs = self.paragraph_members.len(),
            "position map built"
        );
    }

    pub fn is_fragment(&self, chunk: &Chunk) -> bool { chunk.is_fragment() }

    pub fn is_fragment_at(&self, final_index: usize) -> bool {
        self.fragment_flags.get(final_index).copied().unwrap_or(false)
    }

    /// Final indices of the fragments cut from `original_position`.
    pub fn fragment_positions(&self, original_position: usize) -> &[usize] {
        self.fragment_positions.get(original_position).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Final indices of every chunk (fragment or not) of a paragraph.
    pub fn paragraph_fragments(&self, paragraph_index: usize) -> &[usize] {
        self.paragraph_members.get(&paragraph_index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Other fragments of the same paragraph, in discovery order.
    pub fn sibling_fragments(&self, final_index: usize) -> Vec<usize> {
        let Some(p) = self.paragraph_of.get(final_index).copied().flatten() else {
            return Vec::new();
        };
        self.paragraph_fragments(p)
            .iter()
            .copied()
            .filter(|&k| k != final_index && self.is_fragment_at(k))
            .collect()
    }

    pub fn final_position(&self, original_position: usize) -> Option<usize> {
        self.final_positions.get(original_position).copied().flatten()
    }

    pub fn original_position(&self, final_index: usize) -> Option<usize> {
        self.origin_of.get(final_index).copied().flatten()
    }

    /// Number of fragments per paragraph that was split.
    pub fn paragraph_fragment_counts(&self) -> BTreeMap<usize, usize> {
        self.paragraph_members
            .iter()
            .map(|(&p, members)| (p, members.iter().filter(|&&k| self.is_fragment_at(k)).count()))
            .filter(|&(_, n)| n > 0)
            .collect()
    }
}
