use std::ops::Range;

use crate::error::{ConfigurationError, SplitError};

/// How far (in chars) around the target cut the boundary search may look.
pub const BOUNDARY_SEARCH_WINDOW: usize = 100;

/// Anything that can cut a text into overlapping pieces.
pub trait TextSplitter: Send + Sync {
    fn split_text(&self, text: &str) -> Result<Vec<String>, SplitError>;
}

/// Boundary strength of a char; 0 means "not a boundary".
pub fn boundary_priority(ch: char) -> u8 {
    match ch {
        '\n' => 4,
        '。' | '！' | '？' | ')' | '）' | '!' | '?' => 3,
        ';' | '；' | '…' | ':' | '：' => 2,
        ',' | '，' | '\t' | ' ' | '.' => 1,
        _ => 0,
    }
}

/// Punctuation-aware splitter working on char counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigurationError> {
        let mut violations = Vec::new();
        if chunk_size == 0 {
            violations.push("chunk_size must be greater than 0".to_string());
        }
        if chunk_overlap >= chunk_size {
            violations.push(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            ));
        }
        if !violations.is_empty() {
            return Err(ConfigurationError::Invalid { violations });
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn chunk_overlap(&self) -> usize { self.chunk_overlap }

    /// Char ranges of every piece, blank ones included. Consecutive ranges
    /// never leave a gap and the last one ends at the text length.
    pub fn split_spans(&self, chars: &[char]) -> Vec<Range<usize>> {
        let n = chars.len();
        if n == 0 {
            return Vec::new();
        }
        if n <= self.chunk_size {
            return vec![0..n];
        }

        let mut spans = Vec::new();
        let mut start = 0usize;
        while start < n {
            let end = (start + self.chunk_size).min(n);
            let best_end = if end < n { self.find_cut(chars, start, end) } else { end };

            spans.push(start..best_end);
            if best_end >= n {
                break;
            }
            start = self.next_start(chars, start, best_end);
        }
        spans
    }

    /// Best cut at or before `end`; falls forward to the next whitespace if the
    /// window holds no boundary at all.
    fn find_cut(&self, chars: &[char], start: usize, end: usize) -> usize {
        let n = chars.len();
        let search_start = end.saturating_sub(BOUNDARY_SEARCH_WINDOW).max(start);
        let mut best_end = end;
        let mut best_score = 0u8;
        for i in (search_start..end).rev() {
            let score = boundary_priority(chars[i]);
            if score > best_score {
                best_score = score;
                best_end = i + 1;
                if score >= 3 {
                    break;
                }
            }
        }
        if best_score == 0 {
            let search_end = (end + BOUNDARY_SEARCH_WINDOW).min(n);
            for i in end..search_end {
                if chars[i].is_whitespace() || i + 1 >= n {
                    return i + 1;
                }
            }
        }
        best_end
    }

    /// Start of the next piece. Without a boundary inside the overlap region
    /// that lands after `start`, the overlap is dropped so the loop always advances.
    fn next_start(&self, chars: &[char], start: usize, best_end: usize) -> usize {
        let region_start = best_end.saturating_sub(self.chunk_overlap).max(start);
        let mut candidate = best_end.saturating_sub(self.chunk_overlap);
        let mut best_score = 0u8;
        for i in (region_start..best_end).rev() {
            let score = boundary_priority(chars[i]);
            if score > best_score {
                best_score = score;
                candidate = i + 1;
                if score == 3 {
                    break;
                }
            }
        }
        if candidate <= start { best_end } else { candidate }
    }
}

impl TextSplitter for Chunker {
    fn split_text(&self, text: &str) -> Result<Vec<String>, SplitError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return Ok(vec![text.to_string()]);
        }
        Ok(self
            .split_spans(&chars)
            .into_iter()
            .map(|r| chars[r].iter().collect::<String>())
            .filter(|piece| !piece.trim().is_empty())
            .collect())
    }
}
