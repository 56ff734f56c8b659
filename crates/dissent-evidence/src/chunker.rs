//! Overlapping character windows over a document
//!
//! Windows prefer to end on a paragraph break, then a line break, then a
//! space, so snippets rarely cut a sentence mid-word.

use dissent_core::{DocId, Document};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// A span of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: DocId,
    /// Character offset of the span in the source document
    pub start: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    /// Overlap is clamped below the chunk size so every window makes progress
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a document into windows of at most `chunk_size` characters
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        let len = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let hard_end = (start + self.chunk_size).min(len);
            let end = if hard_end == len {
                len
            } else {
                self.soft_break(&chars, start, hard_end)
            };

            // Trim the window, keeping `start` pointing at the first kept char
            let mut s = start;
            while s < end && chars[s].is_whitespace() {
                s += 1;
            }
            let mut e = end;
            while e > s && chars[e - 1].is_whitespace() {
                e -= 1;
            }
            if s < e {
                chunks.push(Chunk {
                    doc_id: document.id,
                    start: s,
                    text: chars[s..e].iter().collect(),
                });
            }

            if end >= len {
                break;
            }
            let mut next = end.saturating_sub(self.chunk_overlap).max(start + 1);
            // Do not resume mid-word
            while next < end && next > 0 && !chars[next - 1].is_whitespace() {
                next += 1;
            }
            start = next;
        }

        chunks
    }

    /// Latest separator in the back half of the window, else the hard end
    fn soft_break(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = start + self.chunk_size / 2;
        let window = &chars[floor.min(hard_end)..hard_end];

        let find = |pred: &dyn Fn(usize) -> bool| {
            (0..window.len()).rev().find(|&i| pred(i)).map(|i| floor + i + 1)
        };

        find(&|i| window[i] == '\n' && i > 0 && window[i - 1] == '\n')
            .or_else(|| find(&|i| window[i] == '\n'))
            .or_else(|| find(&|i| window[i] == ' '))
            .unwrap_or(hard_end)
    }
}

/// Collapse whitespace and cap at `limit` characters for event messages
pub fn compact(text: &str, limit: usize) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() <= limit {
        return cleaned;
    }
    let head: String = cleaned.chars().take(limit.saturating_sub(3)).collect();
    format!("{}...", head.trim_end())
}
