//! Overlapping, boundary-seeking text chunker.
//!
//! Splits a [`RawDocument`]'s text into [`Chunk`]s of at most `chunk_size`
//! characters. Consecutive chunks of the same document share at least
//! `chunk_overlap` characters so that a sentence cut at a chunk edge is still
//! seen whole by one of its neighbours.
//!
//! # Algorithm
//!
//! 1. If the remaining text fits in `chunk_size`, emit it and stop.
//! 2. Otherwise look for the last boundary inside the window
//!    `(start + chunk_overlap, start + chunk_size]` that also lies past the
//!    previous chunk's end, preferring in order:
//!    paragraph break (`\n\n`), sentence end (`.`/`!`/`?` + whitespace),
//!    line break, word break (whitespace). With no boundary, cut hard at
//!    `start + chunk_size`.
//! 3. The next chunk starts `chunk_overlap` characters before the end just
//!    chosen, moved back by at most [`START_SNAP_WINDOW`] characters so it
//!    begins on a word.
//!
//! Offsets and lengths are counted in `char`s, never bytes, so multi-byte
//! text is never split inside a code point. Whitespace-only spans are
//! dropped; chunk indices stay contiguous.
//!
//! # Example
//!
//! ```rust
//! use corpus_rag_core::chunk::chunk_document;
//! use corpus_rag_core::models::RawDocument;
//!
//! let doc = RawDocument {
//!     source_path: "dati/cat.txt".into(),
//!     unit_index: 0,
//!     text: "Cats are mammals. Cats purr.".to_string(),
//! };
//! let chunks = chunk_document(&doc, 1000, 150);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, doc.text);
//! ```

use uuid::Uuid;

use crate::models::{Chunk, RawDocument};

/// Maximum distance a chunk start moves back to land on a word start.
pub const START_SNAP_WINDOW: usize = 16;

/// A half-open `[start, end)` range of character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Compute the chunk spans of `text` without materializing chunks.
///
/// Spans cover the whole text: the first starts at 0, the last ends at the
/// text's character count, and each span after the first starts inside its
/// predecessor.
pub fn split_spans(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    split_char_spans(&chars, chunk_size, chunk_overlap)
}

/// Split one document into chunks.
pub fn chunk_document(doc: &RawDocument, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let source_path = doc.source_path.to_string_lossy().to_string();
    let chars: Vec<char> = doc.text.chars().collect();

    split_char_spans(&chars, chunk_size, chunk_overlap)
        .into_iter()
        .filter(|span| chars[span.start..span.end].iter().any(|c| !c.is_whitespace()))
        .enumerate()
        .map(|(index, span)| Chunk {
            id: chunk_id(&source_path, doc.unit_index, span.start),
            source_path: source_path.clone(),
            unit_index: doc.unit_index,
            chunk_index: index as u32,
            text: chars[span.start..span.end].iter().collect(),
            start_offset: span.start,
            length: span.len(),
        })
        .collect()
}

/// Split every document, preserving document order and chunk order within
/// each document.
pub fn chunk_documents(
    docs: &[RawDocument],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| chunk_document(doc, chunk_size, chunk_overlap))
        .collect()
}

/// Deterministic chunk id: UUIDv5 over source path, unit, and start offset.
pub fn chunk_id(source_path: &str, unit_index: u32, start_offset: usize) -> String {
    let name = format!("{}\u{0}{}\u{0}{}", source_path, unit_index, start_offset);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn split_char_spans(chars: &[char], chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let total = chars.len();
    if total == 0 || chunk_size == 0 {
        return Vec::new();
    }

    // An overlap of a whole chunk would never advance.
    let overlap = chunk_overlap.min(chunk_size - 1);

    let mut spans = Vec::new();
    let mut start = 0;
    let mut covered = 0;
    loop {
        if total - start <= chunk_size {
            spans.push(Span { start, end: total });
            break;
        }

        // Every chunk must reach past its predecessor so the shared
        // substring is whole in both.
        let end = find_break(chars, (start + overlap).max(covered), start + chunk_size);
        spans.push(Span { start, end });

        let lowest = (start + 1).max((end + 1).saturating_sub(chunk_size));
        start = snap_to_word_start(chars, lowest, end - overlap);
        covered = end;
    }

    spans
}

/// Pick the end of the next chunk in `(floor, limit]`.
///
/// Requires `limit < chars.len()`.
fn find_break(chars: &[char], floor: usize, limit: usize) -> usize {
    let paragraph = |end: usize| end >= 2 && chars[end - 2] == '\n' && chars[end - 1] == '\n';
    let sentence = |end: usize| {
        end >= 2 && chars[end - 1].is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?')
    };
    let line = |end: usize| chars[end - 1] == '\n';
    let word = |end: usize| chars[end - 1].is_whitespace();

    let preferences: [&dyn Fn(usize) -> bool; 4] = [&paragraph, &sentence, &line, &word];
    for is_boundary in preferences {
        if let Some(end) = (floor + 1..=limit).rev().find(|&end| is_boundary(end)) {
            return end;
        }
    }

    limit
}

/// Move `target` back onto a word start, never below `lowest`.
fn snap_to_word_start(chars: &[char], lowest: usize, target: usize) -> usize {
    if target == 0 || chars[target - 1].is_whitespace() {
        return target;
    }

    let lowest = lowest.max(target.saturating_sub(START_SNAP_WINDOW));
    (lowest..target)
        .rev()
        .find(|&pos| pos > 0 && chars[pos - 1].is_whitespace())
        .unwrap_or(target)
}
