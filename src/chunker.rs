//! Document chunking.
//!
//! Splits a document into overlapping passages with a layered-separator
//! recursive split: paragraph breaks first, then line breaks, sentence
//! boundaries, spaces, and finally bare character windows. Each separator
//! stays attached to the piece before it, so the pieces concatenate back to
//! the original text with no gaps.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::document::{Document, SourceType};

/// Separator ladder, coarsest first. Runs that none of these break up are
/// split into fixed character windows.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A bounded passage of a document. The unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    /// Char offset of the chunk start within the source document.
    pub offset: usize,
    pub source_type: SourceType,
}

/// An indivisible piece produced by the recursive split, always at most one
/// chunk in size.
struct Piece {
    text: String,
    offset: usize,
    /// Length in chars, cached because it is consulted on every merge step.
    len: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// Split a document into chunks of at most `chunk_size` chars, adjacent
    /// chunks sharing up to `chunk_overlap` chars. Identical input always
    /// yields an identical chunk sequence.
    pub fn split(&self, document: &Document) -> Vec<TextChunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.split_recursive(&document.text, 0, 0, &mut pieces);
        self.merge(pieces, document.source_type)
    }

    fn split_recursive(&self, text: &str, offset: usize, sep_idx: usize, out: &mut Vec<Piece>) {
        let len = text.chars().count();
        if len <= self.chunk_size {
            out.push(Piece {
                text: text.to_string(),
                offset,
                len,
            });
            return;
        }

        if sep_idx >= SEPARATORS.len() {
            // No separator left: cut the run into fixed windows.
            let chars: Vec<char> = text.chars().collect();
            let mut start = 0;
            while start < chars.len() {
                let end = (start + self.chunk_size).min(chars.len());
                out.push(Piece {
                    text: chars[start..end].iter().collect(),
                    offset: offset + start,
                    len: end - start,
                });
                start = end;
            }
            return;
        }

        let sep = SEPARATORS[sep_idx];
        if !text.contains(sep) {
            self.split_recursive(text, offset, sep_idx + 1, out);
            return;
        }

        let mut cursor = offset;
        for segment in text.split_inclusive(sep) {
            let seg_len = segment.chars().count();
            if seg_len <= self.chunk_size {
                out.push(Piece {
                    text: segment.to_string(),
                    offset: cursor,
                    len: seg_len,
                });
            } else {
                self.split_recursive(segment, cursor, sep_idx + 1, out);
            }
            cursor += seg_len;
        }
    }

    /// Pack adjacent pieces into chunks. When a chunk fills up, a tail of
    /// whole pieces totalling at most `chunk_overlap` chars carries over
    /// into the next chunk.
    fn merge(&self, pieces: Vec<Piece>, source_type: SourceType) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut window_len = 0usize;

        for piece in pieces {
            if !window.is_empty() && window_len + piece.len > self.chunk_size {
                chunks.push(Self::chunk_from(&window, source_type));

                while window_len > self.chunk_overlap
                    || (window_len + piece.len > self.chunk_size && window_len > 0)
                {
                    match window.pop_front() {
                        Some(dropped) => window_len -= dropped.len,
                        None => break,
                    }
                }
            }
            window_len += piece.len;
            window.push_back(piece);
        }

        if !window.is_empty() {
            chunks.push(Self::chunk_from(&window, source_type));
        }

        chunks
    }

    fn chunk_from(window: &VecDeque<Piece>, source_type: SourceType) -> TextChunk {
        let mut text = String::new();
        for piece in window {
            text.push_str(&piece.text);
        }
        TextChunk {
            text,
            offset: window.front().map(|p| p.offset).unwrap_or(0),
            source_type,
        }
    }
}
