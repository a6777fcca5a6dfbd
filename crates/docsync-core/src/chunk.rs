//! Paragraph-boundary text chunker with trailing overlap.
//!
//! Splits a document body into [`Chunk`]s of roughly `chunk_size`
//! characters. Paragraphs (separated by blank lines) are never cut, so a
//! single paragraph longer than `chunk_size` becomes one oversized chunk.
//! Every chunk after the first is seeded with the last `overlap`
//! characters of the buffer that produced its predecessor.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` and drop blank paragraphs.
//! 2. Append paragraphs to a buffer, joined by `\n\n`.
//! 3. When the buffer is non-empty and `len(buffer) + len(paragraph)`
//!    exceeds `chunk_size`, flush the buffer (trimmed) as a chunk and
//!    re-seed it with its own last `overlap` characters before appending
//!    the paragraph.
//! 4. Flush whatever remains at the end.
//!
//! Lengths are counted in Unicode scalar values, never bytes, so overlap
//! slicing always lands on a character boundary.
//!
//! The overlap is cut from the buffer before it is trimmed. When the last
//! paragraph of a chunk ends in whitespace, that whitespace counts toward
//! the overlap, so the next chunk carries fewer than `overlap` visible
//! characters of its predecessor.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::chunk::Chunker;
//!
//! let chunks = Chunker::default().split("Hello world.\n\nSecond paragraph.", "hello", "Hello");
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use crate::models::Chunk;

/// Default maximum chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters carried over between chunks.
pub const DEFAULT_OVERLAP: usize = 200;

const PARAGRAPH_BREAK: &str = "\n\n";

/// Splits document bodies into overlapping, paragraph-aligned chunks.
///
/// Output is a pure function of `(text, chunk_size, overlap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP)
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunks tagged with `doc_id` and `title`.
    ///
    /// # Guarantees
    ///
    /// - Chunk indices are contiguous: `0, 1, …, N-1`.
    /// - Every non-blank paragraph appears whole in at least one chunk.
    /// - Blank or empty text yields no chunks.
    pub fn split(&self, text: &str, doc_id: &str, title: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut buf = String::new();
        let mut buf_chars = 0usize;

        for para in text.split(PARAGRAPH_BREAK) {
            if para.trim().is_empty() {
                continue;
            }
            let para_chars = para.chars().count();

            if !buf.is_empty() && buf_chars + para_chars > self.chunk_size {
                chunks.push(make_chunk(doc_id, title, chunks.len(), &buf));

                let tail = tail_chars(&buf, self.overlap).to_string();
                buf_chars = tail.chars().count();
                buf = tail;
            }

            if !buf.is_empty() {
                buf.push_str(PARAGRAPH_BREAK);
                buf_chars += PARAGRAPH_BREAK.len();
            }
            buf.push_str(para);
            buf_chars += para_chars;
        }

        if !buf.trim().is_empty() {
            chunks.push(make_chunk(doc_id, title, chunks.len(), &buf));
        }

        chunks
    }
}

/// The last `n` characters of `s` (all of `s` when it is shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn make_chunk(doc_id: &str, title: &str, index: usize, text: &str) -> Chunk {
    Chunk {
        text: text.trim().to_string(),
        doc_id: doc_id.to_string(),
        title: title.to_string(),
        chunk_index: index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(c: char, len: usize) -> String {
        std::iter::repeat(c).take(len).collect()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = Chunker::default().split("Hello, world!", "doc1", "Doc");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].doc_id, "doc1");
        assert_eq!(chunks[0].title, "Doc");
    }

    #[test]
    fn test_empty_and_blank_text() {
        assert!(Chunker::default().split("", "doc1", "Doc").is_empty());
        assert!(Chunker::default().split("  \n\n \n\n\t", "doc1", "Doc").is_empty());
    }

    #[test]
    fn test_paragraphs_joined_under_limit() {
        let text = "First paragraph.\n\n\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = Chunker::default().split(text, "doc1", "Doc");
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].text,
            "First paragraph.\n\nSecond paragraph.\n\nThird paragraph."
        );
    }

    #[test]
    fn test_2500_chars_three_chunks_with_overlap() {
        let paragraphs = [
            para('a', 499),
            para('b', 499),
            para('c', 398),
            para('d', 398),
            para('e', 698),
        ];
        let text = paragraphs.join("\n\n");
        assert_eq!(text.chars().count(), 2500);

        let chunks = Chunker::new(1000, 200).split(&text, "doc1", "Doc");
        assert_eq!(chunks.len(), 3);
        for pair in chunks.windows(2) {
            let prev = &pair[0].text;
            let tail: String = prev.chars().skip(prev.chars().count() - 200).collect();
            assert!(
                pair[1].text.starts_with(&tail),
                "chunk {} does not start with the tail of chunk {}",
                pair[1].chunk_index,
                pair[0].chunk_index
            );
        }
    }

    #[test]
    fn test_oversized_paragraph_not_split() {
        let big = para('x', 2500);
        let text = format!("intro\n\n{}\n\noutro", big);
        let chunks = Chunker::new(1000, 200).split(&text, "doc1", "Doc");
        assert!(chunks.iter().any(|c| c.text.contains(&big)));
        assert!(chunks.iter().any(|c| c.text.chars().count() > 1000));
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = (0..80)
            .map(|i| format!("Paragraph number {} with some filler text.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = Chunker::new(200, 50).split(&text, "doc1", "Doc");
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_every_paragraph_covered() {
        let paragraphs: Vec<String> = (0..40)
            .map(|i| format!("Paragraph {} says {}.", i, "word ".repeat(i % 7 + 1).trim()))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = Chunker::new(120, 30).split(&text, "doc1", "Doc");
        for p in &paragraphs {
            assert!(
                chunks.iter().any(|c| c.text.contains(p.as_str())),
                "paragraph dropped: {}",
                p
            );
        }
    }

    #[test]
    fn test_zero_overlap_starts_fresh() {
        let text = format!("{}\n\n{}", para('a', 8), para('b', 8));
        let chunks = Chunker::new(10, 0).split(&text, "doc1", "Doc");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, para('b', 8));
    }

    #[test]
    fn test_multibyte_overlap_on_char_boundary() {
        let text = format!("{}\n\n{}", "日本語のテキスト".repeat(10), "┌──┐".repeat(10));
        let chunks = Chunker::new(50, 7).split(&text, "doc1", "Doc");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].text.starts_with("本語のテキスト"));
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta\n\nEpsilon";
        let chunker = Chunker::new(12, 4);
        assert_eq!(
            chunker.split(text, "doc1", "Doc"),
            chunker.split(text, "doc1", "Doc")
        );
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 2), "ef");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
        assert_eq!(tail_chars("αβγ", 1), "γ");
    }

    #[test]
    fn test_trailing_whitespace_counts_toward_overlap() {
        let text = "aaaaaaaa   \n\nbbbbbbbb";
        let chunks = Chunker::new(12, 4).split(text, "doc1", "Doc");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaaaaaaa");
        assert_eq!(chunks[1].text, "a   \n\nbbbbbbbb");
        assert!(!chunks[1].text.starts_with("aaaa"));
    }
}
