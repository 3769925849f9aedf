//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: hard cuts every `chunk_size` characters
//! - [`RecursiveChunker`]: prefers the latest natural boundary (headers,
//!   paragraphs, lines, sentences, words) inside each window, falling back
//!   to a hard cut
//!
//! Both share [`split_text`]. Lengths and offsets are counted in characters,
//! never bytes, so multi-byte text is never cut inside a code point.
//! Consecutive chunks of one document overlap by exactly `chunk_overlap`
//! characters, so the original text is the first chunk followed by every
//! later chunk minus its first `chunk_overlap` characters.

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations are deterministic: the same document always yields the
/// same chunk boundaries.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// A boundary pattern the splitter may cut at.
///
/// The cut lands `cut_offset` bytes after the start of a match, so a
/// separator can either stay with the preceding chunk ([`Separator::after`])
/// or begin the next one ([`Separator::line_start`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator {
    pattern: String,
    cut_offset: usize,
}

impl Separator {
    /// Cut directly after `pattern`.
    pub fn after(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let cut_offset = pattern.len();
        Self { pattern, cut_offset }
    }

    /// Cut at the start of a line beginning with `prefix`, so the line opens
    /// the next chunk.
    pub fn line_start(prefix: &str) -> Self {
        Self { pattern: format!("\n{prefix}"), cut_offset: 1 }
    }

    /// The literal pattern searched for.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Paragraph, line, sentence, then word boundaries.
    pub fn plain_text() -> Vec<Separator> {
        ["\n\n", "\n", ". ", "! ", "? ", " "].into_iter().map(Separator::after).collect()
    }

    /// Markdown headers and code fences first, then the plain-text hierarchy.
    pub fn markdown() -> Vec<Separator> {
        let mut separators = vec![Separator::line_start("#"), Separator::after("```\n")];
        separators.extend(Self::plain_text());
        separators
    }

    /// Closing braces and brackets of pretty-printed JSON, then lines.
    pub fn json_records() -> Vec<Separator> {
        ["\n}\n", "\n]\n", "\n"].into_iter().map(Separator::after).collect()
    }
}

/// A piece of text produced by [`split_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Character offset of the span in the source text.
    pub start: usize,
    /// The span text.
    pub text: String,
}

/// A chunk size and overlap pair with `0 <= overlap < size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkSizes {
    size: usize,
    overlap: usize,
}

impl ChunkSizes {
    fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Chunking("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Chunking(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { size: chunk_size, overlap: chunk_overlap })
    }
}

/// Split `text` into spans of at most `chunk_size` characters where
/// consecutive spans share exactly `chunk_overlap` characters.
///
/// Each span ends at the latest match of the first separator (in priority
/// order) that fits the window and still advances past the overlap; if no
/// separator qualifies the span is cut hard at `chunk_size`.
///
/// # Errors
///
/// Returns [`RagError::Chunking`] if `chunk_size == 0` or
/// `chunk_overlap >= chunk_size`.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[Separator],
) -> Result<Vec<TextSpan>> {
    let sizes = ChunkSizes::new(chunk_size, chunk_overlap)?;
    Ok(split_spans(text, sizes, separators))
}

fn split_spans(text: &str, sizes: ChunkSizes, separators: &[Separator]) -> Vec<TextSpan> {
    let ChunkSizes { size: chunk_size, overlap: chunk_overlap } = sizes;
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every character, plus the end of the text.
    let boundaries: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let char_len = boundaries.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        if char_len - start <= chunk_size {
            spans.push(span(text, &boundaries, start, char_len));
            break;
        }

        let hard_end = start + chunk_size;
        let min_end = start + chunk_overlap + 1;
        let end = natural_break(text, &boundaries, start, min_end, hard_end, separators)
            .unwrap_or(hard_end);

        spans.push(span(text, &boundaries, start, end));
        start = end - chunk_overlap;
    }

    spans
}

fn span(text: &str, boundaries: &[usize], start: usize, end: usize) -> TextSpan {
    TextSpan { start, text: text[boundaries[start]..boundaries[end]].to_string() }
}

/// Find the character index of the best cut in `[min_end, max_end]`.
fn natural_break(
    text: &str,
    boundaries: &[usize],
    start: usize,
    min_end: usize,
    max_end: usize,
    separators: &[Separator],
) -> Option<usize> {
    let base = boundaries[start];
    let window = &text[base..boundaries[max_end]];

    for separator in separators {
        if separator.pattern.is_empty() {
            continue;
        }
        let Some(pos) = window.rfind(&separator.pattern) else {
            continue;
        };
        let Ok(cut) = boundaries.binary_search(&(base + pos + separator.cut_offset)) else {
            continue;
        };
        if cut >= min_end {
            return Some(cut);
        }
    }

    None
}

fn spans_to_chunks(document: &Document, spans: Vec<TextSpan>) -> Vec<Chunk> {
    spans
        .into_iter()
        .enumerate()
        .map(|(i, span)| {
            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), i.to_string());
            metadata.insert("start_offset".to_string(), span.start.to_string());
            Chunk {
                id: format!("{}_{i}", document.id),
                text: span.text,
                metadata,
                document_id: document.id.clone(),
            }
        })
        .collect()
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus `chunk_index` and `start_offset` fields.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    sizes: ChunkSizes,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Chunking`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Ok(Self { sizes: ChunkSizes::new(chunk_size, chunk_overlap)? })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        spans_to_chunks(document, split_spans(&document.text, self.sizes, &[]))
    }
}

/// Splits text at the latest natural boundary in each window.
///
/// Separators are tried in priority order; the first one with a match that
/// fits the window wins. The default hierarchy is paragraphs, lines,
/// sentences, then words; [`RecursiveChunker::markdown`] and
/// [`RecursiveChunker::json_records`] provide the presets used for PDF
/// markdown and exported database records.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::markdown(1000, 200)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    sizes: ChunkSizes,
    separators: Vec<Separator>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the plain-text separator hierarchy.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Chunking`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::with_separators(chunk_size, chunk_overlap, Separator::plain_text())
    }

    /// Create a chunker tuned for markdown extracted from PDFs.
    pub fn markdown(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::with_separators(chunk_size, chunk_overlap, Separator::markdown())
    }

    /// Create a chunker tuned for pretty-printed JSON records.
    pub fn json_records(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::with_separators(chunk_size, chunk_overlap, Separator::json_records())
    }

    /// Create a chunker with a custom separator priority list.
    pub fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<Separator>,
    ) -> Result<Self> {
        Ok(Self { sizes: ChunkSizes::new(chunk_size, chunk_overlap)?, separators })
    }

    /// The separators in priority order.
    pub fn separators(&self) -> &[Separator] {
        &self.separators
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        spans_to_chunks(document, split_spans(&document.text, self.sizes, &self.separators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuts_after_paragraph_when_one_fits() {
        let text = "alpha beta gamma\n\ndelta epsilon zeta eta theta";
        let spans = split_text(text, 24, 4, &Separator::plain_text()).unwrap();
        assert_eq!(spans[0].text, "alpha beta gamma\n\n");
        assert_eq!(spans[1].start, 18 - 4);
    }

    #[test]
    fn markdown_header_opens_next_chunk() {
        let text = "intro text here\n## Section\nbody of the section goes on";
        let spans = split_text(text, 30, 2, &Separator::markdown()).unwrap();
        assert_eq!(spans[0].text, "intro text here\n");
        assert!(spans[1].text.contains("## Section"));
    }

    #[test]
    fn hard_cut_without_separators() {
        let spans = split_text("abcdefghij", 4, 1, &[]).unwrap();
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "héllo wörld ünïcode ßtring";
        let spans = split_text(text, 7, 2, &[]).unwrap();
        for span in &spans {
            assert!(span.text.chars().count() <= 7);
        }
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(split_text("abc", 3, 3, &[]).is_err());
        assert!(FixedSizeChunker::new(0, 0).is_err());
        assert!(RecursiveChunker::new(10, 12).is_err());
    }

    #[test]
    fn chunkers_split_like_split_text() {
        let document = Document::new("doc", "# Title\n\nfirst part. second part\nthird line here");

        let fixed = FixedSizeChunker::new(12, 3).unwrap().chunk(&document);
        let expected = split_text(&document.text, 12, 3, &[]).unwrap();
        let texts: Vec<&str> = fixed.iter().map(|c| c.text.as_str()).collect();
        let expected_texts: Vec<&str> = expected.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, expected_texts);

        let recursive = RecursiveChunker::markdown(12, 3).unwrap();
        let chunks = recursive.chunk(&document);
        let expected = split_text(&document.text, 12, 3, recursive.separators()).unwrap();
        assert_eq!(chunks.len(), expected.len());
        assert!(chunks.iter().zip(&expected).all(|(c, s)| c.text == s.text));
    }

    #[test]
    fn chunk_sizes_hold_validated_pairs() {
        assert_eq!(ChunkSizes::new(5, 4).unwrap(), ChunkSizes { size: 5, overlap: 4 });
        assert!(matches!(ChunkSizes::new(0, 0), Err(RagError::Chunking(_))));
    }
}
