//! Property tests for text splitting.

use docqa_rag::chunking::{Chunker, RecursiveChunker, Separator, split_text};
use docqa_rag::{Document, RagError};
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    "[a-z .#{}é\n]{0,400}"
}

fn arb_separators() -> impl Strategy<Value = Vec<Separator>> {
    prop_oneof![
        Just(Vec::new()),
        Just(Separator::plain_text()),
        Just(Separator::markdown()),
        Just(Separator::json_records()),
    ]
}

/// `(chunk_size, chunk_overlap)` with `overlap < size`.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..60).prop_flat_map(|size| (Just(size), 0..size))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

mod prop_split_text {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_reconstruct_the_input(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
            separators in arb_separators(),
        ) {
            let spans = split_text(&text, size, overlap, &separators).unwrap();

            let mut rebuilt = String::new();
            for (i, span) in spans.iter().enumerate() {
                if i == 0 {
                    rebuilt.push_str(&span.text);
                } else {
                    rebuilt.extend(span.text.chars().skip(overlap));
                }
            }
            prop_assert_eq!(rebuilt, text);
        }

        #[test]
        fn consecutive_chunks_share_exactly_the_overlap(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
            separators in arb_separators(),
        ) {
            let spans = split_text(&text, size, overlap, &separators).unwrap();

            for pair in spans.windows(2) {
                let prev_len = char_len(&pair[0].text);
                prop_assert_eq!(pair[1].start, pair[0].start + prev_len - overlap);

                let tail: String = pair[0].text.chars().skip(prev_len - overlap).collect();
                let head: String = pair[1].text.chars().take(overlap).collect();
                prop_assert_eq!(tail, head);
            }
        }

        #[test]
        fn chunks_never_exceed_chunk_size(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
            separators in arb_separators(),
        ) {
            let spans = split_text(&text, size, overlap, &separators).unwrap();

            prop_assert_eq!(spans.is_empty(), text.is_empty());
            for span in &spans {
                let len = char_len(&span.text);
                prop_assert!(len >= 1 && len <= size, "span of {} chars with size {}", len, size);
            }
        }

        #[test]
        fn splitting_is_deterministic(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
            separators in arb_separators(),
        ) {
            let first = split_text(&text, size, overlap, &separators).unwrap();
            let second = split_text(&text, size, overlap, &separators).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}

#[test]
fn rejects_invalid_parameters() {
    assert!(matches!(split_text("abc", 0, 0, &[]), Err(RagError::Chunking(_))));
    assert!(matches!(split_text("abc", 4, 4, &[]), Err(RagError::Chunking(_))));
    assert!(matches!(RecursiveChunker::new(10, 12), Err(RagError::Chunking(_))));
}

#[test]
fn chunks_carry_document_identity_and_offsets() {
    let document = Document::new("report", "first paragraph here.\n\nsecond paragraph follows.")
        .with_metadata("source", "report.pdf");
    let chunker = RecursiveChunker::new(30, 5).unwrap();

    let chunks = chunker.chunk(&document);

    assert!(chunks.len() >= 2);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.id, format!("report_{i}"));
        assert_eq!(chunk.document_id, "report");
        assert_eq!(chunk.metadata["source"], "report.pdf");
        assert_eq!(chunk.metadata["chunk_index"], i.to_string());
    }
    assert_eq!(chunks[0].text, "first paragraph here.\n\n");
    assert_eq!(chunks[1].metadata["start_offset"], (23 - 5).to_string());
}

#[test]
fn json_records_split_between_objects() {
    let text = "{\n  \"name\": \"ada\"\n}\n{\n  \"name\": \"grace\"\n}\n";
    let spans = split_text(text, 24, 2, &Separator::json_records()).unwrap();

    assert_eq!(spans[0].text, "{\n  \"name\": \"ada\"\n}\n");
}

#[test]
fn empty_document_yields_no_chunks() {
    let chunker = RecursiveChunker::markdown(100, 10).unwrap();
    assert!(chunker.chunk(&Document::new("empty", "")).is_empty());
}
