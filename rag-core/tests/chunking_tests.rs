//! Property tests for sliding-window chunking.

use proptest::prelude::*;
use rag_core::{Document, RagError, split, split_text};

/// Window parameters with `0 <= overlap < size`.
fn arb_window() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

/// **Chunk bounds, exact overlap and reconstruction**
/// *For any* document and valid window, every chunk is at most `chunk_size`
/// characters, consecutive chunks share exactly `chunk_overlap` characters,
/// and dropping each later chunk's overlap and concatenating rebuilds the
/// document.
mod prop_chunk_invariants {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_respect_size_overlap_and_reconstruct(
            text in "\\PC{0,200}",
            (size, overlap) in arb_window(),
        ) {
            let doc = Document::new("doc", text.clone());
            let chunks = split(&doc, size, overlap).unwrap();
            let char_len = text.chars().count();

            if char_len == 0 {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            prop_assert_eq!(chunks[0].start, 0);
            prop_assert_eq!(chunks.last().unwrap().end, char_len);

            for chunk in &chunks {
                prop_assert!(chunk.text.chars().count() <= size);
                prop_assert_eq!(chunk.text.chars().count(), chunk.char_len());
            }

            for pair in chunks.windows(2) {
                let (prev, next) = (&pair[0], &pair[1]);
                prop_assert_eq!(prev.char_len(), size);
                prop_assert_eq!(next.start, prev.start + size - overlap);
                prop_assert_eq!(prev.end - next.start, overlap);
                let prev_tail: String = prev.text.chars().skip(size - overlap).collect();
                let next_head: String = next.text.chars().take(overlap).collect();
                prop_assert_eq!(prev_tail, next_head);
            }

            let mut rebuilt = chunks[0].text.clone();
            for chunk in &chunks[1..] {
                rebuilt.extend(chunk.text.chars().skip(overlap));
            }
            prop_assert_eq!(rebuilt, text);
        }

        #[test]
        fn splitting_is_deterministic(
            text in "[a-z .]{0,120}",
            (size, overlap) in arb_window(),
        ) {
            let doc = Document::new("doc", text);
            let first = split(&doc, size, overlap).unwrap();
            prop_assert_eq!(first, split(&doc, size, overlap).unwrap());
        }

        #[test]
        fn overlap_not_below_size_is_a_configuration_error(
            size in 1usize..1000,
            extra in 0usize..1000,
        ) {
            let result = split_text("some text", size, size + extra);
            prop_assert!(matches!(result, Err(RagError::Configuration(_))));
        }
    }
}

#[test]
fn short_document_yields_itself() {
    let doc = Document::new("notes.txt", "Breathe in for four counts.");
    let chunks = split(&doc, 1000, 200).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, doc.text);
    assert_eq!(chunks[0].document_id, "notes.txt");
}

#[test]
fn sky_scenario_offsets() {
    let windows = split_text("The sky is blue. Grass is green.", 20, 5).unwrap();
    let offsets: Vec<(usize, usize)> = windows.iter().map(|(s, e, _)| (*s, *e)).collect();
    assert_eq!(offsets, vec![(0, 20), (15, 32)]);
}

#[test]
fn chunk_ids_are_derived_from_source_and_offset() {
    let doc = Document::new("a.txt", "abcdefghij");
    let ids: Vec<String> = split(&doc, 4, 1).unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["a.txt@0", "a.txt@3", "a.txt@6"]);
}
