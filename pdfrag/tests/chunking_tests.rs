//! Property tests for chunk window guarantees.

use std::collections::BTreeMap;

use pdfrag::chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
use pdfrag::document::{Document, META_CHUNK_INDEX, META_PAGE, META_SOURCE, Page};
use proptest::prelude::*;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn drop_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[i..],
        None => "",
    }
}

fn last_chars(s: &str, n: usize) -> String {
    let skip = char_len(s).saturating_sub(n);
    s.chars().skip(skip).collect()
}

fn first_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Text with words, sentence ends, line breaks and some multibyte characters.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Zäö .!?\n]{0,400}"
}

/// A `(chunk_size, chunk_overlap)` pair with `overlap < size`.
fn arb_window() -> impl Strategy<Value = (usize, usize)> {
    (1usize..60).prop_flat_map(|size| (Just(size), 0..size))
}

fn check_invariants(
    text: &str,
    chunks: &[String],
    size: usize,
    overlap: usize,
) -> Result<(), TestCaseError> {
    if text.is_empty() {
        prop_assert!(chunks.is_empty());
        return Ok(());
    }
    prop_assert!(!chunks.is_empty());

    for chunk in chunks {
        prop_assert!(char_len(chunk) <= size, "chunk {:?} longer than {}", chunk, size);
    }

    for pair in chunks.windows(2) {
        prop_assert_eq!(last_chars(&pair[0], overlap), first_chars(&pair[1], overlap));
    }

    let mut rebuilt = chunks[0].clone();
    for chunk in &chunks[1..] {
        rebuilt.push_str(drop_chars(chunk, overlap));
    }
    prop_assert_eq!(rebuilt, text);
    Ok(())
}

mod prop_fixed_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn windows_bound_overlap_and_reconstruct(
            text in arb_text(),
            (size, overlap) in arb_window()
        ) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&text);
            check_invariants(&text, &chunks, size, overlap)?;
        }

        #[test]
        fn splitting_is_deterministic(text in arb_text(), (size, overlap) in arb_window()) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            prop_assert_eq!(chunker.split(&text), chunker.split(&text));
        }
    }
}

mod prop_recursive_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn windows_bound_overlap_and_reconstruct(
            text in arb_text(),
            (size, overlap) in arb_window()
        ) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&text);
            check_invariants(&text, &chunks, size, overlap)?;
        }

        #[test]
        fn splitting_is_deterministic(text in arb_text(), (size, overlap) in arb_window()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            prop_assert_eq!(chunker.split(&text), chunker.split(&text));
        }
    }
}

#[test]
fn ten_characters_with_size_four_and_overlap_two() {
    let chunker = FixedSizeChunker::new(4, 2).unwrap();
    assert_eq!(chunker.split("ABCDEFGHIJ"), ["ABCD", "CDEF", "EFGH", "GHIJ"]);
}

#[test]
fn text_shorter_than_chunk_is_one_chunk() {
    let fixed = FixedSizeChunker::new(1000, 200).unwrap();
    let recursive = RecursiveChunker::new(1000, 200).unwrap();
    assert_eq!(fixed.split("short page"), ["short page"]);
    assert_eq!(recursive.split("short page"), ["short page"]);
}

#[test]
fn empty_text_has_no_chunks() {
    let chunker = RecursiveChunker::new(10, 2).unwrap();
    assert!(chunker.split("").is_empty());
}

#[test]
fn recursive_cuts_at_paragraph_before_sentence() {
    let chunker = RecursiveChunker::new(30, 0).unwrap();
    let chunks = chunker.split("Intro line. More.\n\nSecond paragraph here.");
    assert_eq!(chunks[0], "Intro line. More.\n\n");
}

#[test]
fn chunks_carry_page_metadata_and_index() {
    let page = Page { text: "ABCDEFGHIJ".to_string(), number: 3 };
    let document = Document::from_page("paper.pdf", page);
    let chunker = FixedSizeChunker::new(4, 2).unwrap();
    let chunks = chunker.chunk(&document);

    assert_eq!(chunks.len(), 4);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.document_id, "paper.pdf#3");
        assert_eq!(chunk.id, format!("paper.pdf#3_{i}"));
        assert_eq!(chunk.metadata.get(META_SOURCE).map(String::as_str), Some("paper.pdf"));
        assert_eq!(chunk.metadata.get(META_PAGE).map(String::as_str), Some("3"));
        assert_eq!(chunk.metadata.get(META_CHUNK_INDEX), Some(&i.to_string()));
    }
}

#[test]
fn empty_document_yields_no_chunks() {
    let document =
        Document { id: "blank#1".to_string(), text: String::new(), metadata: BTreeMap::new() };
    assert!(RecursiveChunker::new(1000, 200).unwrap().chunk(&document).is_empty());
}
