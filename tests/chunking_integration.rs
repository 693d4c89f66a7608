/// Chunk coverage and determinism over a range of document sizes and windows
use casedex::chunker::Chunker;
use casedex::document::Document;

fn numbered(n: usize) -> String {
    (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
}

#[test]
fn test_every_token_covered() {
    for (window, overlap) in [(1000, 200), (10, 3), (7, 0), (2, 1)] {
        let chunker = Chunker::new(window, overlap).unwrap();
        for n in [1, 2, 9, 10, 11, 799, 1000, 1001, 2345] {
            let chunks = chunker.chunk("doc", &numbered(n));
            let mut covered = vec![false; n];
            for chunk in &chunks {
                assert!(chunk.word_count <= window);
                for slot in &mut covered[chunk.token_start..chunk.token_end] {
                    *slot = true;
                }
            }
            assert!(
                covered.iter().all(|c| *c),
                "window {} overlap {} n {} left tokens uncovered",
                window,
                overlap,
                n
            );
            assert_eq!(chunks.last().map(|c| c.token_end), Some(n));
        }
    }
}

#[test]
fn test_consecutive_chunks_overlap_exactly() {
    let chunker = Chunker::new(50, 12).unwrap();
    let chunks = chunker.chunk("doc", &numbered(400));

    for pair in chunks.windows(2) {
        assert_eq!(pair[1].token_start, pair[0].token_start + 38);
        assert_eq!(pair[0].token_end - pair[1].token_start, 12);
    }
    let indices: Vec<usize> = chunks.iter().map(|c| c.sequence_index).collect();
    assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
}

#[test]
fn test_chunk_text_matches_span() {
    let chunker = Chunker::new(4, 1).unwrap();
    let chunks = chunker.chunk("doc", "one  two\tthree\nfour five six");

    assert_eq!(chunks[0].text, "one two three four");
    assert_eq!(chunks[1].text, "four five six");
    assert_eq!(chunks.len(), 2);
}

#[test]
fn test_chunking_is_deterministic() {
    let chunker = Chunker::default();
    let text = numbered(3210);
    assert_eq!(chunker.chunk("doc", &text), chunker.chunk("doc", &text));

    let docs = vec![
        Document::new("a.txt", numbered(1500)),
        Document::new("b.txt", ""),
        Document::new("c.txt", numbered(20)),
    ];
    let parallel = chunker.chunk_documents(&docs);
    let sequential: Vec<_> = docs.iter().map(|d| chunker.chunk_document(d)).collect();
    assert_eq!(parallel, sequential);
    assert_eq!(parallel[0].len(), 2);
    assert!(parallel[1].is_empty());
}

#[test]
fn test_invalid_parameters() {
    assert!(Chunker::new(0, 0).is_err());
    assert!(Chunker::new(100, 100).is_err());
    assert!(Chunker::new(100, 150).is_err());
    assert!(Chunker::new(100, 99).is_ok());
}
