/// End-to-end ingest and retrieval against a temporary repository
///
/// Uses the hashing provider so no model download is needed
use casedex::chunker::Chunker;
use casedex::document::Document;
use casedex::embedding::{EmbeddingProvider, HashingProvider};
use casedex::error::CasedexError;
use casedex::ingest::{IngestOptions, Ingestor};
use casedex::retrieval::Retriever;
use casedex::store::{CaseRepository, MetadataRecord, StoreState};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSION: usize = 256;

fn provider(dimension: usize) -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashingProvider::new(dimension).unwrap())
}

fn ingestor(root: &Path) -> Ingestor {
    Ingestor::new(
        provider(DIMENSION),
        CaseRepository::new(root.to_path_buf()).unwrap(),
        Chunker::default(),
        IngestOptions::default(),
    )
}

fn retriever(root: &Path) -> Retriever {
    Retriever::new(
        provider(DIMENSION),
        CaseRepository::new(root.to_path_buf()).unwrap(),
    )
}

fn alpha() -> Document {
    Document::new("alpha.txt", vec!["alpha"; 300].join(" "))
}

fn beta() -> Document {
    let tokens: Vec<&str> = (0..1500)
        .map(|i| if i % 2 == 0 { "beta" } else { "topic" })
        .collect();
    Document::new("beta.txt", tokens.join(" "))
}

#[test]
fn test_alpha_beta_scenario() {
    let temp = TempDir::new().unwrap();

    let chunker = Chunker::default();
    let beta_chunks = chunker.chunk_document(&beta());
    let spans: Vec<(usize, usize)> = beta_chunks
        .iter()
        .map(|c| (c.token_start, c.token_end))
        .collect();
    assert_eq!(spans, vec![(0, 1000), (800, 1500)]);
    assert_eq!(chunker.chunk_document(&alpha()).len(), 1);

    let report = ingestor(temp.path())
        .ingest("case-42", &[alpha(), beta()])
        .unwrap();
    assert_eq!(report.chunks_added, 3);
    assert_eq!(report.total_vectors, 3);

    let hits = retriever(temp.path())
        .search("topic of Beta", "case-42", 2)
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.filename == "beta.txt"));
    assert!(hits[0].distance <= hits[1].distance);

    let context = retriever(temp.path())
        .retrieve("topic of Beta", "case-42", 2)
        .unwrap();
    let expected: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(context, expected.join("\n\n"));
    assert!(!context.contains("alpha"));
}

#[test]
fn test_store_survives_reload() {
    let temp = TempDir::new().unwrap();
    let repository = CaseRepository::new(temp.path().to_path_buf()).unwrap();
    let provider = provider(DIMENSION);
    let chunker = Chunker::default();

    let lock = repository.lock("smith").unwrap();
    let mut store = repository.open_or_create("smith", DIMENSION).unwrap();
    for document in [alpha(), beta()] {
        let records: Vec<MetadataRecord> = chunker
            .chunk_document(&document)
            .iter()
            .map(|chunk| MetadataRecord::from_chunk(&document.filename, chunk))
            .collect();
        let texts: Vec<String> = records.iter().map(|r| r.chunk_text.clone()).collect();
        let vectors = provider.embed_batch(&texts).unwrap();
        store.append(&vectors, records).unwrap();
    }

    let searcher = retriever(temp.path());
    let before = searcher.search_store(&store, "alpha", 3).unwrap();
    repository.save(&mut store, &lock).unwrap();
    drop(lock);

    // Fresh repository handle, as a new process would see it
    let reloaded = CaseRepository::new(temp.path().to_path_buf())
        .unwrap()
        .load_existing("smith")
        .unwrap();
    assert_eq!(reloaded.len(), 3);
    assert_eq!(reloaded.ledger().len(), 3);
    assert_eq!(reloaded.dimension(), DIMENSION);

    let after = searcher.search("alpha", "smith", 3).unwrap();
    let ranked = |hits: &[casedex::RetrievedChunk]| {
        hits.iter()
            .map(|h| (h.id, h.distance.to_bits(), h.text.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(before.len(), 3);
    assert_eq!(ranked(&before), ranked(&after));
    assert_eq!(
        ranked(&before),
        ranked(&searcher.search_store(&reloaded, "alpha", 3).unwrap())
    );
    assert_eq!(after[0].filename, "alpha.txt");
}

#[test]
fn test_appends_keep_positional_ids() {
    let temp = TempDir::new().unwrap();
    let ingestor = ingestor(temp.path());

    ingestor.ingest("smith", &[alpha()]).unwrap();
    ingestor.ingest("smith", &[beta()]).unwrap();

    let store = ingestor.repository().load_existing("smith").unwrap();
    let files: Vec<&str> = store
        .ledger()
        .records()
        .iter()
        .map(|r| r.filename.as_str())
        .collect();
    assert_eq!(files, vec!["alpha.txt", "beta.txt", "beta.txt"]);
    assert_eq!(store.generation(), 2);
}

#[test]
fn test_empty_case_retrieval() {
    let temp = TempDir::new().unwrap();
    let context = retriever(temp.path())
        .retrieve("anything at all", "nobody", 5)
        .unwrap();
    assert_eq!(context, "");
}

#[test]
fn test_oversized_k() {
    let temp = TempDir::new().unwrap();
    ingestor(temp.path())
        .ingest("smith", &[alpha(), beta()])
        .unwrap();

    let hits = retriever(temp.path()).search("beta", "smith", 100).unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn test_cases_are_isolated() {
    let temp = TempDir::new().unwrap();
    let ingestor = ingestor(temp.path());
    ingestor.ingest("smith", &[alpha()]).unwrap();
    ingestor.ingest("jones", &[beta()]).unwrap();

    let hits = retriever(temp.path()).search("alpha", "jones", 10).unwrap();
    assert!(hits.iter().all(|h| h.filename == "beta.txt"));

    let cases = ingestor.repository().list_cases().unwrap();
    let names: Vec<&str> = cases.iter().map(|c| c.namespace.as_str()).collect();
    assert_eq!(names, vec!["jones", "smith"]);
}

#[test]
fn test_dimension_enforced_on_append_and_query() {
    let temp = TempDir::new().unwrap();
    ingestor(temp.path()).ingest("smith", &[alpha()]).unwrap();

    let narrow = Ingestor::new(
        provider(64),
        CaseRepository::new(temp.path().to_path_buf()).unwrap(),
        Chunker::default(),
        IngestOptions::default(),
    );
    let result = narrow.ingest("smith", &[beta()]);
    assert!(matches!(result, Err(CasedexError::DimensionMismatch { .. })));

    let narrow_retriever = Retriever::new(
        provider(64),
        CaseRepository::new(temp.path().to_path_buf()).unwrap(),
    );
    assert!(matches!(
        narrow_retriever.retrieve("alpha", "smith", 1),
        Err(CasedexError::DimensionMismatch { .. })
    ));

    let repository = CaseRepository::new(temp.path().to_path_buf()).unwrap();
    assert_eq!(
        repository.state("smith").unwrap(),
        StoreState::Populated {
            dimension: DIMENSION,
            count: 1,
            generation: 1
        }
    );
}

#[test]
fn test_reingesting_same_file_is_noop() {
    let temp = TempDir::new().unwrap();
    let ingestor = ingestor(temp.path());

    ingestor.ingest("smith", &[alpha(), beta()]).unwrap();
    let report = ingestor.ingest("smith", &[alpha(), beta()]).unwrap();

    assert_eq!(report.documents_skipped, 2);
    assert_eq!(report.chunks_added, 0);

    // No new generation was written
    let repository = ingestor.repository();
    assert_eq!(repository.load_existing("smith").unwrap().generation(), 1);
}
