//! Document ingestion: chunk, embed, append and persist into one case

use crate::chunker::Chunker;
use crate::config::Config;
use crate::document::Document;
use crate::embedding::{BatchEmbedder, EmbeddingProvider};
use crate::error::Result;
use crate::store::{CaseRepository, MetadataRecord};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Texts per embedding batch
    pub batch_size: usize,
    /// Skip documents whose id the case already holds
    pub skip_duplicate_documents: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            skip_duplicate_documents: true,
        }
    }
}

impl From<&Config> for IngestOptions {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.embedding.batch_size,
            skip_duplicate_documents: config.ingest.skip_duplicate_documents,
        }
    }
}

/// Outcome of one ingest call
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub namespace: String,
    pub documents_ingested: usize,
    /// Duplicates plus documents with no text
    pub documents_skipped: usize,
    pub chunks_added: usize,
    /// Vectors in the case after this call
    pub total_vectors: usize,
    pub duration_ms: u64,
}

pub struct Ingestor {
    embedder: BatchEmbedder,
    repository: CaseRepository,
    chunker: Chunker,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        repository: CaseRepository,
        chunker: Chunker,
        options: IngestOptions,
    ) -> Self {
        Self {
            embedder: BatchEmbedder::new(provider, options.batch_size),
            repository,
            chunker,
            options,
        }
    }

    pub fn repository(&self) -> &CaseRepository {
        &self.repository
    }

    /// Index `documents` into `namespace`, creating the case on first write.
    ///
    /// Holds the case's writer lock for the whole call. Either every new
    /// chunk is committed or the case is left as it was.
    pub fn ingest(&self, namespace: &str, documents: &[Document]) -> Result<IngestReport> {
        let start = Instant::now();
        let provider = self.embedder.provider();

        let lock = self.repository.lock(namespace)?;
        let mut store = self
            .repository
            .open_or_create(namespace, provider.dimension())?;

        if let Some(model) = store.embedding_model() {
            if model != provider.model_name() {
                warn!(
                    "Case '{}' was indexed with {} but is being extended with {}",
                    namespace,
                    model,
                    provider.model_name()
                );
            }
        }

        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for document in documents {
            let duplicate = store.contains_document(&document.id) || !seen.insert(&document.id);
            if duplicate && self.options.skip_duplicate_documents {
                debug!(
                    "Skipping {} ({}): already in case '{}'",
                    document.filename, document.id, namespace
                );
                continue;
            }
            pending.push(document.clone());
        }

        let chunked = self.chunker.chunk_documents(&pending);

        let mut records = Vec::new();
        let mut documents_ingested = 0;
        for (document, chunks) in pending.iter().zip(&chunked) {
            if chunks.is_empty() {
                debug!("Skipping {}: no text", document.filename);
                continue;
            }
            documents_ingested += 1;
            records.extend(
                chunks
                    .iter()
                    .map(|chunk| MetadataRecord::from_chunk(&document.filename, chunk)),
            );
        }
        let documents_skipped = documents.len() - documents_ingested;

        if records.is_empty() {
            info!(
                "Nothing new to ingest into case '{}' ({} documents skipped)",
                namespace, documents_skipped
            );
            return Ok(IngestReport {
                namespace: namespace.to_string(),
                documents_ingested: 0,
                documents_skipped,
                chunks_added: 0,
                total_vectors: store.len(),
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let texts: Vec<String> = records.iter().map(|r| r.chunk_text.clone()).collect();
        let vectors = self.embedder.embed(&texts)?;

        let ids = store.append(&vectors, records)?;
        if store.embedding_model().is_none() {
            store.set_embedding_model(provider.model_name());
        }
        self.repository.save(&mut store, &lock)?;
        drop(lock);

        let report = IngestReport {
            namespace: namespace.to_string(),
            documents_ingested,
            documents_skipped,
            chunks_added: ids.len(),
            total_vectors: store.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Ingested {} documents ({} chunks) into case '{}' in {}ms",
            report.documents_ingested, report.chunks_added, namespace, report.duration_ms
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingProvider;
    use crate::error::CasedexError;
    use crate::store::StoreState;
    use tempfile::TempDir;

    fn words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{}{}", prefix, i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn ingestor(root: &std::path::Path, dimension: usize) -> Ingestor {
        let provider = Arc::new(HashingProvider::new(dimension).unwrap());
        let repository = CaseRepository::new(root.to_path_buf()).unwrap();
        Ingestor::new(
            provider,
            repository,
            Chunker::default(),
            IngestOptions::default(),
        )
    }

    #[test]
    fn test_ingest_creates_case() {
        let temp = TempDir::new().unwrap();
        let ingestor = ingestor(temp.path(), 32);

        let report = ingestor
            .ingest(
                "smith",
                &[
                    Document::new("alpha.txt", words("alpha", 300)),
                    Document::new("beta.txt", words("beta", 1500)),
                ],
            )
            .unwrap();

        assert_eq!(report.documents_ingested, 2);
        assert_eq!(report.chunks_added, 3);
        assert_eq!(report.total_vectors, 3);

        let store = ingestor.repository().load_existing("smith").unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.embedding_model(), Some("hashing-v1-32"));
    }

    #[test]
    fn test_duplicates_skipped() {
        let temp = TempDir::new().unwrap();
        let ingestor = ingestor(temp.path(), 16);
        let doc = Document::new("a.txt", words("a", 50));

        ingestor.ingest("smith", &[doc.clone()]).unwrap();
        let report = ingestor
            .ingest("smith", &[doc.clone(), doc.clone()])
            .unwrap();

        assert_eq!(report.documents_ingested, 0);
        assert_eq!(report.documents_skipped, 2);
        assert_eq!(report.total_vectors, 1);
    }

    #[test]
    fn test_duplicates_kept_when_disabled() {
        let temp = TempDir::new().unwrap();
        let provider = Arc::new(HashingProvider::new(16).unwrap());
        let repository = CaseRepository::new(temp.path().to_path_buf()).unwrap();
        let ingestor = Ingestor::new(
            provider,
            repository,
            Chunker::default(),
            IngestOptions {
                batch_size: 4,
                skip_duplicate_documents: false,
            },
        );
        let doc = Document::new("a.txt", words("a", 50));

        ingestor.ingest("smith", &[doc.clone()]).unwrap();
        let report = ingestor.ingest("smith", &[doc]).unwrap();
        assert_eq!(report.total_vectors, 2);
    }

    #[test]
    fn test_empty_documents_leave_case_absent() {
        let temp = TempDir::new().unwrap();
        let ingestor = ingestor(temp.path(), 16);

        let report = ingestor
            .ingest("smith", &[Document::new("blank.txt", "  \n\t ")])
            .unwrap();

        assert_eq!(report.chunks_added, 0);
        assert_eq!(report.documents_skipped, 1);
        assert_eq!(
            ingestor.repository().state("smith").unwrap(),
            StoreState::Absent
        );
    }

    #[test]
    fn test_provider_dimension_must_match_case() {
        let temp = TempDir::new().unwrap();
        ingestor(temp.path(), 16)
            .ingest("smith", &[Document::new("a.txt", words("a", 10))])
            .unwrap();

        let result = ingestor(temp.path(), 8)
            .ingest("smith", &[Document::new("b.txt", words("b", 10))]);
        assert!(matches!(
            result,
            Err(CasedexError::DimensionMismatch {
                expected: 16,
                actual: 8
            })
        ));

        let store = ingestor(temp.path(), 16)
            .repository()
            .load_existing("smith")
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    /// Declares four dimensions but produces three
    struct ShortProvider;

    impl EmbeddingProvider for ShortProvider {
        fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, crate::embedding::EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.5; 3]).collect())
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "short"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    #[test]
    fn test_misreported_dimension_rejected_before_append() {
        let temp = TempDir::new().unwrap();
        ingestor(temp.path(), 4)
            .ingest("smith", &[Document::new("a.txt", words("a", 10))])
            .unwrap();

        let short = Ingestor::new(
            Arc::new(ShortProvider),
            CaseRepository::new(temp.path().to_path_buf()).unwrap(),
            Chunker::default(),
            IngestOptions::default(),
        );

        let result = short.ingest("smith", &[Document::new("b.txt", words("b", 10))]);
        assert!(matches!(
            result,
            Err(CasedexError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
        let store = short.repository().load_existing("smith").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.generation(), 1);

        let result = short.ingest("jones", &[Document::new("c.txt", words("c", 10))]);
        assert!(matches!(
            result,
            Err(CasedexError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
        assert_eq!(
            short.repository().state("jones").unwrap(),
            StoreState::Absent
        );
    }

    #[test]
    fn test_concurrent_writer_rejected() {
        let temp = TempDir::new().unwrap();
        let ingestor = ingestor(temp.path(), 16);
        let _held = ingestor.repository().lock("smith").unwrap();

        let result = ingestor.ingest("smith", &[Document::new("a.txt", words("a", 10))]);
        assert!(matches!(result, Err(CasedexError::WriterConflict { .. })));
    }
}
