//! Query-time retrieval: embed the query, search one case, assemble context

use crate::embedding::EmbeddingProvider;
use crate::error::{CasedexError, Result};
use crate::store::{CaseRepository, CaseStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Separator between passages in a context string
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// A search hit resolved to its source passage
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub id: usize,
    /// Squared Euclidean distance to the query
    pub distance: f32,
    pub filename: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
}

/// Read-only view over a repository's cases
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    repository: CaseRepository,
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, repository: CaseRepository) -> Self {
        Self {
            provider,
            repository,
        }
    }

    /// Context string for `query`: the `top_k` nearest passages of
    /// `namespace`, nearest first, joined by a blank line.
    ///
    /// Empty when the case does not exist or the query is blank.
    pub fn retrieve(&self, query: &str, namespace: &str, top_k: usize) -> Result<String> {
        let chunks = self.search(query, namespace, top_k)?;
        Ok(chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR))
    }

    /// Nearest passages of `namespace` with their provenance
    pub fn search(
        &self,
        query: &str,
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let store = match self.repository.load(namespace)? {
            Some(store) => store,
            None => {
                debug!("Case '{}' has no index, returning no context", namespace);
                return Ok(Vec::new());
            }
        };

        self.search_store(&store, query, top_k)
    }

    /// Search an already loaded store
    pub fn search_store(
        &self,
        store: &CaseStore,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() || store.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        if self.provider.dimension() != store.dimension() {
            return Err(CasedexError::DimensionMismatch {
                expected: store.dimension(),
                actual: self.provider.dimension(),
            });
        }

        let query_vector = self.provider.embed(query)?;
        let hits = store.search(&query_vector, top_k)?;

        let chunks = hits
            .into_iter()
            .map(|hit| {
                let record = store.record(hit.id).ok_or_else(|| {
                    CasedexError::corruption(
                        store.namespace(),
                        format!("search returned id {} with no metadata record", hit.id),
                    )
                })?;
                Ok(RetrievedChunk {
                    id: hit.id,
                    distance: hit.distance,
                    filename: record.filename.clone(),
                    document_id: record.document_id.clone(),
                    chunk_index: record.chunk_index,
                    text: record.chunk_text.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Retrieved {} of {} passages from case '{}'",
            chunks.len(),
            store.len(),
            store.namespace()
        );

        Ok(chunks)
    }
}
