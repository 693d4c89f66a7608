//! In-memory case store: vector index plus its metadata ledger

use super::ledger::{MetadataLedger, MetadataRecord};
use crate::error::{CasedexError, Result};
use crate::index::{FlatL2Index, IndexError, SearchHit, VectorIndex};
use std::ops::Range;

/// One tenant's vectors and metadata.
///
/// `index.len() == ledger.len()` holds after every public operation.
#[derive(Debug, Clone)]
pub struct CaseStore {
    namespace: String,
    index: FlatL2Index,
    ledger: MetadataLedger,
    embedding_model: Option<String>,
    /// Last persisted generation, 0 when never saved
    generation: u64,
}

impl CaseStore {
    /// Empty store for `namespace`
    pub fn new(namespace: impl Into<String>, dimension: usize) -> Result<Self> {
        Ok(Self {
            namespace: namespace.into(),
            index: FlatL2Index::new(dimension)?,
            ledger: MetadataLedger::new(),
            embedding_model: None,
            generation: 0,
        })
    }

    pub(crate) fn from_parts(
        namespace: String,
        index: FlatL2Index,
        ledger: MetadataLedger,
        embedding_model: Option<String>,
        generation: u64,
    ) -> Result<Self> {
        if index.len() != ledger.len() {
            return Err(CasedexError::corruption(
                &namespace,
                format!(
                    "index holds {} vectors but ledger holds {} records",
                    index.len(),
                    ledger.len()
                ),
            ));
        }
        Ok(Self {
            namespace,
            index,
            ledger,
            embedding_model,
            generation,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn ledger(&self) -> &MetadataLedger {
        &self.ledger
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    pub fn set_embedding_model(&mut self, model: impl Into<String>) {
        self.embedding_model = Some(model.into());
    }

    pub fn contains_document(&self, document_id: &str) -> bool {
        self.ledger.contains_document(document_id)
    }

    /// Append vectors and their records as one operation.
    ///
    /// On error the store is unchanged.
    pub fn append(
        &mut self,
        vectors: &[Vec<f32>],
        records: Vec<MetadataRecord>,
    ) -> Result<Range<usize>> {
        if vectors.len() != records.len() {
            return Err(IndexError::Inconsistent(format!(
                "{} vectors but {} metadata records",
                vectors.len(),
                records.len()
            ))
            .into());
        }

        let ids = self.index.add(vectors)?;
        let record_ids = self.ledger.append(records);
        debug_assert_eq!(ids, record_ids);

        Ok(ids)
    }

    /// Exact nearest neighbors of `query`
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.index.search(query, k)?)
    }

    /// Metadata for positional id `id`
    pub fn record(&self, id: usize) -> Option<&MetadataRecord> {
        self.ledger.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doc: &str, idx: usize) -> MetadataRecord {
        MetadataRecord {
            filename: format!("{}.txt", doc),
            document_id: doc.to_string(),
            chunk_index: idx,
            chunk_text: format!("{} chunk {}", doc, idx),
        }
    }

    #[test]
    fn test_append_keeps_lengths_in_step() {
        let mut store = CaseStore::new("case-a", 2).unwrap();
        let before = store.len();

        let ids = store
            .append(
                &[vec![0.0, 1.0], vec![1.0, 0.0]],
                vec![record("a", 0), record("a", 1)],
            )
            .unwrap();

        assert_eq!(ids, 0..2);
        assert_eq!(store.len(), before + 2);
        assert_eq!(store.ledger().len(), store.len());

        let ids = store.append(&[vec![5.0, 5.0]], vec![record("b", 0)]).unwrap();
        assert_eq!(ids, 2..3);
        assert_eq!(store.ledger().len(), 3);
    }

    #[test]
    fn test_wrong_dimension_leaves_store_unchanged() {
        let mut store = CaseStore::new("case-a", 3).unwrap();
        store
            .append(&[vec![0.0, 0.0, 0.0]], vec![record("a", 0)])
            .unwrap();

        let result = store.append(
            &[vec![1.0, 1.0, 1.0], vec![1.0, 1.0]],
            vec![record("b", 0), record("b", 1)],
        );

        assert!(matches!(
            result,
            Err(CasedexError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(store.ledger().len(), 1);
        assert!(!store.contains_document("b"));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut store = CaseStore::new("case-a", 1).unwrap();
        let result = store.append(&[vec![1.0], vec![2.0]], vec![record("a", 0)]);
        assert!(result.is_err());
        assert!(store.is_empty());
        assert!(store.ledger().is_empty());
    }

    #[test]
    fn test_search_resolves_records() {
        let mut store = CaseStore::new("case-a", 1).unwrap();
        store
            .append(
                &[vec![10.0], vec![1.0], vec![4.0]],
                vec![record("a", 0), record("a", 1), record("a", 2)],
            )
            .unwrap();

        let hits = store.search(&[0.0], 2).unwrap();
        let texts: Vec<&str> = hits
            .iter()
            .filter_map(|h| store.record(h.id))
            .map(|r| r.chunk_text.as_str())
            .collect();
        assert_eq!(texts, vec!["a chunk 1", "a chunk 2"]);
    }

    #[test]
    fn test_from_parts_rejects_mismatch() {
        let index = FlatL2Index::build(1, &[vec![1.0], vec![2.0]]).unwrap();
        let ledger = MetadataLedger::from_records(vec![record("a", 0)]);
        let result = CaseStore::from_parts("case-a".to_string(), index, ledger, None, 1);
        assert!(matches!(result, Err(CasedexError::IndexCorruption { .. })));
    }
}
