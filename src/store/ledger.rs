//! Positional metadata mirror of a case's vectors

use crate::chunker::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;

/// Source identity of the vector stored at the same positional id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub filename: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub chunk_text: String,
}

impl MetadataRecord {
    pub fn from_chunk(filename: &str, chunk: &Chunk) -> Self {
        Self {
            filename: filename.to_string(),
            document_id: chunk.document_id.clone(),
            chunk_index: chunk.sequence_index,
            chunk_text: chunk.text.clone(),
        }
    }
}

/// Append-only array of records; index `i` describes vector `i`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataLedger {
    records: Vec<MetadataRecord>,
    documents: HashSet<String>,
}

impl MetadataLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<MetadataRecord>) -> Self {
        let documents = records.iter().map(|r| r.document_id.clone()).collect();
        Self { records, documents }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&MetadataRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub fn contains_document(&self, document_id: &str) -> bool {
        self.documents.contains(document_id)
    }

    /// Number of distinct documents with at least one record
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub(crate) fn append(&mut self, records: Vec<MetadataRecord>) -> Range<usize> {
        let start = self.records.len();
        for record in &records {
            self.documents.insert(record.document_id.clone());
        }
        self.records.extend(records);
        start..self.records.len()
    }
}
