//! casedex - per-case document indexing and passage retrieval
//!
//! Documents are split into overlapping word windows, embedded, and stored in
//! one exact L2 vector index per case alongside a positional metadata ledger.
//! Queries are answered with the nearest passages joined into a context block
//! for a downstream answer generator.

pub mod chunker;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod retrieval;
pub mod store;

pub use chunker::{Chunk, Chunker};
pub use document::Document;
pub use error::{CasedexError, Result};
pub use ingest::{IngestOptions, IngestReport, Ingestor};
pub use retrieval::{RetrievedChunk, Retriever};
pub use store::{CaseRepository, CaseStore, StoreState};
