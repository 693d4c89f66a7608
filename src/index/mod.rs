//! Nearest-neighbor indexes over embedding vectors
//!
//! Positional ids are assigned at insertion (0, 1, 2, ...) and never reused.

mod flat;

pub use flat::FlatL2Index;

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector {position} contains a non-finite value")]
    NonFiniteValue { position: usize },

    #[error("Invalid index dimension: {0}")]
    InvalidDimension(usize),

    #[error("Index data is inconsistent: {0}")]
    Inconsistent(String),
}

/// Index variants that can be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact search, squared Euclidean distance
    FlatL2,
}

/// One search result: positional id and its distance to the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: usize,
    pub distance: f32,
}

/// Interface every index variant implements
pub trait VectorIndex: Send + Sync {
    fn kind(&self) -> IndexKind;

    fn dimension(&self) -> usize;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors after all existing ones, returning their positional ids.
    ///
    /// Either every vector is added or, on error, none is.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Range<usize>, IndexError>;

    /// Up to `k` nearest vectors, ascending by distance, ties by smaller id
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError>;

    /// Stored vector at positional id `id`
    fn vector(&self, id: usize) -> Option<&[f32]>;
}
