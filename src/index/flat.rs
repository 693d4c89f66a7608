/// Exact flat index using squared Euclidean distance
use super::{IndexError, IndexKind, SearchHit, VectorIndex};
use ndarray::{ArrayView1, ArrayView2};
use std::cmp::Ordering;
use std::ops::Range;

/// Row-major vector storage searched exhaustively.
///
/// O(n·d) space, O(n·d) per query, no approximation.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::InvalidDimension(dimension));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    /// Build an index holding `vectors` at ids `0..vectors.len()`
    pub fn build(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self, IndexError> {
        let mut index = Self::new(dimension)?;
        index.add(vectors)?;
        Ok(index)
    }

    /// Rebuild from a row-major buffer, e.g. one read back from disk
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::InvalidDimension(dimension));
        }
        if data.len() % dimension != 0 {
            return Err(IndexError::Inconsistent(format!(
                "{} values is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
            return Err(IndexError::NonFiniteValue {
                position: pos / dimension,
            });
        }
        Ok(Self { dimension, data })
    }

    /// Row-major view of every stored value
    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }

    fn rows(&self) -> Result<ArrayView2<'_, f32>, IndexError> {
        ArrayView2::from_shape((self.len(), self.dimension), &self.data)
            .map_err(|e| IndexError::Inconsistent(e.to_string()))
    }
}

fn by_distance_then_id(a: &SearchHit, b: &SearchHit) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.id.cmp(&b.id))
}

impl VectorIndex for FlatL2Index {
    fn kind(&self) -> IndexKind {
        IndexKind::FlatL2
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Range<usize>, IndexError> {
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(IndexError::NonFiniteValue {
                    position: self.len() + i,
                });
            }
        }

        let start = self.len();
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }

        Ok(start..self.len())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query = ArrayView1::from(query);
        let mut hits: Vec<SearchHit> = self
            .rows()?
            .outer_iter()
            .enumerate()
            .map(|(id, row)| {
                let diff = &row - &query;
                SearchHit {
                    id,
                    distance: diff.dot(&diff),
                }
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_distance_then_id);
            hits.truncate(k);
        }
        hits.sort_by(by_distance_then_id);

        Ok(hits)
    }

    fn vector(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }
}
