/// Batched, order-preserving embedding of many texts
use super::{EmbeddingError, EmbeddingProvider};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Embeds texts in batches of `batch_size` on the rayon pool.
///
/// Output order always matches input order, and every vector is checked
/// against the provider's dimension.
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl BatchEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = std::time::Instant::now();
        let expected_dim = self.provider.dimension();

        let batches: Vec<Vec<Vec<f32>>> = texts
            .par_chunks(self.batch_size)
            .map(|batch| self.embed_checked(batch, expected_dim))
            .collect::<Result<_, _>>()?;

        let embeddings: Vec<Vec<f32>> = batches.into_iter().flatten().collect();

        info!(
            "Embedded {} texts with {} in {}ms",
            embeddings.len(),
            self.provider.model_name(),
            start.elapsed().as_millis()
        );

        Ok(embeddings)
    }

    fn embed_checked(
        &self,
        batch: &[String],
        expected_dim: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let embeddings = self.provider.embed_batch(batch)?;

        if embeddings.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: batch.len(),
                actual: embeddings.len(),
            });
        }

        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected_dim) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: expected_dim,
                actual: bad.len(),
            });
        }

        debug!("Embedded batch of {} texts", batch.len());
        Ok(embeddings)
    }
}
