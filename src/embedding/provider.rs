/// Embedding provider trait, factory and FastEmbed implementation
use crate::config::EmbeddingConfig;
#[cfg(feature = "fastembed")]
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Trait for embedding providers
///
/// A provider is a pure function of its input text and its fixed model state.
/// `dimension()` never changes over the provider's lifetime.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts, one vector per text in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the provider name ("fastembed", "hashing", ...)
    fn provider_name(&self) -> &str;

    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self.embed_batch(&[text.to_string()])?;
        if embeddings.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: embeddings.len(),
            });
        }
        Ok(embeddings.remove(0))
    }
}

/// Create an embedding provider based on configuration
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(super::HashingProvider::new(config.dimension)?)),
        #[cfg(feature = "fastembed")]
        "fastembed" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        #[cfg(not(feature = "fastembed"))]
        "fastembed" => Err(EmbeddingError::InitializationError(
            "casedex was built without the 'fastembed' feature".to_string(),
        )),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unknown embedding provider: '{}'. Supported providers: fastembed, hashing",
            other
        ))),
    }
}

/// Output dimension of a supported FastEmbed model
pub fn fastembed_dimension(model_name: &str) -> Option<usize> {
    match model_name {
        "all-MiniLM-L6-v2" | "all-minilm-l6-v2" | "bge-small-en-v1.5" => Some(384),
        "bge-base-en-v1.5" => Some(768),
        _ => None,
    }
}

/// FastEmbed provider for local embedding generation
///
/// Uses all-MiniLM-L6-v2 model (384 dimensions) by default.
/// Optimized for offline operation with no API calls.
#[cfg(feature = "fastembed")]
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

#[cfg(feature = "fastembed")]
impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// **Important**: Models are downloaded on-demand to `~/.cache/huggingface/`
    /// on first use.
    /// - all-MiniLM-L6-v2: 90MB (384 dims)
    /// - bge-small-en-v1.5: 130MB (384 dims)
    /// - bge-base-en-v1.5: 440MB (768 dims)
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, model_size_mb) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 90),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 130),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 440),
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };
        let dimension = fastembed_dimension(model_name).unwrap_or(384);

        tracing::info!(
            "Initializing embedding model: {} ({}D, ~{}MB download if not cached)",
            model_name,
            dimension,
            model_size_mb
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

#[cfg(feature = "fastembed")]
impl EmbeddingProvider for FastEmbedProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}
