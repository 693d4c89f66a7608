/// Embedding generation
///
/// - EmbeddingProvider trait for abstraction
/// - FastEmbedProvider for local ONNX models (all-MiniLM-L6-v2, 384-dim)
/// - HashingProvider for deterministic offline embeddings
/// - BatchEmbedder for ordered, batched embedding of many chunks
mod batch;
mod hashing;
mod provider;

pub use batch::BatchEmbedder;
pub use hashing::HashingProvider;
#[cfg(feature = "fastembed")]
pub use provider::FastEmbedProvider;
pub use provider::{create_provider, fastembed_dimension, EmbeddingError, EmbeddingProvider};
