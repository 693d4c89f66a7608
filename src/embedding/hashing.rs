/// Feature-hashing embedding provider for offline and test use
use super::{EmbeddingError, EmbeddingProvider};
use std::collections::BTreeMap;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Deterministic bag-of-words embedder.
///
/// Each distinct word adds its frequency to one bucket and the square root of
/// its frequency to one bucket per character trigram; the result is
/// L2-normalized. Not semantic, but content-dependent and reproducible across
/// runs and platforms.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
    model_name: String,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InitializationError(
                "hashing provider dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            model_name: format!("hashing-v1-{}", dimension),
        })
    }

    fn bucket(&self, token: &str, seed: u64) -> usize {
        let hash = token
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(0x100000001b3).wrapping_add(b as u64));
        (hash % self.dimension as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        let lower = text.to_lowercase();
        // BTreeMap keeps accumulation order fixed, so float sums are reproducible
        let mut word_freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            embedding[self.bucket(word, 0xcbf29ce484222325)] += *freq as f32;

            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.bucket(&trigram, 0x84222325cbf29ce4)] += (*freq as f32).sqrt();
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

impl EmbeddingProvider for HashingProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingProvider::new(0).is_err());
    }

    #[test]
    fn test_embedding_is_normalized() {
        let provider = HashingProvider::new(128).unwrap();
        let embedding = provider.embed("breach of contract damages").unwrap();

        assert_eq!(embedding.len(), 128);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_deterministic() {
        let provider = HashingProvider::new(128).unwrap();
        let a = provider.embed("deterministic test input").unwrap();
        let b = provider.embed("deterministic test input").unwrap();
        assert_eq!(a, b);

        let other = HashingProvider::new(128).unwrap();
        assert_eq!(a, other.embed("deterministic test input").unwrap());
    }

    #[test]
    fn test_batch_matches_single() {
        let provider = HashingProvider::new(64).unwrap();
        let texts = vec![
            "witness testimony".to_string(),
            String::new(),
            "lease agreement".to_string(),
        ];

        let batch = provider.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0], provider.embed("witness testimony").unwrap());
        assert!(batch[1].iter().all(|&x| x == 0.0));
        assert_eq!(batch[2], provider.embed("lease agreement").unwrap());
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let provider = HashingProvider::new(256).unwrap();
        let query = provider.embed("eviction notice tenant").unwrap();
        let near = provider.embed("the tenant received an eviction notice").unwrap();
        let far = provider.embed("quarterly revenue spreadsheet").unwrap();

        let dist = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
        };
        assert!(dist(&query, &near) < dist(&query, &far));
    }
}
