use crate::config::{Config, SCHEMA_VERSION};
use crate::embedding::fastembed_dimension;
use crate::error::{CasedexError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CasedexError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let chunking = &config.chunking;
        if chunking.window_size == 0 {
            errors.push(ValidationError::new(
                "chunking.window_size",
                "Window size must be greater than 0",
            ));
        } else if chunking.overlap >= chunking.window_size {
            errors.push(ValidationError::new(
                "chunking.overlap",
                format!(
                    "Overlap ({}) must be smaller than window size ({})",
                    chunking.overlap, chunking.window_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        if embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }

        match embedding.provider.as_str() {
            "hashing" => {}
            "fastembed" => match fastembed_dimension(&embedding.model) {
                Some(dim) if dim != embedding.dimension => errors.push(ValidationError::new(
                    "embedding.dimension",
                    format!(
                        "Model {} produces {}-dimensional vectors, configured {}",
                        embedding.model, dim, embedding.dimension
                    ),
                )),
                Some(_) => {}
                None => errors.push(ValidationError::new(
                    "embedding.model",
                    format!("Unsupported fastembed model: '{}'", embedding.model),
                )),
            },
            other => errors.push(ValidationError::new(
                "embedding.provider",
                format!("Provider must be 'fastembed' or 'hashing', got '{}'", other),
            )),
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }
    }
}
