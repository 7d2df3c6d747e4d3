use fastembed::{TextEmbedding, UserDefinedEmbeddingModel, TokenizerFiles, InitOptionsUserDefined};
use std::path::Path;

use crate::error::{RagError, Result};

pub struct EmbeddingGenerator {
    model: TextEmbedding,
}

fn read_model_file(model_dir: &Path, name: &str) -> Result<Vec<u8>> {
    std::fs::read(model_dir.join(name))
        .map_err(|e| RagError::Embedding(format!("Failed to read {}: {}", name, e)))
}

impl EmbeddingGenerator {
    /// Load an ONNX sentence embedding model exported to `model_dir`.
    pub fn new(model_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing embedding model from {}", model_dir.display());

        if !model_dir.exists() {
            return Err(RagError::Embedding(format!(
                "Model directory not found: {}",
                model_dir.display()
            )));
        }

        let user_model = UserDefinedEmbeddingModel {
            onnx_file: read_model_file(model_dir, "model.onnx")?,
            tokenizer_files: TokenizerFiles {
                tokenizer_file: read_model_file(model_dir, "tokenizer.json")?,
                config_file: read_model_file(model_dir, "config.json")?,
                special_tokens_map_file: read_model_file(model_dir, "special_tokens_map.json")?,
                tokenizer_config_file: read_model_file(model_dir, "tokenizer_config.json")?,
            },
        };

        tracing::info!("Model files loaded, creating embedding model...");

        let model = TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
            .map_err(|e| RagError::Embedding(format!("Failed to initialize embedding model: {}", e)))?;

        tracing::info!("Embedding model initialized successfully");
        Ok(Self { model })
    }

    pub fn generate(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.model
            .embed(texts, None)
            .map_err(|e| RagError::Embedding(e.to_string()))
    }

    pub fn generate_single(&self, text: &str) -> Result<Vec<f32>> {
        self.generate(vec![text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("Model returned no embedding".to_string()))
    }
}
