//! Local embeddings through `fastembed`.
//!
//! Models run in-process, so search terms never leave the host. Inference
//! is CPU-bound and needs `&mut` access to the model; each batch takes the
//! model lock on a blocking thread.
//!
//! Requires the `vector-fastembed` feature.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use kbase_core::{Error, Result};

use crate::embedding::EmbeddingProvider;

/// Supported models: accepted names, fastembed variant, output dimension.
const MODELS: &[(&[&str], EmbeddingModel, usize)] = &[
    (&["bge-small-en-v1.5", "BGESmallENV15"], EmbeddingModel::BGESmallENV15, 384),
    (&["bge-base-en-v1.5", "BGEBaseENV15"], EmbeddingModel::BGEBaseENV15, 768),
    (&["all-minilm-l6-v2", "AllMiniLML6V2"], EmbeddingModel::AllMiniLML6V2, 384),
];

fn lookup(name: &str) -> Result<(EmbeddingModel, usize)> {
    MODELS
        .iter()
        .find(|(names, _, _)| names.contains(&name))
        .map(|(_, model, dimension)| (model.clone(), *dimension))
        .ok_or_else(|| {
            let known: Vec<&str> = MODELS.iter().map(|(names, _, _)| names[0]).collect();
            Error::config(format!(
                "unsupported fastembed model '{name}' (known: {})",
                known.join(", ")
            ))
        })
}

/// Embeds text with a locally loaded model.
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Load `model_name`, downloading it into `cache_path` on first use.
    pub fn new(model_name: &str, cache_path: Option<&str>) -> Result<Self> {
        let (variant, dimension) = lookup(model_name)?;

        let mut options = InitOptions::new(variant);
        if let Some(dir) = cache_path {
            options = options.with_cache_dir(PathBuf::from(dir));
        }
        let model = TextEmbedding::try_new(options)
            .map_err(|e| Error::config(format!("cannot load fastembed model {model_name}: {e}")))?;
        log::info!("loaded local embedding model {model_name} ({dimension} dims)");

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::generation(format!("{} returned no vector", self.model_name)))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let owned: Vec<String> = texts.iter().map(|t| (*t).to_owned()).collect();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| Error::generation("fastembed model lock poisoned"))?;
            model
                .embed(owned, None)
                .map_err(|e| Error::generation(format!("local embedding failed: {e}")))
        })
        .await
        .map_err(|e| Error::generation_with_source("embedding task did not complete", e))??;

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::generation(format!(
                "{} produced a {}-dim vector, expected {}",
                self.model_name,
                bad.len(),
                self.dimension
            )));
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_accepts_both_spellings() {
        assert_eq!(lookup("bge-small-en-v1.5").unwrap().1, 384);
        assert_eq!(lookup("BGEBaseENV15").unwrap().1, 768);
    }

    #[test]
    fn test_lookup_unknown_lists_known_models() {
        let err = lookup("word2vec").unwrap_err();
        assert!(err.to_string().contains("all-minilm-l6-v2"));
    }

    #[tokio::test]
    #[ignore = "downloads a model"]
    async fn test_local_batch_matches_dimension() {
        let provider = FastEmbedProvider::new("bge-small-en-v1.5", None).unwrap();
        let vectors = provider
            .embed_batch(&["reset password", "billing"])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == provider.dimension()));
    }
}
