//! Embedding generation and vector search for kbase.
//!
//! # Modules
//!
//! - [`embedding`]: `EmbeddingProvider` trait and mock
//! - [`openai`]: OpenAI-compatible HTTP provider
//! - `fastembed`: local models (requires `vector-fastembed` feature)
//! - [`generator`]: turns document text into stored term vectors
//! - [`index`]: filtered cosine-distance nearest-neighbor search

#![doc = include_str!("../README.md")]

pub mod embedding;
pub mod generator;
pub mod index;
pub mod openai;

#[cfg(feature = "vector-fastembed")]
pub mod fastembed;

use std::sync::Arc;

use kbase_core::{EmbeddingConfig, Error, Result};

// Re-exports
pub use embedding::{EmbeddingProvider, MockEmbeddingProvider};
pub use generator::{EmbeddingGenerator, GeneratorOptions, SearchTerms, parse_search_terms};
pub use index::{
    BruteForceVectorIndex, DEFAULT_K, Neighbor, VectorIndex, cosine_distance, cosine_similarity,
};
pub use openai::OpenAiEmbeddingProvider;

#[cfg(feature = "vector-fastembed")]
pub use crate::fastembed::FastEmbedProvider;

/// Environment variable consulted when `embedding.api_key` is unset.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Build the provider named by `config.provider`.
///
/// Supported providers: `"openai"`, `"mock"`, and `"fastembed"` (with the
/// `vector-fastembed` feature).
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = config
                .api_key
                .clone()
                .or_else(|| std::env::var(API_KEY_ENV).ok())
                .ok_or_else(|| {
                    Error::config(format!(
                        "embedding.api_key is not set and {API_KEY_ENV} is not in the environment"
                    ))
                })?;
            let mut provider = OpenAiEmbeddingProvider::new(api_key, &config.model, config.dimension);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Ok(Arc::new(provider))
        }
        "mock" => Ok(Arc::new(MockEmbeddingProvider::new(config.dimension))),
        #[cfg(feature = "vector-fastembed")]
        "fastembed" => Ok(Arc::new(FastEmbedProvider::new(
            &config.model,
            config.cache_path.as_deref(),
        )?)),
        #[cfg(not(feature = "vector-fastembed"))]
        "fastembed" => Err(Error::config(
            "fastembed provider requires the vector-fastembed feature",
        )),
        other => Err(Error::config(format!("Unknown embedding provider: {other}"))),
    }
}
