//! Configuration for kbase.
//!
//! Provides [`KbaseConfig`], loaded from TOML files, environment variables,
//! and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit path passed to [`KbaseConfig::load`]
//! 2. `KBASE_CONFIG` environment variable
//! 3. XDG default: `~/.config/kbase/config.toml`
//! 4. Built-in defaults
//!
//! `KBASE_<SECTION>_<KEY>` environment variables override file values.

use confyg::{Confygery, env};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

// ============================================================================
// Configuration structs
// ============================================================================

/// Top-level kbase configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KbaseConfig {
    /// Generative model used for search-term extraction.
    pub llm: LlmConfig,

    /// Embedding provider and pipeline settings.
    pub embedding: EmbeddingConfig,

    /// Query planner settings.
    pub search: SearchConfig,

    /// Keyword index settings.
    pub keyword: KeywordConfig,

    /// Position manager settings.
    pub positions: PositionConfig,
}

/// Generative model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "claude".
    pub provider: String,

    /// Model identifier.
    pub model: String,

    /// API key. Falls back to `ANTHROPIC_API_KEY` when unset.
    pub api_key: Option<String>,

    /// API base URL override.
    pub base_url: Option<String>,

    /// Maximum tokens in the term-extraction response.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Per-call timeout in seconds (0 disables).
    pub timeout_secs: u64,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "openai", "fastembed", or "mock".
    pub provider: String,

    /// Embedding model name.
    pub model: String,

    /// Vector dimension.
    pub dimension: usize,

    /// API key. Falls back to `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,

    /// API base URL override.
    pub base_url: Option<String>,

    /// Model cache directory for local providers.
    pub cache_path: Option<String>,

    /// Texts per embedding request.
    pub batch_size: usize,

    /// Embedding requests in flight per regeneration.
    pub concurrency: usize,

    /// Per-call timeout in seconds (0 disables).
    pub timeout_secs: u64,
}

/// Query planner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Neighbors returned by vector search.
    pub vector_limit: usize,

    /// Discard term rows farther than this cosine distance.
    pub distance_threshold: Option<f32>,

    /// Per-call timeout in seconds (0 disables).
    pub timeout_secs: u64,
}

/// Keyword index configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Index directory; the index lives in RAM when unset.
    pub index_path: Option<String>,
}

/// How concurrent position assignments in one scope are sequenced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sequencing {
    /// A per-scope lock spans reading the max position and writing the new one.
    #[default]
    Serialized,
    /// No lock: concurrent creates may read the same max and collide.
    Unsynchronized,
}

/// Position manager configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    /// Sequencing mode.
    pub sequencing: Sequencing,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 1024,
            temperature: Some(0.2),
            timeout_secs: 60,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            api_key: None,
            base_url: None,
            cache_path: None,
            batch_size: 64,
            concurrency: 4,
            timeout_secs: 30,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            vector_limit: 5,
            distance_threshold: None,
            timeout_secs: 10,
        }
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl LlmConfig {
    /// The per-call timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout_secs)
    }
}

impl EmbeddingConfig {
    /// The per-call timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout_secs)
    }
}

impl SearchConfig {
    /// The per-call timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout_secs)
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl KbaseConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path) {
            if path.exists() {
                log::debug!("loading config from {}", path.display());
                builder
                    .add_file(&path.to_string_lossy())
                    .map_err(|e| Error::config(format!("config file: {e}")))?;
            }
        }

        let mut env_opts = env::Options::with_top_level("KBASE");
        env_opts.add_section("llm");
        env_opts.add_section("embedding");
        env_opts.add_section("search");
        env_opts.add_section("keyword");
        env_opts.add_section("positions");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path from explicit argument, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("KBASE_CONFIG") {
            return Some(PathBuf::from(path));
        }

        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kbase").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.batch_size == 0 {
            return Err(Error::config("embedding.batch_size must be at least 1"));
        }
        if self.embedding.concurrency == 0 {
            return Err(Error::config("embedding.concurrency must be at least 1"));
        }
        if self.search.vector_limit == 0 {
            return Err(Error::config("search.vector_limit must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KbaseConfig::default();
        assert_eq!(config.llm.provider, "claude");
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.embedding.concurrency, 4);
        assert_eq!(config.search.vector_limit, 5);
        assert!(config.search.distance_threshold.is_none());
        assert!(config.keyword.index_path.is_none());
        assert_eq!(config.positions.sequencing, Sequencing::Serialized);
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = KbaseConfig::from_toml_str(
            r#"
[embedding]
provider = "mock"
dimension = 8

[positions]
sequencing = "unsynchronized"
"#,
        )
        .unwrap();

        assert_eq!(config.embedding.provider, "mock");
        assert_eq!(config.embedding.dimension, 8);
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.positions.sequencing, Sequencing::Unsynchronized);
        assert_eq!(config.llm.max_tokens, 1024);
    }

    #[test]
    fn test_from_toml_rejects_zero_batch() {
        let err = KbaseConfig::from_toml_str("[embedding]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_timeouts() {
        let mut config = KbaseConfig::default();
        assert_eq!(config.search.timeout(), Some(Duration::from_secs(10)));
        config.llm.timeout_secs = 0;
        assert!(config.llm.timeout().is_none());
    }

    #[test]
    fn test_toml_roundtrip_string() {
        let toml = KbaseConfig::default().to_toml_string().unwrap();
        assert!(toml.contains("[llm]"));
        assert!(toml.contains("vector_limit = 5"));
        let parsed = KbaseConfig::from_toml_str(&toml).unwrap();
        assert_eq!(parsed.embedding.model, "text-embedding-3-small");
    }

    #[test]
    fn test_resolve_explicit_path_wins() {
        let path = KbaseConfig::resolve_config_path(Some("/tmp/kbase.toml"));
        assert_eq!(path, Some(PathBuf::from("/tmp/kbase.toml")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[search]\nvector_limit = 3\n").unwrap();

        let config = KbaseConfig::load(Some(&path.to_string_lossy())).unwrap();
        assert_eq!(config.search.vector_limit, 3);
    }
}
