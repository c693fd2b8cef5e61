//! The embedding seam.
//!
//! - `EmbeddingProvider`: text in, fixed-dimension vector out
//! - `MockEmbeddingProvider`: hashed bag-of-words vectors for tests
//!
//! The HTTP and local backends live in [`crate::openai`] and, with the
//! `vector-fastembed` feature, `crate::fastembed`.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kbase_core::{Error, Result};

/// Turns text into vectors of a fixed dimension.
///
/// Search terms and queries must go through the same provider, or their
/// distances mean nothing. Failures are reported as [`Error::Generation`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed `texts`, returning one vector per input in input order.
    ///
    /// The default issues one [`embed`](Self::embed) per text.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Backend name, for logs.
    fn name(&self) -> &str;
}

/// Offline provider for tests and wiring.
///
/// Each lowercased word is hashed into one of `dimension` buckets, and the
/// counts are normalized to unit length. Identical texts get identical
/// vectors and texts sharing words land closer together.
pub struct MockEmbeddingProvider {
    dimension: usize,
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    /// A provider producing `dimension`-long vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call with an input containing `needle`.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    /// Calls to `embed` or `embed_batch` so far.
    pub fn batch_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this provider returns for `text`.
    pub fn embedding_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let bucket = (fnv1a(&word.to_lowercase()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    fn record(&self, texts: &[&str]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_on {
            Some(needle) if texts.iter().any(|t| t.contains(needle.as_str())) => Err(
                Error::generation(format!("mock embedder refused input containing '{needle}'")),
            ),
            _ => Ok(()),
        }
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.record(&[text])?;
        Ok(self.embedding_for(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.record(texts)?;
        Ok(texts.iter().map(|t| self.embedding_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Tests
// ============================================================================
