//! Filtered nearest-neighbor search over stored embedding terms.
//!
//! There is no ANN structure: the index loads the term rows of the candidate
//! documents, scores each against the query with cosine distance, keeps the
//! best row per document, and returns the `k` closest documents.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use kbase_core::{DocumentId, EmbeddingTerm, EmbeddingTermStore, Error, Result};

/// Default number of neighbors returned by vector search.
pub const DEFAULT_K: usize = 5;

/// A document near the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// The matching document.
    pub document_id: DocumentId,
    /// Cosine distance of the document's closest term (0 = same direction).
    pub distance: f32,
    /// The term that produced `distance`.
    pub term: String,
}

/// Nearest-neighbor search restricted to a candidate set.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` candidate documents ordered by non-decreasing distance.
    ///
    /// An empty `candidates` slice yields an empty result, never a global
    /// search.
    async fn nearest_neighbors(
        &self,
        candidates: &[DocumentId],
        query: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>>;

    /// The index name for diagnostics.
    fn name(&self) -> &str;
}

/// Cosine similarity of two vectors.
///
/// Zero-norm vectors have similarity 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = na * nb;
    if denom < f32::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

/// Cosine distance, `1 - cosine_similarity`, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank term rows against `query` and keep the `k` closest documents.
///
/// Rows whose dimension differs from the query, or that lie beyond
/// `threshold`, are skipped. Equal distances are ordered by document id.
pub fn rank_neighbors<'a, I>(
    rows: I,
    query: &[f32],
    k: usize,
    threshold: Option<f32>,
) -> Vec<Neighbor>
where
    I: IntoIterator<Item = &'a EmbeddingTerm>,
{
    let mut best: HashMap<DocumentId, Neighbor> = HashMap::new();

    for row in rows {
        if row.embedding.len() != query.len() {
            log::warn!(
                "skipping term {} of document {}: dimension {} != {}",
                row.id,
                row.document_id,
                row.embedding.len(),
                query.len()
            );
            continue;
        }

        let distance = cosine_distance(&row.embedding, query);
        if threshold.is_some_and(|limit| distance > limit) {
            continue;
        }

        let closer = best
            .get(&row.document_id)
            .is_none_or(|current| distance < current.distance);
        if closer {
            best.insert(
                row.document_id,
                Neighbor {
                    document_id: row.document_id,
                    distance,
                    term: row.term.clone(),
                },
            );
        }
    }

    let mut neighbors: Vec<Neighbor> = best.into_values().collect();
    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.document_id.cmp(&b.document_id))
    });
    neighbors.truncate(k);
    neighbors
}

/// Exhaustive cosine-distance scan over an [`EmbeddingTermStore`].
pub struct BruteForceVectorIndex {
    terms: Arc<dyn EmbeddingTermStore>,
    distance_threshold: Option<f32>,
}

impl BruteForceVectorIndex {
    /// Create an index reading rows from `terms`.
    pub fn new(terms: Arc<dyn EmbeddingTermStore>) -> Self {
        Self {
            terms,
            distance_threshold: None,
        }
    }

    /// Discard rows farther than `threshold`.
    pub fn with_distance_threshold(mut self, threshold: Option<f32>) -> Self {
        self.distance_threshold = threshold;
        self
    }
}

#[async_trait]
impl VectorIndex for BruteForceVectorIndex {
    async fn nearest_neighbors(
        &self,
        candidates: &[DocumentId],
        query: &[f32],
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        if candidates.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.is_empty() {
            return Err(Error::search("query vector is empty"));
        }

        let rows = self
            .terms
            .terms_for(candidates)
            .await
            .map_err(|e| Error::search_with_source("failed to load embedding terms", e))?;

        let neighbors = rank_neighbors(&rows, query, k, self.distance_threshold);
        log::debug!(
            "vector scan: {} candidates, {} rows, {} neighbors",
            candidates.len(),
            rows.len(),
            neighbors.len()
        );
        Ok(neighbors)
    }

    fn name(&self) -> &str {
        "brute-force"
    }
}

// ============================================================================
// Tests
// ============================================================================
