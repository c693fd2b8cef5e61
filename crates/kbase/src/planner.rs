//! Hybrid query planning.
//!
//! The planner narrows a portal's documents with a [`FilterChain`], then
//! either ranks the survivors with the keyword index, ranks them by vector
//! distance, or orders them for browsing. Keyword and vector rankings are
//! separate entry points and are never merged.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kbase_core::{
    AuthorId, Document, DocumentId, DocumentStatus, DocumentStore, Error, PortalId, Result,
    SearchConfig, with_timeout,
};
use kbase_fts::KeywordIndex;
use kbase_vector::{DEFAULT_K, EmbeddingProvider, VectorIndex};
use serde::{Deserialize, Serialize};

use crate::filter::FilterChain;

/// Browse order used when no query text is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentOrder {
    /// Ascending position; unpositioned documents last.
    #[default]
    Position,
    /// Newest first.
    Recent,
    /// Most viewed first.
    Views,
}

impl DocumentOrder {
    /// Sort `documents` in place. Ties fall back to ascending id.
    pub fn sort(&self, documents: &mut [Document]) {
        match self {
            Self::Position => documents.sort_by(|a, b| {
                let by_position = match (a.position, b.position) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                by_position.then(a.id.cmp(&b.id))
            }),
            Self::Recent => documents
                .sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id))),
            Self::Views => documents.sort_by(|a, b| b.views.cmp(&a.views).then(a.id.cmp(&b.id))),
        }
    }
}

/// Parameters of a search or browse request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Restrict to one portal.
    pub portal_id: Option<PortalId>,
    /// Category slug filter.
    pub category_slug: Option<String>,
    /// Category locale filter.
    pub locale: Option<String>,
    /// Author filter.
    pub author_id: Option<AuthorId>,
    /// Status filter.
    pub status: Option<DocumentStatus>,
    /// Free-text query.
    pub query: Option<String>,
    /// Browse order when there is no query.
    #[serde(default)]
    pub order: DocumentOrder,
    /// Maximum number of documents returned.
    pub limit: Option<usize>,
}

impl SearchParams {
    /// Parameters matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to `portal_id`.
    pub fn with_portal(mut self, portal_id: PortalId) -> Self {
        self.portal_id = Some(portal_id);
        self
    }

    /// Filter by category slug.
    pub fn with_category_slug(mut self, slug: impl Into<String>) -> Self {
        self.category_slug = Some(slug.into());
        self
    }

    /// Filter by category locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Filter by author.
    pub fn with_author(mut self, author_id: AuthorId) -> Self {
        self.author_id = Some(author_id);
        self
    }

    /// Filter by status.
    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the query text.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the browse order.
    pub fn with_order(mut self, order: DocumentOrder) -> Self {
        self.order = order;
        self
    }

    /// Cap the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The trimmed query text, or `None` when absent or blank.
    pub fn query_text(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// Filters candidates and dispatches to keyword or vector ranking.
pub struct QueryPlanner {
    store: Arc<dyn DocumentStore>,
    keyword: Arc<dyn KeywordIndex>,
    vectors: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_limit: usize,
    timeout: Option<Duration>,
}

impl QueryPlanner {
    /// Create a planner with the default neighbor count and no timeout.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        keyword: Arc<dyn KeywordIndex>,
        vectors: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            keyword,
            vectors,
            embedder,
            vector_limit: DEFAULT_K,
            timeout: None,
        }
    }

    /// Apply the neighbor count and timeout from `config`.
    pub fn with_config(mut self, config: &SearchConfig) -> Self {
        self.vector_limit = config.vector_limit;
        self.timeout = config.timeout();
        self
    }

    /// Neighbors returned by [`vector_search`](Self::vector_search).
    pub fn vector_limit(&self) -> usize {
        self.vector_limit
    }

    /// Documents of the requested portal that pass every filter, in store
    /// order.
    pub async fn candidates(&self, params: &SearchParams) -> Result<Vec<Document>> {
        let documents = self.store.list(params.portal_id).await?;
        let chain = FilterChain::from_params(params);
        if chain.is_empty() {
            return Ok(documents);
        }
        let categories = self.store.categories(params.portal_id).await?;
        Ok(chain.apply(documents, &categories))
    }

    /// Keyword search when query text is present, otherwise an ordered
    /// listing of the candidates.
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<Document>> {
        let mut candidates = self.candidates(params).await?;

        let mut results = match params.query_text() {
            Some(query) => {
                let ids: Vec<DocumentId> = candidates.iter().map(|d| d.id).collect();
                let hits = with_timeout(self.timeout, self.keyword.search(&ids, query), || {
                    Error::search(format!("keyword search for '{query}' timed out"))
                })
                .await?;
                log::debug!(
                    "{}: '{query}' matched {} of {} candidates",
                    self.keyword.name(),
                    hits.len(),
                    ids.len()
                );
                pick(candidates, hits.iter().map(|h| h.document_id))
            }
            None => {
                params.order.sort(&mut candidates);
                candidates
            }
        };

        if let Some(limit) = params.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    /// Nearest documents to the query text by term-vector distance.
    ///
    /// Query text is required. Results are ordered by ascending distance and
    /// hold at most `vector_limit` documents.
    pub async fn vector_search(&self, params: &SearchParams) -> Result<Vec<Document>> {
        let query = params
            .query_text()
            .ok_or_else(|| Error::validation("vector search requires query text"))?;

        let candidates = self.candidates(params).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let vector = with_timeout(self.timeout, self.embedder.embed(query), || {
            Error::search(format!("embedding query '{query}' timed out"))
        })
        .await
        .map_err(|e| {
            if e.is_search() {
                e
            } else {
                Error::search_with_source("failed to embed query", e)
            }
        })?;

        let ids: Vec<DocumentId> = candidates.iter().map(|d| d.id).collect();
        let neighbors = with_timeout(
            self.timeout,
            self.vectors.nearest_neighbors(&ids, &vector, self.vector_limit),
            || Error::search(format!("vector search for '{query}' timed out")),
        )
        .await?;
        log::debug!(
            "{}: '{query}' found {} neighbors among {} candidates",
            self.vectors.name(),
            neighbors.len(),
            ids.len()
        );

        let mut results = pick(candidates, neighbors.iter().map(|n| n.document_id));
        if let Some(limit) = params.limit {
            results.truncate(limit);
        }
        Ok(results)
    }
}

/// Take the documents named by `order` out of `candidates`, in that order.
/// Ids that are not candidates are skipped.
fn pick(candidates: Vec<Document>, order: impl Iterator<Item = DocumentId>) -> Vec<Document> {
    let mut by_id: HashMap<DocumentId, Document> =
        candidates.into_iter().map(|d| (d.id, d)).collect();
    order.filter_map(|id| by_id.remove(&id)).collect()
}

// ============================================================================
// Tests
// ============================================================================
