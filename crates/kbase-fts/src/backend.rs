//! Keyword index abstraction.

use async_trait::async_trait;
use kbase_core::{Document, DocumentId, Result};

/// A document matched by a keyword query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordHit {
    /// The matching document.
    pub document_id: DocumentId,
    /// Engine relevance score (higher is better).
    pub score: f32,
}

/// Full-text index over document title, description, and content.
///
/// Queries require every token to match and prefix-match the final token.
/// Results are ordered by relevance; ties are engine-ordered.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    /// Index `document`, replacing any previous version.
    async fn upsert(&self, document: &Document) -> Result<()>;

    /// Drop `id` from the index. Unknown ids are ignored.
    async fn remove(&self, id: DocumentId) -> Result<()>;

    /// Documents among `candidates` matching `query`, most relevant first.
    ///
    /// An empty candidate set or a query without tokens yields no hits.
    async fn search(&self, candidates: &[DocumentId], query: &str) -> Result<Vec<KeywordHit>>;

    /// Index every document in `documents`.
    async fn upsert_all(&self, documents: &[Document]) -> Result<()> {
        for document in documents {
            self.upsert(document).await?;
        }
        Ok(())
    }

    /// The backend name for diagnostics.
    fn name(&self) -> &str;
}
