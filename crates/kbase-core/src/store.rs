//! Storage collaborator traits.
//!
//! The engine never owns persistence. It talks to the document and
//! embedding-term tables through these traits; the data-access layer of the
//! host application implements them. [`MemoryStore`](crate::MemoryStore) is
//! the in-process implementation used for tests and embedded setups.
//!
//! Implementations are expected to uphold the collaborator contract:
//!
//! - deleting a document cascades to its embedding terms
//! - deleting a root document nullifies `root_document_id` on its members
//! - slugs are unique

use async_trait::async_trait;

use crate::types::{
    Category, Document, DocumentId, DocumentUpdate, EmbeddingTerm, NewEmbeddingTerm, PortalId,
    PositionScope,
};
use crate::Result;

/// Access to document rows and their categories.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id.
    async fn get(&self, id: DocumentId) -> Result<Option<Document>>;

    /// Fetch a document by id, only if it belongs to `portal_id`.
    async fn find_in_portal(&self, portal_id: PortalId, id: DocumentId)
    -> Result<Option<Document>>;

    /// Insert a new document.
    async fn insert(&self, document: Document) -> Result<()>;

    /// Write the columns `changes` sets, stamp `updated_at`, and return the
    /// row as stored. Columns it leaves unset keep their current values.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) for unknown ids.
    async fn update(&self, id: DocumentId, changes: &DocumentUpdate) -> Result<Document>;

    /// Delete a document. Returns `false` when it did not exist.
    async fn delete(&self, id: DocumentId) -> Result<bool>;

    /// Write only the position column, bypassing validation.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) for unknown ids.
    async fn update_position(&self, id: DocumentId, position: i64) -> Result<()>;

    /// Write only the root-document column.
    async fn update_root(&self, id: DocumentId, root: Option<DocumentId>) -> Result<()>;

    /// Re-point every document rooted at `from` to `to`. Returns the count.
    async fn reassign_roots(&self, from: DocumentId, to: DocumentId) -> Result<usize>;

    /// Highest position in `scope`, ignoring `excluding` and unpositioned rows.
    async fn max_position(
        &self,
        scope: PositionScope,
        excluding: Option<DocumentId>,
    ) -> Result<Option<i64>>;

    /// All documents, optionally restricted to one portal.
    async fn list(&self, portal_id: Option<PortalId>) -> Result<Vec<Document>>;

    /// All categories, optionally restricted to one portal.
    async fn categories(&self, portal_id: Option<PortalId>) -> Result<Vec<Category>>;

    /// Fetch several documents, preserving the order of `ids` and skipping
    /// unknown ones.
    async fn get_many(&self, ids: &[DocumentId]) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(document) = self.get(*id).await? {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}

/// Access to the embedding-term rows owned by documents.
#[async_trait]
pub trait EmbeddingTermStore: Send + Sync {
    /// Delete every term of `document_id`, then insert `terms`.
    ///
    /// Implementations must apply the replacement as one step so readers
    /// never observe a half-written set.
    async fn replace_terms(
        &self,
        document_id: DocumentId,
        terms: Vec<NewEmbeddingTerm>,
    ) -> Result<Vec<EmbeddingTerm>>;

    /// Terms belonging to any of `document_ids`.
    async fn terms_for(&self, document_ids: &[DocumentId]) -> Result<Vec<EmbeddingTerm>>;

    /// Delete every term of `document_id`. Returns the count.
    async fn delete_terms(&self, document_id: DocumentId) -> Result<usize>;
}
