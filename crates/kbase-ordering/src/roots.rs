//! Canonicalization of duplicate documents.
//!
//! A document may point at the root of its duplicate group. Groups are kept
//! one level deep: a root never has a root of its own.

use std::sync::Arc;

use kbase_core::{Document, DocumentId, DocumentStore, Result};

/// Links documents to the root of their duplicate group.
pub struct RootResolver {
    store: Arc<dyn DocumentStore>,
}

impl RootResolver {
    /// Create a resolver over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Associate `document` with the group of `candidate`.
    ///
    /// The candidate is looked up within the document's portal; a miss is a
    /// silent no-op. The stored root is the candidate's own root when it has
    /// one, else the candidate. Documents that were rooted at `document` are
    /// re-pointed at the new root. Returns the root that was set, if any.
    pub async fn associate_root(
        &self,
        document: &mut Document,
        candidate: DocumentId,
    ) -> Result<Option<DocumentId>> {
        let Some(candidate) = self
            .store
            .find_in_portal(document.portal_id, candidate)
            .await?
        else {
            log::debug!(
                "root candidate {candidate} not found in portal {}",
                document.portal_id
            );
            return Ok(None);
        };

        let root = candidate.root_document_id.unwrap_or(candidate.id);
        if root == document.id {
            return Ok(None);
        }

        self.store.update_root(document.id, Some(root)).await?;
        let moved = self.store.reassign_roots(document.id, root).await?;
        if moved > 0 {
            log::debug!("re-pointed {moved} documents from {} to root {root}", document.id);
        }
        document.root_document_id = Some(root);
        Ok(Some(root))
    }
}
