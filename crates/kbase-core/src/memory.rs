//! In-process storage collaborator.
//!
//! `MemoryStore` implements both [`DocumentStore`] and [`EmbeddingTermStore`]
//! over a single lock, so cascades (terms on document delete, roots on root
//! delete) are applied atomically. It is the fallback store for tests and
//! for embedding kbase without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::store::{DocumentStore, EmbeddingTermStore};
use crate::types::{
    Category, CategoryId, Document, DocumentId, DocumentUpdate, EmbeddingTerm, EmbeddingTermId,
    NewEmbeddingTerm, PortalId, PositionScope,
};
use crate::{Error, Result};

#[derive(Default)]
struct Tables {
    documents: BTreeMap<DocumentId, Document>,
    categories: BTreeMap<CategoryId, Category>,
    terms: BTreeMap<EmbeddingTermId, EmbeddingTerm>,
    next_term_id: i64,
}

/// Document, category, and embedding-term tables held in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a category.
    pub async fn add_category(&self, category: Category) {
        let mut tables = self.tables.write().await;
        tables.categories.insert(category.id, category);
    }

    /// Number of stored documents.
    pub async fn document_count(&self) -> usize {
        self.tables.read().await.documents.len()
    }

    /// Number of stored embedding terms across all documents.
    pub async fn term_count(&self) -> usize {
        self.tables.read().await.terms.len()
    }
}

fn validate(document: &Document) -> Result<()> {
    if document.title.trim().is_empty() {
        return Err(Error::validation(format!(
            "document {} has an empty title",
            document.id
        )));
    }
    Ok(())
}

fn slug_taken(tables: &Tables, document: &Document) -> bool {
    !document.slug.is_empty()
        && tables
            .documents
            .values()
            .any(|other| other.id != document.id && other.slug == document.slug)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: DocumentId) -> Result<Option<Document>> {
        Ok(self.tables.read().await.documents.get(&id).cloned())
    }

    async fn find_in_portal(
        &self,
        portal_id: PortalId,
        id: DocumentId,
    ) -> Result<Option<Document>> {
        Ok(self
            .tables
            .read()
            .await
            .documents
            .get(&id)
            .filter(|doc| doc.portal_id == portal_id)
            .cloned())
    }

    async fn insert(&self, document: Document) -> Result<()> {
        validate(&document)?;
        let mut tables = self.tables.write().await;
        if tables.documents.contains_key(&document.id) {
            return Err(Error::validation(format!(
                "document {} already exists",
                document.id
            )));
        }
        if slug_taken(&tables, &document) {
            return Err(Error::validation(format!(
                "slug '{}' is already taken",
                document.slug
            )));
        }
        tables.documents.insert(document.id, document);
        Ok(())
    }

    async fn update(&self, id: DocumentId, changes: &DocumentUpdate) -> Result<Document> {
        let mut tables = self.tables.write().await;
        let mut document = tables
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("document {id}")))?;
        changes.apply(&mut document);
        document.updated_at = Utc::now();
        validate(&document)?;
        if slug_taken(&tables, &document) {
            return Err(Error::validation(format!(
                "slug '{}' is already taken",
                document.slug
            )));
        }
        tables.documents.insert(id, document.clone());
        Ok(document)
    }

    async fn delete(&self, id: DocumentId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.documents.remove(&id).is_none() {
            return Ok(false);
        }
        tables.terms.retain(|_, term| term.document_id != id);
        for doc in tables.documents.values_mut() {
            if doc.root_document_id == Some(id) {
                doc.root_document_id = None;
            }
        }
        Ok(true)
    }

    async fn update_position(&self, id: DocumentId, position: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        let doc = tables
            .documents
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("document {id}")))?;
        doc.position = Some(position);
        Ok(())
    }

    async fn update_root(&self, id: DocumentId, root: Option<DocumentId>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let doc = tables
            .documents
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("document {id}")))?;
        doc.root_document_id = root;
        Ok(())
    }

    async fn reassign_roots(&self, from: DocumentId, to: DocumentId) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut moved = 0;
        for doc in tables.documents.values_mut() {
            if doc.root_document_id == Some(from) && doc.id != to {
                doc.root_document_id = Some(to);
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn max_position(
        &self,
        scope: PositionScope,
        excluding: Option<DocumentId>,
    ) -> Result<Option<i64>> {
        Ok(self
            .tables
            .read()
            .await
            .documents
            .values()
            .filter(|doc| doc.position_scope() == scope && Some(doc.id) != excluding)
            .filter_map(|doc| doc.position)
            .max())
    }

    async fn list(&self, portal_id: Option<PortalId>) -> Result<Vec<Document>> {
        Ok(self
            .tables
            .read()
            .await
            .documents
            .values()
            .filter(|doc| portal_id.is_none_or(|portal| doc.portal_id == portal))
            .cloned()
            .collect())
    }

    async fn categories(&self, portal_id: Option<PortalId>) -> Result<Vec<Category>> {
        Ok(self
            .tables
            .read()
            .await
            .categories
            .values()
            .filter(|cat| portal_id.is_none_or(|portal| cat.portal_id == portal))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EmbeddingTermStore for MemoryStore {
    async fn replace_terms(
        &self,
        document_id: DocumentId,
        terms: Vec<NewEmbeddingTerm>,
    ) -> Result<Vec<EmbeddingTerm>> {
        let mut tables = self.tables.write().await;
        if !tables.documents.contains_key(&document_id) {
            return Err(Error::not_found(format!("document {document_id}")));
        }
        tables.terms.retain(|_, term| term.document_id != document_id);

        let mut stored = Vec::with_capacity(terms.len());
        for new_term in terms {
            tables.next_term_id += 1;
            let term = EmbeddingTerm {
                id: EmbeddingTermId(tables.next_term_id),
                document_id,
                term: new_term.term,
                embedding: new_term.embedding,
            };
            tables.terms.insert(term.id, term.clone());
            stored.push(term);
        }
        Ok(stored)
    }

    async fn terms_for(&self, document_ids: &[DocumentId]) -> Result<Vec<EmbeddingTerm>> {
        let tables = self.tables.read().await;
        Ok(tables
            .terms
            .values()
            .filter(|term| document_ids.contains(&term.document_id))
            .cloned()
            .collect())
    }

    async fn delete_terms(&self, document_id: DocumentId) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.terms.len();
        tables.terms.retain(|_, term| term.document_id != document_id);
        Ok(before - tables.terms.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
