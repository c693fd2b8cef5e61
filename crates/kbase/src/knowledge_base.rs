//! The assembled engine.
//!
//! [`KnowledgeBase`] wires the store, the keyword and vector indices, the
//! embedding generator, and the ordering components together. Each write
//! runs its follow-up steps (positioning, keyword indexing, embedding
//! regeneration) explicitly and in a fixed order.
//!
//! A failed regeneration does not undo the write; it is reported in the
//! returned [`WriteOutcome`] so callers can retry with
//! [`KnowledgeBase::regenerate_embeddings`].

use std::collections::BTreeMap;
use std::sync::Arc;

use kbase_core::{
    Document, DocumentId, DocumentStore, DocumentUpdate, EmbeddingTermStore, Error, KbaseConfig,
    PortalId, Result,
};
use kbase_fts::{KeywordIndex, TantivyKeywordIndex};
use kbase_llm::LlmProvider;
use kbase_ordering::{CategoryChange, PositionManager, RootResolver};
use kbase_vector::{
    BruteForceVectorIndex, EmbeddingGenerator, EmbeddingProvider, GeneratorOptions,
};

use crate::planner::{QueryPlanner, SearchParams};

/// What happened to a document's embedding terms during a write.
#[derive(Debug)]
pub enum EmbeddingStatus {
    /// Terms were rebuilt; holds the number stored.
    Regenerated(usize),
    /// Indexed text did not change, so terms were left alone.
    Unchanged,
    /// Regeneration failed; the previous terms are still in place.
    Failed(Error),
}

impl EmbeddingStatus {
    /// Whether regeneration failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of a create or update.
#[derive(Debug)]
pub struct WriteOutcome {
    /// The document as persisted.
    pub document: Document,
    /// Embedding regeneration result.
    pub embedding: EmbeddingStatus,
}

/// Search, ordering, and embedding maintenance over one document store.
pub struct KnowledgeBase {
    documents: Arc<dyn DocumentStore>,
    keyword: Arc<dyn KeywordIndex>,
    generator: EmbeddingGenerator,
    positions: PositionManager,
    roots: RootResolver,
    planner: QueryPlanner,
}

impl KnowledgeBase {
    /// Assemble an engine from its collaborators.
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        terms: Arc<dyn EmbeddingTermStore>,
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        keyword: Arc<dyn KeywordIndex>,
        config: &KbaseConfig,
    ) -> Self {
        let generator = EmbeddingGenerator::new(llm, embedder.clone(), terms.clone())
            .with_options(GeneratorOptions::from_config(&config.llm, &config.embedding));
        let vectors = BruteForceVectorIndex::new(terms)
            .with_distance_threshold(config.search.distance_threshold);
        let planner = QueryPlanner::new(
            documents.clone(),
            keyword.clone(),
            Arc::new(vectors),
            embedder,
        )
        .with_config(&config.search);

        Self {
            positions: PositionManager::from_config(documents.clone(), &config.positions),
            roots: RootResolver::new(documents.clone()),
            documents,
            keyword,
            generator,
            planner,
        }
    }

    /// Build the providers and keyword index named in `config` over `store`.
    pub fn from_config<S>(config: &KbaseConfig, store: Arc<S>) -> Result<Self>
    where
        S: DocumentStore + EmbeddingTermStore + 'static,
    {
        config.validate()?;
        let llm = kbase_llm::create_llm_provider(&config.llm)?;
        let embedder = kbase_vector::create_embedding_provider(&config.embedding)?;
        let keyword = Arc::new(TantivyKeywordIndex::from_config(&config.keyword)?);
        log::info!(
            "kbase ready: llm={}, embeddings={}, keyword={}",
            llm.name(),
            embedder.name(),
            keyword.name()
        );
        Ok(Self::new(
            store.clone(),
            store,
            llm,
            embedder,
            keyword,
            config,
        ))
    }

    /// The query planner.
    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    /// The position manager.
    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    /// Fetch a document.
    pub async fn get(&self, id: DocumentId) -> Result<Option<Document>> {
        self.documents.get(id).await
    }

    async fn require(&self, id: DocumentId) -> Result<Document> {
        self.documents
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("document {id}")))
    }

    /// Persist a new document.
    ///
    /// Assigns a position when none is given, indexes the text, and
    /// generates embedding terms.
    pub async fn create(&self, document: Document) -> Result<WriteOutcome> {
        let mut document = self.positions.create(document).await?;
        self.keyword.upsert(&document).await?;

        if document.category_id.is_some() {
            let change = CategoryChange {
                previous: None,
                just_created: true,
            };
            self.positions.on_category_changed(&mut document, change).await?;
        }

        let embedding = self.regenerate(&document).await;
        log::debug!("created document {} at {:?}", document.id, document.position);
        Ok(WriteOutcome {
            document,
            embedding,
        })
    }

    /// Apply `update` to document `id`.
    ///
    /// Only the fields `update` sets are written, so positions and roots
    /// written concurrently survive. A category change moves the document
    /// to the end of its new category. The keyword index and embedding
    /// terms are refreshed only when title, description, or content changed.
    pub async fn update(&self, id: DocumentId, update: DocumentUpdate) -> Result<WriteOutcome> {
        let previous = self.require(id).await?;
        let mut document = self.documents.update(id, &update).await?;

        if document.category_id != previous.category_id {
            let change = CategoryChange {
                previous: previous.category_id,
                just_created: false,
            };
            self.positions.on_category_changed(&mut document, change).await?;
        }

        let embedding = if document.indexed_text_differs(&previous) {
            self.keyword.upsert(&document).await?;
            self.regenerate(&document).await
        } else {
            EmbeddingStatus::Unchanged
        };

        Ok(WriteOutcome {
            document,
            embedding,
        })
    }

    /// Delete document `id` and its index entries. Returns whether it existed.
    pub async fn delete(&self, id: DocumentId) -> Result<bool> {
        let existed = self.documents.delete(id).await?;
        if existed {
            self.keyword.remove(id).await?;
            log::debug!("deleted document {id}");
        }
        Ok(existed)
    }

    /// Put document `id` in the duplicate group of `candidate`.
    pub async fn associate_root(
        &self,
        id: DocumentId,
        candidate: DocumentId,
    ) -> Result<Option<DocumentId>> {
        let mut document = self.require(id).await?;
        self.roots.associate_root(&mut document, candidate).await
    }

    /// Write explicit positions. See [`PositionManager::bulk_reposition`].
    pub async fn bulk_reposition(
        &self,
        positions: &BTreeMap<DocumentId, i64>,
    ) -> Result<Vec<DocumentId>> {
        self.positions.bulk_reposition(positions).await
    }

    /// Keyword search or ordered browse.
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<Document>> {
        self.planner.search(params).await
    }

    /// Nearest documents by embedding distance.
    pub async fn vector_search(&self, params: &SearchParams) -> Result<Vec<Document>> {
        self.planner.vector_search(params).await
    }

    /// Rebuild the embedding terms of document `id`. Returns the term count.
    pub async fn regenerate_embeddings(&self, id: DocumentId) -> Result<usize> {
        let document = self.require(id).await?;
        self.generator.regenerate(&document).await
    }

    /// Re-index every document (of one portal, when given) in the keyword
    /// index. Returns the number indexed.
    pub async fn reindex(&self, portal_id: Option<PortalId>) -> Result<usize> {
        let documents = self.documents.list(portal_id).await?;
        self.keyword.upsert_all(&documents).await?;
        log::info!(
            "re-indexed {} documents in {}",
            documents.len(),
            self.keyword.name()
        );
        Ok(documents.len())
    }

    async fn regenerate(&self, document: &Document) -> EmbeddingStatus {
        match self.generator.regenerate(document).await {
            Ok(count) => EmbeddingStatus::Regenerated(count),
            Err(e) => {
                log::warn!("embedding regeneration for document {} failed: {e}", document.id);
                EmbeddingStatus::Failed(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
