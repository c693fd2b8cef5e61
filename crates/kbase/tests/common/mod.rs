//! Shared fixtures for the kbase integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kbase::llm::{CompletionRequest, CompletionResponse, LlmProvider, StopReason, TokenUsage};
use kbase::vector::MockEmbeddingProvider;
use kbase::{
    Category, CategoryId, Document, DocumentId, DocumentUpdate, Error, KbaseConfig, KnowledgeBase,
    MemoryStore, Result,
};
use kbase_core::{AccountId, AuthorId, DocumentStore, PortalId, PositionScope, Sequencing};
use kbase_fts::TantivyKeywordIndex;

pub const DIM: usize = 16;

/// Proposes the lowercased document title as its only search term.
#[derive(Default)]
pub struct TitleTermsLlm {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl TitleTermsLlm {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for TitleTermsLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::generation("model unavailable"));
        }
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let title = prompt
            .strip_prefix("Title: ")
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap_or_default();
        Ok(CompletionResponse {
            content: serde_json::json!({ "search_terms": [title.to_lowercase()] }).to_string(),
            tokens_used: TokenUsage::default(),
            stop_reason: StopReason::EndTurn,
        })
    }

    fn name(&self) -> &str {
        "title-terms"
    }
}

/// Delegates to a [`MemoryStore`], pausing after every max-position read and
/// before every row update so concurrent writers interleave with them.
pub struct SlowStore {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl DocumentStore for SlowStore {
    async fn get(&self, id: DocumentId) -> Result<Option<Document>> {
        self.inner.get(id).await
    }

    async fn find_in_portal(&self, portal_id: PortalId, id: DocumentId) -> Result<Option<Document>> {
        self.inner.find_in_portal(portal_id, id).await
    }

    async fn insert(&self, document: Document) -> Result<()> {
        self.inner.insert(document).await
    }

    async fn update(&self, id: DocumentId, changes: &DocumentUpdate) -> Result<Document> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.update(id, changes).await
    }

    async fn delete(&self, id: DocumentId) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn update_position(&self, id: DocumentId, position: i64) -> Result<()> {
        self.inner.update_position(id, position).await
    }

    async fn update_root(&self, id: DocumentId, root: Option<DocumentId>) -> Result<()> {
        self.inner.update_root(id, root).await
    }

    async fn reassign_roots(&self, from: DocumentId, to: DocumentId) -> Result<usize> {
        self.inner.reassign_roots(from, to).await
    }

    async fn max_position(
        &self,
        scope: PositionScope,
        excluding: Option<DocumentId>,
    ) -> Result<Option<i64>> {
        let max = self.inner.max_position(scope, excluding).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(max)
    }

    async fn list(&self, portal_id: Option<PortalId>) -> Result<Vec<Document>> {
        self.inner.list(portal_id).await
    }

    async fn categories(&self, portal_id: Option<PortalId>) -> Result<Vec<Category>> {
        self.inner.categories(portal_id).await
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub llm: Arc<TitleTermsLlm>,
    pub embedder: Arc<MockEmbeddingProvider>,
    pub kb: KnowledgeBase,
}

pub fn harness() -> Harness {
    harness_with(KbaseConfig::default())
}

pub fn harness_with(config: KbaseConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    build(store.clone(), store, &config)
}

/// A harness whose position reads and row updates are slowed down, for race
/// tests.
pub fn slow_harness(sequencing: Sequencing) -> Harness {
    let mut config = KbaseConfig::default();
    config.positions.sequencing = sequencing;
    let store = Arc::new(MemoryStore::new());
    let slow = Arc::new(SlowStore {
        inner: store.clone(),
    });
    build(slow, store, &config)
}

fn build(documents: Arc<dyn DocumentStore>, store: Arc<MemoryStore>, config: &KbaseConfig) -> Harness {
    let llm = Arc::new(TitleTermsLlm::default());
    let embedder = Arc::new(MockEmbeddingProvider::new(DIM));
    let keyword = Arc::new(TantivyKeywordIndex::in_memory().unwrap());
    let kb = KnowledgeBase::new(
        documents,
        store.clone(),
        llm.clone(),
        embedder.clone(),
        keyword,
        config,
    );
    Harness {
        store,
        llm,
        embedder,
        kb,
    }
}

/// A draft document in account 1, portal 1.
pub fn article(id: i64, title: &str) -> Document {
    in_portal(id, 1, title)
}

pub fn in_portal(id: i64, portal: i64, title: &str) -> Document {
    Document::new(DocumentId(id), AccountId(1), PortalId(portal), AuthorId(1), title)
        .with_slug(format!("article-{id}"))
}

pub async fn add_category(store: &MemoryStore, id: i64, slug: &str, locale: &str) -> CategoryId {
    store
        .add_category(Category::new(CategoryId(id), PortalId(1), slug, locale))
        .await;
    CategoryId(id)
}

pub fn ids(documents: &[Document]) -> Vec<i64> {
    documents.iter().map(|d| d.id.0).collect()
}
