//! Keyword index backed by Tantivy.
//!
//! `TantivyKeywordIndex` keeps one Tantivy document per kbase document and
//! serves candidate-restricted BM25 queries built by [`QueryBuilder`].
//! Every write commits and reloads the reader, so searches see it at once.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kbase_fts::{KeywordIndex, TantivyKeywordIndex};
//!
//! let index = TantivyKeywordIndex::in_memory()?;
//! index.upsert(&document).await?;
//! let hits = index.search(&candidate_ids, "reset pass").await?;
//! ```

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use kbase_core::{Document, DocumentId, Error, KeywordConfig, Result};
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::schema::Value;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use crate::backend::{KeywordHit, KeywordIndex};
use crate::query::QueryBuilder;
use crate::schema::KeywordSchema;

const WRITER_HEAP_BYTES: usize = 50_000_000;
const TEXT_TOKENIZER: &str = "default";

/// Tantivy-based keyword index.
pub struct TantivyKeywordIndex {
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    schema: KeywordSchema,
}

impl TantivyKeywordIndex {
    /// Create an index held entirely in RAM.
    pub fn in_memory() -> Result<Self> {
        let schema = KeywordSchema::build();
        let index = Index::create_in_ram(schema.schema.clone());
        Self::from_index(index, schema)
    }

    /// Open the index stored in `path`, creating it if absent.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let schema = KeywordSchema::build();
        let directory = MmapDirectory::open(path).map_err(|e| {
            Error::search_with_source(format!("failed to open {}", path.display()), e)
        })?;
        let index = Index::open_or_create(directory, schema.schema.clone())
            .map_err(|e| Error::search_with_source("failed to open keyword index", e))?;
        log::debug!("opened keyword index at {}", path.display());
        Self::from_index(index, schema)
    }

    /// Open the configured index directory, or a RAM index when none is set.
    pub fn from_config(config: &KeywordConfig) -> Result<Self> {
        match &config.index_path {
            Some(path) => Self::open_or_create(Path::new(path)),
            None => Self::in_memory(),
        }
    }

    fn from_index(index: Index, schema: KeywordSchema) -> Result<Self> {
        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| Error::search_with_source("failed to create index writer", e))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| Error::search_with_source("failed to create index reader", e))?;

        Ok(Self {
            index,
            writer: Mutex::new(writer),
            reader,
            schema,
        })
    }

    /// Number of live documents visible to searches.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    fn to_tantivy(&self, document: &Document) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_i64(self.schema.id, document.id.0);
        doc.add_text(self.schema.title, &document.title);
        if let Some(description) = &document.description {
            doc.add_text(self.schema.description, description);
        }
        doc.add_text(self.schema.content, &document.content);
        doc
    }

    /// Apply `change` to the writer, then commit and reload.
    fn write<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&IndexWriter) -> Result<()>,
    {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| Error::search(format!("index writer poisoned: {e}")))?;
        change(&*writer)?;
        writer
            .commit()
            .map_err(|e| Error::search_with_source("failed to commit keyword index", e))?;
        self.reader
            .reload()
            .map_err(|e| Error::search_with_source("failed to reload keyword index", e))
    }

    fn query_builder(&self) -> Result<QueryBuilder<'_>> {
        let analyzer = self
            .index
            .tokenizers()
            .get(TEXT_TOKENIZER)
            .ok_or_else(|| Error::search(format!("tokenizer '{TEXT_TOKENIZER}' is missing")))?;
        Ok(QueryBuilder::new(&self.schema, analyzer))
    }
}

#[async_trait]
impl KeywordIndex for TantivyKeywordIndex {
    async fn upsert(&self, document: &Document) -> Result<()> {
        let doc = self.to_tantivy(document);
        let id_term = Term::from_field_i64(self.schema.id, document.id.0);
        self.write(|writer| {
            // Delete existing document with same ID (upsert semantics)
            writer.delete_term(id_term);
            writer
                .add_document(doc)
                .map_err(|e| Error::search_with_source("failed to add document", e))?;
            Ok(())
        })?;
        log::debug!("indexed document {}", document.id);
        Ok(())
    }

    async fn remove(&self, id: DocumentId) -> Result<()> {
        let id_term = Term::from_field_i64(self.schema.id, id.0);
        self.write(|writer| {
            writer.delete_term(id_term);
            Ok(())
        })?;
        log::debug!("removed document {id} from keyword index");
        Ok(())
    }

    async fn search(&self, candidates: &[DocumentId], query: &str) -> Result<Vec<KeywordHit>> {
        let Some(query) = self.query_builder()?.build_query(query, candidates)? else {
            return Ok(Vec::new());
        };

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(query.as_ref(), &TopDocs::with_limit(candidates.len()))
            .map_err(|e| Error::search_with_source("keyword search failed", e))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| Error::search_with_source("failed to retrieve document", e))?;
            let id = doc
                .get_first(self.schema.id)
                .and_then(|v| v.as_i64())
                .ok_or_else(|| Error::search("indexed document has no id"))?;
            hits.push(KeywordHit {
                document_id: DocumentId(id),
                score,
            });
        }

        log::debug!(
            "keyword search over {} candidates: {} hits",
            candidates.len(),
            hits.len()
        );
        Ok(hits)
    }

    fn name(&self) -> &str {
        "tantivy"
    }
}

impl std::fmt::Debug for TantivyKeywordIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyKeywordIndex")
            .field("num_docs", &self.num_docs())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
