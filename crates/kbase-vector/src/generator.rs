//! Embedding generation for documents.
//!
//! [`EmbeddingGenerator::regenerate`] turns a document's text into its set of
//! searchable term vectors:
//!
//! 1. ask the generative model for search-term candidates as JSON
//!    (`{"search_terms": [...]}`)
//! 2. embed every term in bounded-concurrency batches
//! 3. replace the document's stored terms in one step
//!
//! Nothing is written until every vector is in hand, so a failed run leaves
//! the previous term set in place.

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt, stream};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use kbase_core::{
    Document, DocumentId, EmbeddingConfig, EmbeddingTermStore, Error, KeyedLocks, LlmConfig,
    NewEmbeddingTerm, Result, with_timeout,
};
use kbase_llm::{CompletionRequest, LlmProvider};

/// Structured response expected from the generative model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchTerms {
    /// Short queries a reader might type to find the document.
    pub search_terms: Vec<String>,
}

/// Tuning for [`EmbeddingGenerator`].
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Terms per embedding request.
    pub batch_size: usize,
    /// Embedding requests in flight at once.
    pub concurrency: usize,
    /// Deadline for the term-extraction call.
    pub llm_timeout: Option<Duration>,
    /// Deadline for each embedding request.
    pub embedding_timeout: Option<Duration>,
    /// Token cap for the term-extraction response.
    pub max_tokens: u32,
    /// Sampling temperature for term extraction.
    pub temperature: Option<f32>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default(), &EmbeddingConfig::default())
    }
}

impl GeneratorOptions {
    /// Derive options from the `llm` and `embedding` config sections.
    pub fn from_config(llm: &LlmConfig, embedding: &EmbeddingConfig) -> Self {
        Self {
            batch_size: embedding.batch_size.max(1),
            concurrency: embedding.concurrency.max(1),
            llm_timeout: llm.timeout(),
            embedding_timeout: embedding.timeout(),
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
        }
    }
}

/// Builds the term-extraction instruction, embedding the response schema.
pub fn system_prompt() -> Result<String> {
    let mut schema = serde_json::to_value(schemars::schema_for!(SearchTerms))?;
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
    }

    Ok(format!(
        "You generate search queries for a help-center article.\n\
         Read the article and list diverse, on-topic phrases a customer might \
         type when looking for it: questions, short keyword queries, and \
         synonyms of the main concepts. Stay on the article's subject.\n\
         Respond with a single JSON object and nothing else, matching this \
         schema:\n{}",
        serde_json::to_string_pretty(&schema)?
    ))
}

/// Strip one surrounding Markdown code fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => body.trim(),
    }
}

/// Parse a term-extraction response.
///
/// Terms are kept exactly as the model returned them, one stored term per
/// entry. An empty list is valid.
pub fn parse_search_terms(raw: &str) -> Result<Vec<String>> {
    let parsed: SearchTerms = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| Error::generation_with_source("malformed search-term response", e))?;
    Ok(parsed.search_terms)
}

/// Regenerates the embedding terms of documents.
pub struct EmbeddingGenerator {
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    terms: Arc<dyn EmbeddingTermStore>,
    options: GeneratorOptions,
    locks: KeyedLocks<DocumentId>,
}

impl EmbeddingGenerator {
    /// Create a generator with default options.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        terms: Arc<dyn EmbeddingTermStore>,
    ) -> Self {
        Self {
            llm,
            embedder,
            terms,
            options: GeneratorOptions::default(),
            locks: KeyedLocks::new(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    /// The embedding provider, shared with the query path.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Build the term-extraction request for `document`.
    pub fn build_request(&self, document: &Document) -> Result<CompletionRequest> {
        let mut request = CompletionRequest::prompt(format!(
            "Title: {}\n\n{}",
            document.title, document.content
        ))
        .with_system_prompt(system_prompt()?)
        .with_max_tokens(self.options.max_tokens);
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        Ok(request)
    }

    /// Ask the generative model for search terms describing `document`.
    pub async fn extract_search_terms(&self, document: &Document) -> Result<Vec<String>> {
        let request = self.build_request(document)?;
        let id = document.id;

        let response = with_timeout(self.options.llm_timeout, self.llm.complete(request), || {
            Error::generation(format!("term extraction for document {id} timed out"))
        })
        .await?;
        if response.is_truncated() {
            log::warn!("term extraction for document {id} hit the token cap");
        }

        let terms = parse_search_terms(&response.content)?;
        log::debug!(
            "{} proposed {} terms for document {id}",
            self.llm.name(),
            terms.len()
        );
        Ok(terms)
    }

    /// Embed `terms`, preserving order.
    ///
    /// Terms are sent in batches of `batch_size`, with at most `concurrency`
    /// batches in flight.
    pub async fn embed_terms(&self, terms: &[String]) -> Result<Vec<Vec<f32>>> {
        let embedder = &self.embedder;
        let timeout = self.options.embedding_timeout;

        let batches: Vec<Vec<Vec<f32>>> = stream::iter(terms.chunks(self.options.batch_size.max(1)))
            .map(|chunk| async move {
                let texts: Vec<&str> = chunk.iter().map(String::as_str).collect();
                let vectors = with_timeout(timeout, embedder.embed_batch(&texts), || {
                    Error::generation(format!("embedding {} terms timed out", texts.len()))
                })
                .await?;
                if vectors.len() != chunk.len() {
                    return Err(Error::generation(format!(
                        "{} returned {} vectors for {} terms",
                        embedder.name(),
                        vectors.len(),
                        chunk.len()
                    )));
                }
                Ok(vectors)
            })
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    /// Recompute and store the term set of `document`. Returns the number of
    /// terms stored.
    ///
    /// Concurrent calls for the same document run one at a time.
    pub async fn regenerate(&self, document: &Document) -> Result<usize> {
        let _guard = self.locks.lock(&document.id).await;

        let terms = self.extract_search_terms(document).await?;
        let vectors = self.embed_terms(&terms).await?;

        let rows: Vec<NewEmbeddingTerm> = terms
            .into_iter()
            .zip(vectors)
            .map(|(term, embedding)| NewEmbeddingTerm::new(term, embedding))
            .collect();

        let stored = self.terms.replace_terms(document.id, rows).await?;
        log::debug!(
            "stored {} embedding terms for document {}",
            stored.len(),
            document.id
        );
        Ok(stored.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
