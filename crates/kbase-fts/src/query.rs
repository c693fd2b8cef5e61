//! Query building with weighted multi-field matching.
//!
//! `QueryBuilder` turns user text into a Tantivy query where:
//! - every token must match in at least one of title, description, content
//! - the final token also matches as a prefix, so partially typed words hit
//! - title and description matches are boosted over content
//! - results are restricted to a candidate id set

use kbase_core::{DocumentId, Error, Result};
use tantivy::Term;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, RegexQuery, TermQuery, TermSetQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::tokenizer::{TextAnalyzer, TokenStream};

use crate::schema::KeywordSchema;

/// Query builder for constructing Tantivy queries.
pub struct QueryBuilder<'a> {
    schema: &'a KeywordSchema,
    analyzer: TextAnalyzer,
}

impl<'a> QueryBuilder<'a> {
    /// Create a builder tokenizing with `analyzer`, which must match the
    /// analyzer used for the text fields at index time.
    pub fn new(schema: &'a KeywordSchema, analyzer: TextAnalyzer) -> Self {
        Self { schema, analyzer }
    }

    /// Tokenize text through the index analyzer.
    pub fn analyze(&mut self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut stream = self.analyzer.token_stream(text);
        while let Some(token) = stream.next() {
            tokens.push(token.text.clone());
        }
        tokens
    }

    /// Build the query for `query_str` over `candidates`.
    ///
    /// Returns `None` when the text has no tokens or there are no candidates.
    pub fn build_query(
        &mut self,
        query_str: &str,
        candidates: &[DocumentId],
    ) -> Result<Option<Box<dyn Query>>> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let tokens = self.analyze(query_str);
        let Some(last) = tokens.len().checked_sub(1) else {
            return Ok(None);
        };

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(tokens.len() + 1);
        for (i, token) in tokens.iter().enumerate() {
            clauses.push((Occur::Must, self.token_query(token, i == last)?));
        }

        let ids = candidates
            .iter()
            .map(|id| Term::from_field_i64(self.schema.id, id.0));
        clauses.push((Occur::Must, Box::new(TermSetQuery::new(ids))));

        Ok(Some(Box::new(BooleanQuery::new(clauses))))
    }

    /// Match `token` in any text field; as a prefix too when `prefix` is set.
    fn token_query(&self, token: &str, prefix: bool) -> Result<Box<dyn Query>> {
        let mut field_queries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for (field, boost) in self.schema.full_text_fields() {
            let exact = TermQuery::new(
                Term::from_field_text(field, token),
                IndexRecordOption::WithFreqs,
            );
            field_queries.push((Occur::Should, Box::new(BoostQuery::new(Box::new(exact), boost))));

            if prefix {
                // Analyzer tokens are alphanumeric, so no regex escaping is needed.
                let pattern = format!("{token}.*");
                let regex = RegexQuery::from_pattern(&pattern, field).map_err(|e| {
                    Error::search_with_source(format!("invalid prefix pattern '{pattern}'"), e)
                })?;
                field_queries.push((Occur::Should, Box::new(BoostQuery::new(Box::new(regex), boost))));
            }
        }

        Ok(Box::new(BooleanQuery::new(field_queries)))
    }
}

// ============================================================================
// Tests
// ============================================================================
