//! Candidate filters applied before any search.
//!
//! Each [`Filter`] is an independent predicate; a [`FilterChain`] applies
//! them in order. [`FilterChain::from_params`] fixes the order used by the
//! query planner: category slug, locale, author, status.

use std::collections::HashMap;

use kbase_core::{AuthorId, Category, CategoryId, Document, DocumentStatus};

use crate::planner::SearchParams;

/// A single predicate over documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Document's category has this slug.
    CategorySlug(String),
    /// Document's category has this locale.
    Locale(String),
    /// Document was written by this author.
    Author(AuthorId),
    /// Document has this status.
    Status(DocumentStatus),
}

impl Filter {
    /// Whether `document` passes. `categories` resolves category ids;
    /// uncategorized documents fail the category-based filters.
    pub fn matches(
        &self,
        document: &Document,
        categories: &HashMap<CategoryId, Category>,
    ) -> bool {
        let category = || document.category_id.and_then(|id| categories.get(&id));
        match self {
            Filter::CategorySlug(slug) => category().is_some_and(|c| &c.slug == slug),
            Filter::Locale(locale) => category().is_some_and(|c| &c.locale == locale),
            Filter::Author(author) => document.author_id == *author,
            Filter::Status(status) => document.status == *status,
        }
    }
}

/// An ordered list of filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    /// An empty chain that keeps everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain for `params`, skipping absent parameters.
    pub fn from_params(params: &SearchParams) -> Self {
        let mut chain = Self::new();
        if let Some(slug) = &params.category_slug {
            chain.push(Filter::CategorySlug(slug.clone()));
        }
        if let Some(locale) = &params.locale {
            chain.push(Filter::Locale(locale.clone()));
        }
        if let Some(author) = params.author_id {
            chain.push(Filter::Author(author));
        }
        if let Some(status) = params.status {
            chain.push(Filter::Status(status));
        }
        chain
    }

    /// Append a filter.
    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// The filters in application order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Whether the chain has no filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Keep the documents passing every filter, preserving input order.
    pub fn apply(&self, documents: Vec<Document>, categories: &[Category]) -> Vec<Document> {
        if self.filters.is_empty() {
            return documents;
        }
        let categories: HashMap<CategoryId, Category> =
            categories.iter().map(|c| (c.id, c.clone())).collect();

        let mut documents = documents;
        for filter in &self.filters {
            documents.retain(|doc| filter.matches(doc, &categories));
        }
        documents
    }
}
