//! Keyword full-text search for kbase.
//!
//! This crate provides the [`KeywordIndex`] abstraction and a Tantivy
//! backend (feature-gated).
//!
//! # Features
//!
//! - `fts-tantivy` (default): Enable [`TantivyKeywordIndex`]

#![doc = include_str!("../README.md")]

pub mod backend;

#[cfg(feature = "fts-tantivy")]
pub mod query;
#[cfg(feature = "fts-tantivy")]
pub mod schema;
#[cfg(feature = "fts-tantivy")]
pub mod tantivy_search;

pub use backend::{KeywordHit, KeywordIndex};

#[cfg(feature = "fts-tantivy")]
pub use query::QueryBuilder;
#[cfg(feature = "fts-tantivy")]
pub use schema::KeywordSchema;
#[cfg(feature = "fts-tantivy")]
pub use tantivy_search::TantivyKeywordIndex;
