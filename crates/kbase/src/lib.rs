//! kbase: article retrieval and ordering.
//!
//! This crate assembles the kbase components into one engine:
//!
//! - [`filter`]: candidate predicates (category slug, locale, author, status)
//! - [`planner`]: keyword search, vector search, and ordered browsing
//! - [`knowledge_base`]: the write path and the [`KnowledgeBase`] facade
//!
//! The component crates are re-exported for callers that need them
//! directly.

#![doc = include_str!("../README.md")]

pub mod filter;
pub mod knowledge_base;
pub mod planner;

pub use filter::{Filter, FilterChain};
pub use knowledge_base::{EmbeddingStatus, KnowledgeBase, WriteOutcome};
pub use planner::{DocumentOrder, QueryPlanner, SearchParams};

pub use kbase_fts as fts;
pub use kbase_llm as llm;
pub use kbase_ordering as ordering;
pub use kbase_vector as vector;

pub use kbase_core::{
    Category, CategoryId, Document, DocumentId, DocumentStatus, DocumentUpdate, Error, KbaseConfig,
    MemoryStore, Result,
};
