//! Shared types, storage traits, errors, and configuration for kbase.
//!
//! This crate provides the foundational types used across all kbase crates.
//! It has no internal kbase dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`types`]: Documents, categories, embedding terms, and ids
//! - [`store`]: Storage collaborator traits
//! - [`memory`]: In-process store implementing those traits
//! - [`sync`]: Keyed locks and timeouts
//! - [`config`]: Configuration loading

#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod memory;
pub mod store;
pub mod sync;
pub mod types;

// Re-export key types at crate root for convenience
pub use config::{
    EmbeddingConfig, KbaseConfig, KeywordConfig, LlmConfig, PositionConfig, SearchConfig,
    Sequencing,
};
pub use error::{BulkEntryFailure, Error, Result};
pub use memory::MemoryStore;
pub use store::{DocumentStore, EmbeddingTermStore};
pub use sync::{KeyedLocks, with_timeout};
pub use types::{
    AccountId, AuthorId, Category, CategoryId, Document, DocumentId, DocumentStatus,
    DocumentUpdate, EmbeddingTerm, EmbeddingTermId, NewEmbeddingTerm, PortalId, PositionScope,
};
