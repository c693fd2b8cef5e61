//! Error types for kbase operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all kbase crates. Uses `thiserror` for derive macros.
//!
//! # Taxonomy
//!
//! - `Validation`: a document or request is missing required data
//! - `Generation`: term extraction or embedding failed (bad response shape,
//!   transport failure, timeout)
//! - `Search`: the keyword or vector path failed
//! - `NotFound`: a referenced record does not exist
//! - `BulkPartialFailure`: some entries of a bulk update failed; the applied
//!   entries are listed and stay applied

use std::fmt;

use thiserror::Error;

use crate::types::DocumentId;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in kbase operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage collaborator failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Search-term extraction or embedding failed.
    #[error("Generation failed: {message}")]
    Generation {
        /// What went wrong.
        message: String,
        /// Underlying transport or parse error, if any.
        #[source]
        source: Option<BoxedSource>,
    },

    /// Keyword or vector search failed.
    #[error("Search failed: {message}")]
    Search {
        /// What went wrong.
        message: String,
        /// Underlying engine error, if any.
        #[source]
        source: Option<BoxedSource>,
    },

    /// A bulk operation failed for one or more entries.
    #[error("Bulk operation partially failed: {} applied, {} failed", .applied.len(), .failed.len())]
    BulkPartialFailure {
        /// Entries that were applied and remain applied.
        applied: Vec<DocumentId>,
        /// Entries that failed.
        failed: Vec<BulkEntryFailure>,
    },
}

/// A single failed entry of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkEntryFailure {
    /// The document the entry targeted.
    pub id: DocumentId,
    /// Why the entry failed.
    pub reason: String,
}

impl fmt::Display for BulkEntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.reason)
    }
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a generation error without an underlying cause.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a generation error wrapping an underlying cause.
    pub fn generation_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Generation {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search error without an underlying cause.
    pub fn search(msg: impl Into<String>) -> Self {
        Self::Search {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a search error wrapping an underlying cause.
    pub fn search_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Search {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this is a generation failure.
    pub fn is_generation(&self) -> bool {
        matches!(self, Self::Generation { .. })
    }

    /// Whether this is a search failure.
    pub fn is_search(&self) -> bool {
        matches!(self, Self::Search { .. })
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using kbase's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_display() {
        let err = Error::generation("missing search_terms");
        assert_eq!(err.to_string(), "Generation failed: missing search_terms");
        assert!(err.is_generation());
        assert!(!err.is_search());
    }

    #[test]
    fn test_generation_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket");
        let err = Error::generation_with_source("transport", io);
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("socket"));
    }

    #[test]
    fn test_bulk_failure_display() {
        let err = Error::BulkPartialFailure {
            applied: vec![DocumentId(1)],
            failed: vec![BulkEntryFailure {
                id: DocumentId(2),
                reason: "not found".to_string(),
            }],
        };
        assert_eq!(
            err.to_string(),
            "Bulk operation partially failed: 1 applied, 1 failed"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_not_found_inspector() {
        assert!(Error::not_found("document 9").is_not_found());
        assert!(!Error::validation("title").is_not_found());
    }
}
