//! Domain types shared by every kbase crate.
//!
//! The document row itself is owned by an external storage collaborator;
//! these types are the shape that collaborator hands to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Identifier of a document (article).
    DocumentId
);
id_type!(
    /// Identifier of a category.
    CategoryId
);
id_type!(
    /// Identifier of an account.
    AccountId
);
id_type!(
    /// Identifier of a portal.
    PortalId
);
id_type!(
    /// Identifier of a document author.
    AuthorId
);
id_type!(
    /// Identifier of a stored embedding term.
    EmbeddingTermId
);

// ============================================================================
// Documents
// ============================================================================

/// Publication status of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Not yet visible.
    #[default]
    Draft,
    /// Visible to readers.
    Published,
    /// Retired but kept.
    Archived,
}

impl DocumentStatus {
    /// The lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(crate::Error::validation(format!(
                "unknown document status '{other}'"
            ))),
        }
    }
}

/// The (account, category) scope in which positions are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionScope {
    /// Owning account.
    pub account_id: AccountId,
    /// Category, or `None` for uncategorized documents.
    pub category_id: Option<CategoryId>,
}

impl fmt::Display for PositionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category_id {
            Some(category) => write!(f, "account {} / category {}", self.account_id, category),
            None => write!(f, "account {} / uncategorized", self.account_id),
        }
    }
}

/// An indexed, orderable article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier.
    pub id: DocumentId,

    /// Owning account (derived from the portal by the storage layer).
    pub account_id: AccountId,

    /// Portal the document is published under.
    pub portal_id: PortalId,

    /// Optional category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,

    /// Author of the document.
    pub author_id: AuthorId,

    /// Title.
    pub title: String,

    /// Short description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Body.
    pub content: String,

    /// Publication status.
    #[serde(default)]
    pub status: DocumentStatus,

    /// Manual ordering within the (account, category) scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,

    /// Canonical document of the duplicate group this document belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_document_id: Option<DocumentId>,

    /// View counter (maintained externally).
    #[serde(default)]
    pub views: u64,

    /// URL slug (unique, maintained externally).
    #[serde(default)]
    pub slug: String,

    /// Opaque metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a draft document with the required references.
    pub fn new(
        id: DocumentId,
        account_id: AccountId,
        portal_id: PortalId,
        author_id: AuthorId,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            account_id,
            portal_id,
            category_id: None,
            author_id,
            title: title.into(),
            description: None,
            content: String::new(),
            status: DocumentStatus::Draft,
            position: None,
            root_document_id: None,
            views: 0,
            slug: format!("{}-{}", now.timestamp(), id),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the body.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    /// Set an explicit position.
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    /// Set the slug.
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    /// Set the view counter.
    pub fn with_views(mut self, views: u64) -> Self {
        self.views = views;
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The scope this document's position lives in.
    pub fn position_scope(&self) -> PositionScope {
        PositionScope {
            account_id: self.account_id,
            category_id: self.category_id,
        }
    }

    /// Whether any of the embedded text fields differ from `other`.
    pub fn indexed_text_differs(&self, other: &Document) -> bool {
        self.title != other.title
            || self.description != other.description
            || self.content != other.content
    }
}

/// A partial change to a document. Unset fields are left alone.
///
/// Stores write only the columns an update sets, so concurrent writers of
/// `position`, `root_document_id`, or `views` are never overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    title: Option<String>,
    description: Option<Option<String>>,
    content: Option<String>,
    category_id: Option<Option<CategoryId>>,
    status: Option<DocumentStatus>,
    slug: Option<String>,
    position: Option<i64>,
}

impl DocumentUpdate {
    /// An update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set or clear the description.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Replace the body.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Move to a category, or to uncategorized with `None`.
    pub fn category(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Change the publication status.
    pub fn status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Replace the slug.
    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Pin an explicit position.
    pub fn position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write the set fields into `document`.
    pub fn apply(&self, document: &mut Document) {
        if let Some(title) = &self.title {
            document.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            document.description.clone_from(description);
        }
        if let Some(content) = &self.content {
            document.content.clone_from(content);
        }
        if let Some(category_id) = self.category_id {
            document.category_id = category_id;
        }
        if let Some(status) = self.status {
            document.status = status;
        }
        if let Some(slug) = &self.slug {
            document.slug.clone_from(slug);
        }
        if let Some(position) = self.position {
            document.position = Some(position);
        }
    }
}

/// A category documents can be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique category identifier.
    pub id: CategoryId,
    /// Portal the category belongs to.
    pub portal_id: PortalId,
    /// URL slug.
    pub slug: String,
    /// Locale code, e.g. `en` or `pt_BR`.
    pub locale: String,
    /// Display name.
    pub name: String,
}

impl Category {
    /// Create a new category.
    pub fn new(
        id: CategoryId,
        portal_id: PortalId,
        slug: impl Into<String>,
        locale: impl Into<String>,
    ) -> Self {
        let slug = slug.into();
        Self {
            id,
            portal_id,
            name: slug.clone(),
            slug,
            locale: locale.into(),
        }
    }
}

// ============================================================================
// Embedding terms
// ============================================================================

/// A short search term extracted from a document, with its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingTerm {
    /// Row identifier.
    pub id: EmbeddingTermId,
    /// Owning document.
    pub document_id: DocumentId,
    /// Human-readable term.
    pub term: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

/// A term and vector waiting to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmbeddingTerm {
    /// Human-readable term.
    pub term: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

impl NewEmbeddingTerm {
    /// Pair a term with its vector.
    pub fn new(term: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            term: term.into(),
            embedding,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new(
            DocumentId(1),
            AccountId(10),
            PortalId(100),
            AuthorId(7),
            "Reset your password",
        )
            .with_description("Steps to reset")
            .with_content("Open settings and click reset.")
    }

    #[test]
    fn test_document_new_defaults() {
        let doc = Document::new(DocumentId(1), AccountId(2), PortalId(3), AuthorId(4), "Title");
        assert_eq!(doc.id, DocumentId(1));
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert!(doc.position.is_none());
        assert!(doc.category_id.is_none());
        assert!(doc.root_document_id.is_none());
        assert!(!doc.slug.is_empty());
    }

    #[test]
    fn test_position_scope() {
        let doc = sample().with_category(CategoryId(5));
        let scope = doc.position_scope();
        assert_eq!(scope.account_id, AccountId(10));
        assert_eq!(scope.category_id, Some(CategoryId(5)));
        assert_eq!(scope.to_string(), "account 10 / category 5");
    }

    #[test]
    fn test_indexed_text_differs() {
        let doc = sample();
        let mut other = doc.clone();
        assert!(!doc.indexed_text_differs(&other));

        other.status = DocumentStatus::Published;
        other.position = Some(40);
        assert!(!doc.indexed_text_differs(&other));

        other.description = None;
        assert!(doc.indexed_text_differs(&other));
    }

    #[test]
    fn test_status_parse_and_display() {
        let status: DocumentStatus = "Published".parse().unwrap();
        assert_eq!(status, DocumentStatus::Published);
        assert_eq!(status.to_string(), "published");
        assert!("deleted".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_document_serialization_skips_empty() {
        let doc = Document::new(DocumentId(1), AccountId(2), PortalId(3), AuthorId(4), "Title");
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("category_id"));
        assert!(!json.contains("root_document_id"));
        assert!(!json.contains("metadata"));
        assert!(json.contains("\"status\":\"draft\""));
    }

    #[test]
    fn test_ids_are_transparent() {
        let json = serde_json::to_string(&DocumentId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_metadata_is_schemaless() {
        let doc = sample()
            .with_metadata("tags", serde_json::json!(["billing", "auth"]))
            .with_metadata("seo", serde_json::json!({"title": "Reset"}));
        assert_eq!(doc.metadata.len(), 2);
        assert_eq!(doc.metadata["seo"]["title"], "Reset");
    }

    #[test]
    fn test_update_applies_only_set_fields() {
        let mut doc = sample().with_status(DocumentStatus::Draft).with_position(40);
        DocumentUpdate::new()
            .content("Use the recovery link.")
            .description(None)
            .status(DocumentStatus::Published)
            .apply(&mut doc);

        assert_eq!(doc.title, "Reset your password");
        assert_eq!(doc.content, "Use the recovery link.");
        assert_eq!(doc.description, None);
        assert_eq!(doc.status, DocumentStatus::Published);
        assert_eq!(doc.position, Some(40));
    }

    #[test]
    fn test_update_category_and_position() {
        let mut doc = sample().with_category(CategoryId(3)).with_position(40);
        let update = DocumentUpdate::new().category(None).position(70);
        assert!(!update.is_empty());
        update.apply(&mut doc);
        assert_eq!(doc.category_id, None);
        assert_eq!(doc.position, Some(70));

        let noop = DocumentUpdate::new();
        assert!(noop.is_empty());
        noop.apply(&mut doc);
        assert_eq!(doc.position, Some(70));
    }
}
