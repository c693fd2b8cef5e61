//! Index schema.

use tantivy::schema::{Field, INDEXED, STORED, Schema, TEXT};

/// Fields of the keyword index.
#[derive(Debug, Clone)]
pub struct KeywordSchema {
    /// The Tantivy schema.
    pub schema: Schema,
    /// Document id (indexed for deletes and candidate filters, stored for hits).
    pub id: Field,
    /// Title text.
    pub title: Field,
    /// Description text.
    pub description: Field,
    /// Body text.
    pub content: Field,
}

impl KeywordSchema {
    /// Build the schema.
    pub fn build() -> Self {
        let mut builder = Schema::builder();
        let id = builder.add_i64_field("id", INDEXED | STORED);
        let title = builder.add_text_field("title", TEXT);
        let description = builder.add_text_field("description", TEXT);
        let content = builder.add_text_field("content", TEXT);

        Self {
            schema: builder.build(),
            id,
            title,
            description,
            content,
        }
    }

    /// Searchable text fields with their boost weights.
    pub fn full_text_fields(&self) -> [(Field, f32); 3] {
        [
            (self.title, 2.0),
            (self.description, 1.5),
            (self.content, 1.0),
        ]
    }
}
