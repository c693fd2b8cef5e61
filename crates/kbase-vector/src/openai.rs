//! OpenAI-compatible embedding provider.
//!
//! Sends batches to `POST {base_url}/embeddings` and returns the vectors in
//! input order. Any server speaking the same request/response shape works
//! through [`OpenAiEmbeddingProvider::with_base_url`].

use async_trait::async_trait;
use serde::Deserialize;

use crate::embedding::EmbeddingProvider;
use kbase_core::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Embedding provider for the OpenAI `/embeddings` endpoint.
pub struct OpenAiEmbeddingProvider {
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    /// Create a provider for `model` producing vectors of `dimension`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            dimension,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Points the provider at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, texts: &[&str]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "encoding_format": "float",
        });
        // Older models reject the `dimensions` parameter.
        if self.model.starts_with("text-embedding-3") {
            body["dimensions"] = serde_json::json!(self.dimension);
        }
        body
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Parse an `/embeddings` response, restoring input order by `index`.
pub(crate) fn parse_embeddings_response(
    body: &str,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut parsed: EmbeddingsResponse = serde_json::from_str(body)
        .map_err(|e| Error::generation_with_source("Failed to parse embeddings response", e))?;

    if parsed.data.len() != expected {
        return Err(Error::generation(format!(
            "Expected {expected} embeddings, got {}",
            parsed.data.len()
        )));
    }

    parsed.data.sort_by_key(|d| d.index);

    let mut vectors = Vec::with_capacity(expected);
    for (position, data) in parsed.data.into_iter().enumerate() {
        if data.index != position {
            return Err(Error::generation(format!(
                "Embedding index {} out of range",
                data.index
            )));
        }
        if data.embedding.len() != dimension {
            return Err(Error::generation(format!(
                "Embedding dimension {} does not match configured {dimension}",
                data.embedding.len()
            )));
        }
        vectors.push(data.embedding);
    }
    Ok(vectors)
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::generation("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(texts))
            .send()
            .await
            .map_err(|e| Error::generation_with_source("Failed to call embeddings API", e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::generation_with_source("Failed to read embeddings response", e))?;

        if !status.is_success() {
            return Err(Error::generation(format!(
                "Embeddings API error {status}: {text}"
            )));
        }

        log::debug!("embedded {} texts with {}", texts.len(), self.model);
        parse_embeddings_response(&text, texts.len(), self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingProvider")
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_dimensions_for_v3_models() {
        let provider = OpenAiEmbeddingProvider::new("k", "text-embedding-3-small", 256);
        let body = provider.request_body(&["a", "b"]);
        assert_eq!(body["input"], serde_json::json!(["a", "b"]));
        assert_eq!(body["dimensions"], 256);

        let legacy = OpenAiEmbeddingProvider::new("k", "text-embedding-ada-002", 1536);
        assert!(legacy.request_body(&["a"]).get("dimensions").is_none());
    }

    #[test]
    fn test_parse_restores_input_order() {
        let body = r#"{"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ]}"#;
        let vectors = parse_embeddings_response(body, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_count_mismatch() {
        let body = r#"{"data": [{"index": 0, "embedding": [1.0]}]}"#;
        let err = parse_embeddings_response(body, 2, 1).unwrap_err();
        assert!(err.is_generation());
    }

    #[test]
    fn test_parse_dimension_mismatch() {
        let body = r#"{"data": [{"index": 0, "embedding": [1.0, 2.0, 3.0]}]}"#;
        assert!(parse_embeddings_response(body, 1, 2).is_err());
    }

    #[test]
    fn test_parse_duplicate_index() {
        let body = r#"{"data": [
            {"index": 0, "embedding": [1.0]},
            {"index": 0, "embedding": [2.0]}
        ]}"#;
        assert!(parse_embeddings_response(body, 2, 1).is_err());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(
            parse_embeddings_response("{}", 1, 1)
                .unwrap_err()
                .is_generation()
        );
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let provider =
            OpenAiEmbeddingProvider::new("k", "m", 4).with_base_url("http://127.0.0.1:9");
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    }
}
