//! Anthropic Messages API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, StopReason, TokenUsage,
};
use kbase_core::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Calls `POST {base_url}/v1/messages`.
///
/// `Debug` never prints the key.
pub struct ClaudeProvider {
    key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl ClaudeProvider {
    /// A client for `model` authenticated with `key`.
    pub fn new(key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Send requests to `base_url` instead of the public endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: request.system_prompt.as_deref(),
            temperature: request.temperature,
            messages: &request.messages,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<Block>,
    usage: Usage,
    stop_reason: StopReason,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Decode a Messages API body, joining its text blocks.
pub(crate) fn parse_messages_response(body: &str) -> Result<CompletionResponse> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| Error::generation_with_source("unreadable messages response", e))?;

    let content: String = parsed
        .content
        .into_iter()
        .filter_map(|block| match block {
            Block::Text { text } => Some(text),
            Block::Other => None,
        })
        .collect();
    if content.is_empty() {
        return Err(Error::generation("messages response carried no text"));
    }

    Ok(CompletionResponse {
        content,
        tokens_used: TokenUsage {
            input: parsed.usage.input_tokens,
            output: parsed.usage.output_tokens,
        },
        stop_reason: parsed.stop_reason,
    })
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let reply = self
            .http
            .post(&url)
            .header("x-api-key", &self.key)
            .header("anthropic-version", API_VERSION)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| Error::generation_with_source(format!("POST {url} failed"), e))?;

        let status = reply.status();
        let raw = reply
            .text()
            .await
            .map_err(|e| Error::generation_with_source("messages response body lost", e))?;
        if !status.is_success() {
            return Err(Error::generation(format!("messages API returned {status}: {raw}")));
        }

        let completion = parse_messages_response(&raw)?;
        log::debug!(
            "{} answered with {} tokens ({:?})",
            self.model,
            completion.tokens_used.total(),
            completion.stop_reason
        );
        Ok(completion)
    }

    fn name(&self) -> &str {
        "claude"
    }
}

impl std::fmt::Debug for ClaudeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn reply(blocks: &str, stop: &str) -> String {
        format!(
            r#"{{"content": {blocks}, "usage": {{"input_tokens": 12, "output_tokens": 8}}, "stop_reason": "{stop}"}}"#
        )
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = ClaudeProvider::new("sk-secret", "claude-test");
        let shown = format!("{provider:?}");
        assert!(shown.contains("claude-test"));
        assert!(!shown.contains("sk-secret"));
    }

    #[test]
    fn test_base_url_override() {
        let provider = ClaudeProvider::new("k", "m").with_base_url("http://127.0.0.1:9000/");
        assert_eq!(provider.base_url, "http://127.0.0.1:9000");
        assert_eq!(ClaudeProvider::new("k", "m").base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_body_shape() {
        let provider = ClaudeProvider::new("k", "claude-test");
        let full = CompletionRequest::prompt("Title: Refunds")
            .with_system_prompt("json only")
            .with_temperature(0.0)
            .with_max_tokens(64);
        let json = serde_json::to_value(provider.body(&full)).unwrap();
        assert_eq!(json["model"], "claude-test");
        assert_eq!(json["system"], "json only");
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["messages"][0]["role"], "user");

        let bare = CompletionRequest::prompt("x");
        let json = serde_json::to_value(provider.body(&bare)).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_parse_joins_text_and_skips_other_blocks() {
        let body = reply(
            r#"[{"type": "text", "text": "{\"search_"}, {"type": "thinking"}, {"type": "text", "text": "terms\": []}"}]"#,
            "end_turn",
        );
        let response = parse_messages_response(&body).unwrap();
        assert_eq!(response.content, r#"{"search_terms": []}"#);
        assert_eq!(response.tokens_used.total(), 20);
        assert!(!response.is_truncated());
    }

    #[test]
    fn test_parse_reports_truncation() {
        let body = reply(r#"[{"type": "text", "text": "{\"sea"}]"#, "max_tokens");
        assert!(parse_messages_response(&body).unwrap().is_truncated());
    }

    #[test]
    fn test_parse_rejects_bad_bodies() {
        let no_text = reply(r#"[{"type": "tool_use"}]"#, "end_turn");
        assert!(parse_messages_response(&no_text).unwrap_err().is_generation());
        assert!(parse_messages_response("<html>").unwrap_err().is_generation());
        let odd_stop = reply(r#"[{"type": "text", "text": "x"}]"#, "refusal");
        assert!(parse_messages_response(&odd_stop).is_err());
    }

    #[tokio::test]
    #[ignore = "calls the live API; needs ANTHROPIC_API_KEY"]
    async fn test_live_completion() {
        let key = std::env::var("ANTHROPIC_API_KEY").unwrap();
        let provider = ClaudeProvider::new(key, "claude-sonnet-4-20250514");
        let response = provider
            .complete(CompletionRequest::prompt("Reply with one word.").with_max_tokens(16))
            .await
            .unwrap();
        assert!(!response.content.is_empty());
    }
}
