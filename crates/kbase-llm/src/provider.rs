//! The generative-model seam.
//!
//! Search-term extraction makes exactly one call per document: a system
//! prompt carrying the output schema, one user turn with the article, and a
//! single text answer back. [`LlmProvider`] is sized to that call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kbase_core::Result;

/// Default output cap for a completion.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// A backend that answers one prompt with one text response.
///
/// Transport and response-shape failures are reported as
/// `Error::Generation`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run `request` to completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Backend name, for logs.
    fn name(&self) -> &str;
}

/// Speaker of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller.
    User,
    /// The model.
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who is speaking.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

impl Message {
    /// A turn spoken by the caller.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A turn attributed to the model, e.g. to prefill its answer.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a provider needs for one completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Instructions placed ahead of the conversation.
    pub system_prompt: Option<String>,
    /// Turns, oldest first.
    pub messages: Vec<Message>,
    /// Output cap.
    pub max_tokens: u32,
    /// Sampling temperature; the provider default when unset.
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// A request over `messages` with [`DEFAULT_MAX_TOKENS`].
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            system_prompt: None,
            messages,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// A request with a single user turn.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![Message::user(text)])
    }

    /// Set the instructions.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the output cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input: u64,
    /// Generated tokens.
    pub output: u64,
}

impl TokenUsage {
    /// Input plus output.
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

/// Why generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum StopReason {
    /// The model finished its answer.
    EndTurn,
    /// The output cap cut the answer short.
    MaxTokens,
    /// A configured stop sequence was produced.
    StopSequence,
}

/// The model's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Concatenated text output.
    pub content: String,
    /// Token accounting.
    pub tokens_used: TokenUsage,
    /// Why generation ended.
    pub stop_reason: StopReason,
}

impl CompletionResponse {
    /// Whether the output cap truncated the answer, which usually leaves
    /// structured output unparseable.
    pub fn is_truncated(&self) -> bool {
        self.stop_reason == StopReason::MaxTokens
    }
}
