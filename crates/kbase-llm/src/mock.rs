//! Scripted provider for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::provider::{CompletionRequest, CompletionResponse, LlmProvider, StopReason, TokenUsage};
use kbase_core::{Error, Result};

enum Script {
    /// Answers in order, wrapping around.
    Cycle(Vec<String>),
    /// Every call fails with this message.
    Fail(String),
}

#[derive(Default)]
struct Journal {
    requests: Vec<CompletionRequest>,
    served: usize,
}

/// Replays scripted answers and journals every request it receives.
///
/// ```
/// use kbase_llm::MockLlmProvider;
///
/// let llm = MockLlmProvider::with_terms(["reset password", "forgot login"]);
/// ```
#[derive(Clone)]
pub struct MockLlmProvider {
    script: Arc<Script>,
    journal: Arc<Mutex<Journal>>,
    delay: Option<Duration>,
}

impl MockLlmProvider {
    /// Answer with `answers` in order, starting over after the last one.
    /// An empty list makes every call fail.
    pub fn new(answers: Vec<String>) -> Self {
        Self::scripted(Script::Cycle(answers))
    }

    /// Always answer with `answer`.
    pub fn with_response(answer: impl Into<String>) -> Self {
        Self::new(vec![answer.into()])
    }

    /// Always answer with `{"search_terms": [...]}` built from `terms`.
    pub fn with_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms: Vec<String> = terms.into_iter().map(Into::into).collect();
        Self::with_response(serde_json::json!({ "search_terms": terms }).to_string())
    }

    /// Fail every call with a generation error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::scripted(Script::Fail(message.into()))
    }

    /// Wait `delay` before each answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request seen, oldest first.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.journal.lock().await.requests.clone()
    }

    /// Calls made, failed ones included.
    pub async fn call_count(&self) -> usize {
        self.journal.lock().await.requests.len()
    }

    fn scripted(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            journal: Arc::new(Mutex::new(Journal::default())),
            delay: None,
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut journal = self.journal.lock().await;
        journal.requests.push(request);

        let answers = match self.script.as_ref() {
            Script::Fail(message) => return Err(Error::generation(message.clone())),
            Script::Cycle(answers) if answers.is_empty() => {
                return Err(Error::generation("mock llm has nothing scripted"));
            }
            Script::Cycle(answers) => answers,
        };
        let content = answers[journal.served % answers.len()].clone();
        journal.served += 1;

        let output = content.split_whitespace().count() as u64;
        Ok(CompletionResponse {
            content,
            tokens_used: TokenUsage { input: 0, output },
            stop_reason: StopReason::EndTurn,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ask(text: &str) -> CompletionRequest {
        CompletionRequest::prompt(text)
    }

    #[tokio::test]
    async fn test_answers_wrap_around() {
        let llm = MockLlmProvider::new(vec!["one".into(), "two".into()]);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(llm.complete(ask("q")).await.unwrap().content);
        }
        assert_eq!(seen, ["one", "two", "one"]);
    }

    #[tokio::test]
    async fn test_with_terms_is_valid_json() {
        let llm = MockLlmProvider::with_terms(["refund", "chargeback"]);
        let content = llm.complete(ask("q")).await.unwrap().content;
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["search_terms"][1], "chargeback");
    }

    #[tokio::test]
    async fn test_failures_are_journaled() {
        let llm = MockLlmProvider::failing("rate limited");
        let err = llm.complete(ask("q")).await.unwrap_err();
        assert!(err.is_generation());
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(llm.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_nothing_scripted_fails() {
        let llm = MockLlmProvider::new(Vec::new());
        assert!(llm.complete(ask("q")).await.unwrap_err().is_generation());
    }

    #[tokio::test]
    async fn test_clones_share_journal() {
        let llm = MockLlmProvider::with_response("ok");
        let clone = llm.clone();
        clone
            .complete(ask("Title: Billing").with_system_prompt("json only"))
            .await
            .unwrap();

        let requests = llm.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system_prompt.as_deref(), Some("json only"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_holds_the_answer() {
        let llm = MockLlmProvider::with_response("late").with_delay(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        llm.complete(ask("q")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
