use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::LlmError;

/// One chat-style completion request: system + user message plus the
/// sampling knobs taken from `AiSettings`.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Best-effort reproducibility hint; not all providers honor it.
    pub seed: Option<i64>,
}

/// Abstraction over the external completion service, so the pipeline is
/// testable with a mock.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError>;
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
pub struct HttpCompletionClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpCompletionClient {
    /// `base_url` includes the version prefix, e.g. `https://api.openai.com/v1`.
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            seed: request.seed,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| LlmError::HttpClient(format!("malformed completion response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Mock completion client for tests — replays a fixed response or a
/// scripted sequence (each entry a response or an error message).
pub struct MockCompletionClient {
    queue: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
}

impl MockCompletionClient {
    /// Always return the same response.
    pub fn new(response: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Some(response.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replay responses in order; `Err` entries become transport errors.
    pub fn with_sequence(responses: Vec<Result<String, String>>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl CompletionClient for MockCompletionClient {
    fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let next = self
            .queue
            .lock()
            .expect("mock queue lock")
            .pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(LlmError::HttpClient(message)),
            None => match &self.fallback {
                Some(response) => Ok(response.clone()),
                None => Err(LlmError::HttpClient("mock sequence exhausted".into())),
            },
        }
    }
}
