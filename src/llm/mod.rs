//! Completion-service client, screening prompt, and strict response parsing.

pub mod client;
pub mod parser;
pub mod prompt;

pub use client::{CompletionClient, CompletionRequest, HttpCompletionClient, MockCompletionClient};
pub use parser::{parse_evaluation, Decision, Evaluation, ParseError};

use thiserror::Error;

use crate::db::repository::AiSettings;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Cannot reach completion service at {0}")]
    Connection(String),

    #[error("Completion request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Completion service returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Completion response contained no content")]
    EmptyResponse,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Screen one article: build the prompt, call the completion service, and
/// parse the response into a decision + explanation. Shared by the batch
/// evaluator and the ad-hoc endpoint.
pub fn evaluate(
    client: &dyn CompletionClient,
    title: &str,
    abstract_text: Option<&str>,
    criteria: &str,
    settings: &AiSettings,
) -> Result<Evaluation, LlmError> {
    let user_prompt = prompt::build_screening_prompt(criteria, title, abstract_text);
    let raw = client.complete(&CompletionRequest {
        model: &settings.model,
        system: &settings.instructions,
        user: &user_prompt,
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
        seed: settings.seed,
    })?;
    Ok(parse_evaluation(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn settings() -> AiSettings {
        let conn = open_memory_database().unwrap();
        crate::db::repository::insert_settings(&conn, "Screen abstracts.", "test-model", 0.0, 256, None, 10)
            .unwrap();
        crate::db::repository::latest_settings(&conn).unwrap().unwrap()
    }

    #[test]
    fn evaluate_happy_path() {
        let client = MockCompletionClient::new(
            "Decision: Include\nExplanation: Reports a randomized trial in adults.",
        );
        let settings = settings();

        let evaluation = evaluate(
            &client,
            "Metformin vs placebo",
            Some("A randomized controlled trial..."),
            "1. RCT design",
            &settings,
        )
        .unwrap();

        assert_eq!(evaluation.decision, Decision::Include);
        assert!(evaluation.explanation.contains("randomized"));
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn evaluate_propagates_parse_error() {
        let client = MockCompletionClient::new("I think this one looks relevant.");
        let settings = settings();

        let err = evaluate(&client, "T", None, "1. RCT", &settings).unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }
}
