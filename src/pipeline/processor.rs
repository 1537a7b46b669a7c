//! One invocation's worth of work: claim a session, evaluate a batch,
//! persist per-article results, and leave the session in a state the next
//! invocation can pick up.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::repository::{
    criteria_text, latest_settings, record_evaluation, Article,
};
use crate::llm::{self, CompletionClient, Evaluation};
use crate::pipeline::reaper::{reap_stuck_sessions, ReaperConfig};
use crate::pipeline::selector::{has_pending_articles, list_awaiting_sessions, next_batch};
use crate::pipeline::state::{
    claim_running, mark_batch_incomplete, mark_completed, mark_failed, ClaimOutcome,
};
use crate::pipeline::EvaluationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleOutcomeStatus {
    Evaluated,
    Error,
}

/// What happened to one article in a batch. Errors stay per-article; the
/// article keeps its pending flag and is retried in a later batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleOutcome {
    pub article_id: String,
    pub file_id: String,
    pub status: ArticleOutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one `process_session` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRunSummary {
    pub session_id: String,
    pub processed_count: usize,
    pub is_completed: bool,
    pub results: Vec<ArticleOutcome>,
}

impl SessionRunSummary {
    fn empty(session_id: &str, is_completed: bool) -> Self {
        Self {
            session_id: session_id.to_string(),
            processed_count: 0,
            is_completed,
            results: Vec::new(),
        }
    }
}

/// Claim the session and run one batch against it.
///
/// Safe to call repeatedly: a completed session is a no-op, a session held
/// by another invocation is a typed error, and a session-fatal failure is
/// recorded before the error propagates.
pub fn process_session(
    conn: &Connection,
    client: &dyn CompletionClient,
    session_id: &str,
) -> Result<SessionRunSummary, EvaluationError> {
    match claim_running(conn, session_id)? {
        ClaimOutcome::Claimed => {}
        ClaimOutcome::AlreadyCompleted => {
            return Ok(SessionRunSummary::empty(session_id, true));
        }
        ClaimOutcome::AlreadyRunning => {
            return Err(EvaluationError::SessionClaimed(session_id.to_string()));
        }
        ClaimOutcome::NotQueued(status) => {
            return Err(EvaluationError::SessionNotQueued {
                id: session_id.to_string(),
                status: status.as_str(),
            });
        }
        ClaimOutcome::NotFound => {
            return Err(EvaluationError::SessionNotFound(session_id.to_string()));
        }
    }

    match run_claimed_session(conn, client, session_id) {
        Ok(summary) => Ok(summary),
        Err(err) => {
            tracing::error!(session_id, error = %err, "session evaluation failed");
            mark_failed(conn, session_id, &err.to_string())?;
            Err(err)
        }
    }
}

fn run_claimed_session(
    conn: &Connection,
    client: &dyn CompletionClient,
    session_id: &str,
) -> Result<SessionRunSummary, EvaluationError> {
    let settings = latest_settings(conn)?.ok_or(EvaluationError::MissingSettings)?;

    let criteria = criteria_text(conn, session_id)?;
    if criteria.is_empty() {
        return Err(EvaluationError::MissingCriteria(session_id.to_string()));
    }

    let batch = next_batch(conn, session_id, settings.batch_size)?;
    if batch.is_empty() {
        mark_completed(conn, session_id)?;
        return Ok(SessionRunSummary::empty(session_id, true));
    }

    tracing::info!(
        session_id,
        batch_len = batch.len(),
        model = %settings.model,
        "evaluating batch"
    );

    let mut results = Vec::with_capacity(batch.len());
    for article in &batch {
        results.push(process_article(conn, client, &criteria, &settings, article));
    }

    let is_completed = if has_pending_articles(conn, session_id)? {
        mark_batch_incomplete(conn, session_id)?;
        false
    } else {
        mark_completed(conn, session_id)?;
        true
    };

    Ok(SessionRunSummary {
        session_id: session_id.to_string(),
        processed_count: results.len(),
        is_completed,
        results,
    })
}

/// Evaluate one article and persist the result. Any failure (transport,
/// parse, write) becomes an error outcome; the article stays pending.
fn process_article(
    conn: &Connection,
    client: &dyn CompletionClient,
    criteria: &str,
    settings: &crate::db::repository::AiSettings,
    article: &Article,
) -> ArticleOutcome {
    let evaluation = match llm::evaluate(
        client,
        &article.title,
        article.abstract_text.as_deref(),
        criteria,
        settings,
    ) {
        Ok(evaluation) => evaluation,
        Err(err) => {
            tracing::warn!(article_id = %article.id, error = %err, "article evaluation failed");
            return error_outcome(article, err.to_string());
        }
    };

    if let Err(err) = record_evaluation(conn, &article.id, evaluation.decision, &evaluation.explanation)
    {
        tracing::warn!(article_id = %article.id, error = %err, "failed to persist evaluation");
        return error_outcome(article, err.to_string());
    }

    ArticleOutcome {
        article_id: article.id.clone(),
        file_id: article.file_id.clone(),
        status: ArticleOutcomeStatus::Evaluated,
        error: None,
    }
}

fn error_outcome(article: &Article, error: String) -> ArticleOutcome {
    ArticleOutcome {
        article_id: article.id.clone(),
        file_id: article.file_id.clone(),
        status: ArticleOutcomeStatus::Error,
        error: Some(error),
    }
}

/// Ad-hoc evaluation of a single title/abstract, outside any session.
/// Touches no article rows and no session state.
pub fn evaluate_single(
    conn: &Connection,
    client: &dyn CompletionClient,
    title: &str,
    abstract_text: Option<&str>,
    criteria: &str,
) -> Result<Evaluation, EvaluationError> {
    let settings = latest_settings(conn)?.ok_or(EvaluationError::MissingSettings)?;
    Ok(llm::evaluate(client, title, abstract_text, criteria, &settings)?)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleConfig {
    pub reaper: ReaperConfig,
}

/// What one full cycle did, reported back to the caller.
#[derive(Debug)]
pub struct CycleOutcome {
    pub reaped: Vec<String>,
    pub session_id: Option<String>,
    pub summary: Option<SessionRunSummary>,
    /// Session-fatal error text, already recorded on the session row.
    pub session_error: Option<String>,
    pub more_sessions_queued: bool,
}

/// One invocation cycle: reap stuck sessions, pick the oldest queued
/// session, run one batch. Session-fatal errors are absorbed here (they
/// are already persisted on the session) so the caller always gets a
/// well-formed outcome.
pub fn run_cycle(
    conn: &Connection,
    client: &dyn CompletionClient,
    config: &CycleConfig,
) -> Result<CycleOutcome, EvaluationError> {
    let reaped = reap_stuck_sessions(conn, &config.reaper)?.reset;

    let Some(session_id) = list_awaiting_sessions(conn, 1)?.into_iter().next() else {
        return Ok(CycleOutcome {
            reaped,
            session_id: None,
            summary: None,
            session_error: None,
            more_sessions_queued: false,
        });
    };

    let (summary, session_error) = match process_session(conn, client, &session_id) {
        Ok(summary) => (Some(summary), None),
        // Lost the claim race or the session failed mid-run; both leave
        // the database consistent, so the cycle itself still succeeds.
        Err(err) => (None, Some(err.to_string())),
    };

    let more_sessions_queued = !list_awaiting_sessions(conn, 1)?.is_empty();

    Ok(CycleOutcome {
        reaped,
        session_id: Some(session_id),
        summary,
        session_error,
        more_sessions_queued,
    })
}
