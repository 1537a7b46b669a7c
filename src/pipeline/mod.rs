//! The batch-evaluation pipeline: session state machine, stuck-session
//! reaper, batch selector, and the per-invocation processor.
//!
//! Invocations are stateless; the database is the only coordination
//! mechanism. Everything here takes a plain `&Connection` so the whole
//! pipeline runs against an in-memory database in tests.

pub mod processor;
pub mod reaper;
pub mod selector;
pub mod state;

pub use processor::{
    evaluate_single, process_session, run_cycle, ArticleOutcome, ArticleOutcomeStatus,
    CycleConfig, CycleOutcome, SessionRunSummary,
};
pub use reaper::{reap_stuck_sessions, ReaperConfig, ReaperReport};

use thiserror::Error;

use crate::db::DatabaseError;
use crate::llm::LlmError;

/// Session-level failures. Per-article failures never surface here — they
/// are collected into the per-article results instead.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("session `{0}` not found")]
    SessionNotFound(String),

    #[error("session `{0}` is already claimed by another invocation")]
    SessionClaimed(String),

    #[error("session `{id}` is not queued for evaluation (status: {status})")]
    SessionNotQueued { id: String, status: &'static str },

    #[error("no AI settings configured")]
    MissingSettings,

    #[error("session `{0}` has no inclusion criteria")]
    MissingCriteria(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}
