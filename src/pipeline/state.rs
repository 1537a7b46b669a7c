//! Session state machine.
//!
//! Every transition is a single conditional UPDATE, so two concurrent
//! invocations can never both own a session: the claim succeeds for
//! exactly one of them. Timestamps come from SQLite (`datetime('now')`,
//! UTC) so the reaper compares against the same clock.

use rusqlite::{params, Connection};

use crate::db::repository::{get_session, SessionStatus};
use crate::db::DatabaseError;

/// Result of attempting to claim a session for evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This invocation now owns the session.
    Claimed,
    /// Another invocation owns it (status was already `running`).
    AlreadyRunning,
    /// Nothing left to do; callers treat this as a successful no-op.
    AlreadyCompleted,
    /// The session exists but was never queued for evaluation.
    NotQueued(SessionStatus),
    NotFound,
}

/// Atomically claim a session: `awaiting`/`failed` → `running`, stamping
/// `last_evaluated_at`. A plain read-then-write would leave a window where
/// two invocations both observe an idle session; the conditional UPDATE
/// closes it.
pub fn claim_running(conn: &Connection, session_id: &str) -> Result<ClaimOutcome, DatabaseError> {
    let rows = conn.execute(
        "UPDATE review_sessions
         SET status = 'running', last_evaluated_at = datetime('now')
         WHERE id = ?1 AND status IN ('awaiting', 'failed')",
        params![session_id],
    )?;
    if rows > 0 {
        return Ok(ClaimOutcome::Claimed);
    }

    match get_session(conn, session_id)? {
        None => Ok(ClaimOutcome::NotFound),
        Some(session) => match session.status {
            SessionStatus::Running => Ok(ClaimOutcome::AlreadyRunning),
            SessionStatus::Completed => Ok(ClaimOutcome::AlreadyCompleted),
            status => Ok(ClaimOutcome::NotQueued(status)),
        },
    }
}

/// Queue a session for evaluation (the user-facing "start screening"
/// action, also used to seed tests).
pub fn mark_awaiting(conn: &Connection, session_id: &str) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE review_sessions SET status = 'awaiting' WHERE id = ?1",
        params![session_id],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ReviewSession".into(),
            id: session_id.into(),
        });
    }
    Ok(())
}

/// Terminal success: only called once the selector confirms the session
/// has zero pending articles. Clears any stale failure message.
pub fn mark_completed(conn: &Connection, session_id: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE review_sessions
         SET status = 'completed', last_error = NULL
         WHERE id = ?1",
        params![session_id],
    )?;
    Ok(())
}

/// A batch finished but articles remain: return to `awaiting` so a later
/// invocation resumes the session. Running never persists across
/// invocations — safer if this process dies before the next cycle.
pub fn mark_batch_incomplete(conn: &Connection, session_id: &str) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE review_sessions SET status = 'awaiting' WHERE id = ?1 AND status = 'running'",
        params![session_id],
    )?;
    if rows == 0 {
        tracing::warn!(session_id, "mark_batch_incomplete: session was not running");
    }
    Ok(())
}

/// Session-fatal error: record it and return the session to a retryable
/// state. Already-evaluated articles keep their decisions.
pub fn mark_failed(conn: &Connection, session_id: &str, error: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE review_sessions SET status = 'failed', last_error = ?2 WHERE id = ?1",
        params![session_id, error],
    )?;
    Ok(())
}
