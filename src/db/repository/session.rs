use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use crate::db::DatabaseError;

/// Lifecycle state of a review session.
///
/// A single enum replaces the awaiting/running/evaluated flag triple; the
/// derived accessors below preserve the flag semantics consumers read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, evaluation not yet requested.
    Idle,
    /// Queued for evaluation; selectable.
    Awaiting,
    /// Claimed by an invocation; invisible to the selector.
    Running,
    /// All articles evaluated.
    Completed,
    /// Last run hit a session-fatal error; still selectable (retryable).
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Awaiting => "awaiting",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Result<Self, DatabaseError> {
        match value {
            "idle" => Ok(SessionStatus::Idle),
            "awaiting" => Ok(SessionStatus::Awaiting),
            "running" => Ok(SessionStatus::Running),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(DatabaseError::InvalidEnum {
                field: "review_sessions.status".into(),
                value: other.into(),
            }),
        }
    }

    /// Flag semantics: a session waiting for (or in) evaluation. A UI
    /// "processing" indicator should track this, not `is_evaluation_running`,
    /// to avoid flicker between batches.
    pub fn is_awaiting_evaluation(&self) -> bool {
        matches!(
            self,
            SessionStatus::Awaiting | SessionStatus::Running | SessionStatus::Failed
        )
    }

    pub fn is_evaluation_running(&self) -> bool {
        matches!(self, SessionStatus::Running)
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewSession {
    pub id: String,
    pub title: String,
    pub status: SessionStatus,
    pub last_evaluated_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
}

/// One ordered inclusion criterion.
#[derive(Debug, Clone, Serialize)]
pub struct Criterion {
    pub id: String,
    pub session_id: String,
    pub position: i64,
    pub text: String,
}

pub fn insert_session(conn: &Connection, id: &str, title: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO review_sessions (id, title, status) VALUES (?1, ?2, 'idle')",
        params![id, title],
    )?;
    Ok(())
}

pub fn get_session(conn: &Connection, id: &str) -> Result<Option<ReviewSession>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, status, last_evaluated_at, last_error, created_at
         FROM review_sessions WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, String>(5)?,
        ))
    });

    match result {
        Ok((id, title, status, last_evaluated_at, last_error, created_at)) => {
            Ok(Some(ReviewSession {
                id,
                title,
                status: SessionStatus::from_str(&status)?,
                last_evaluated_at,
                last_error,
                created_at,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Append a criterion at the next free position.
pub fn add_criterion(
    conn: &Connection,
    session_id: &str,
    text: &str,
) -> Result<String, DatabaseError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO session_criteria (id, session_id, position, text)
         VALUES (?1, ?2,
                 (SELECT COALESCE(MAX(position), 0) + 1 FROM session_criteria WHERE session_id = ?2),
                 ?3)",
        params![id, session_id, text],
    )?;
    Ok(id)
}

pub fn list_criteria(conn: &Connection, session_id: &str) -> Result<Vec<Criterion>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, position, text
         FROM session_criteria WHERE session_id = ?1 ORDER BY position ASC",
    )?;

    let rows = stmt.query_map(params![session_id], |row| {
        Ok(Criterion {
            id: row.get(0)?,
            session_id: row.get(1)?,
            position: row.get(2)?,
            text: row.get(3)?,
        })
    })?;

    let mut criteria = Vec::new();
    for row in rows {
        criteria.push(row?);
    }
    Ok(criteria)
}

/// Render the session's criteria as the numbered list shown to the model.
pub fn criteria_text(conn: &Connection, session_id: &str) -> Result<String, DatabaseError> {
    let criteria = list_criteria(conn, session_id)?;
    let lines: Vec<String> = criteria
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.text.trim()))
        .collect();
    Ok(lines.join("\n"))
}
