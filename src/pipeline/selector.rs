//! Picks which session and which articles an invocation works on.
//!
//! Selection order is oldest-activity-first (`last_evaluated_at`, falling
//! back to `created_at` for never-touched sessions) so long-queued sessions
//! cannot be starved by a busy newcomer.

use rusqlite::{params, Connection};

use crate::db::repository::article::load_articles;
use crate::db::repository::Article;
use crate::db::DatabaseError;

/// Sessions eligible for claiming, oldest activity first. `failed` counts
/// as queued so transient failures retry without operator action.
pub fn list_awaiting_sessions(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM review_sessions
         WHERE status IN ('awaiting', 'failed')
         ORDER BY COALESCE(last_evaluated_at, created_at) ASC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// The next batch of pending articles for a session, capped at
/// `batch_size`. Articles belong to sessions through their source file.
pub fn next_batch(
    conn: &Connection,
    session_id: &str,
    batch_size: u32,
) -> Result<Vec<Article>, DatabaseError> {
    load_articles(
        conn,
        "SELECT a.id, a.file_id, a.title, a.abstract, a.full_text, a.needs_evaluation,
                a.ai_decision, a.ai_explanation, a.user_decision
         FROM articles a
         JOIN source_files f ON a.file_id = f.id
         WHERE f.session_id = ?1 AND a.needs_evaluation = 1
         ORDER BY a.id ASC
         LIMIT ?2",
        params![session_id, batch_size],
    )
}

/// Whether any article in the session still needs evaluation. Checked after
/// each batch to decide between `awaiting` and `completed`.
pub fn has_pending_articles(conn: &Connection, session_id: &str) -> Result<bool, DatabaseError> {
    let pending: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM articles a
            JOIN source_files f ON a.file_id = f.id
            WHERE f.session_id = ?1 AND a.needs_evaluation = 1
         )",
        params![session_id],
        |row| row.get(0),
    )?;
    Ok(pending)
}
