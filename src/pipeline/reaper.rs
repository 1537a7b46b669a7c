//! Recovery for sessions stranded in `running`.
//!
//! An invocation that crashes mid-batch leaves its session claimed forever,
//! since nothing else will touch a `running` session. Every cycle starts by
//! resetting sessions whose last activity is older than the timeout.

use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Sessions running longer than this without progress are presumed dead.
pub const DEFAULT_STUCK_TIMEOUT_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    pub stuck_timeout_minutes: i64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            stuck_timeout_minutes: DEFAULT_STUCK_TIMEOUT_MINUTES,
        }
    }
}

/// Which sessions a reaper pass reset.
#[derive(Debug, Default)]
pub struct ReaperReport {
    pub reset: Vec<String>,
}

impl ReaperReport {
    pub fn is_empty(&self) -> bool {
        self.reset.is_empty()
    }
}

/// Reset stuck `running` sessions back to `awaiting` so the selector can
/// hand them out again. Each reset is a conditional UPDATE; if the owning
/// invocation turns out to be alive and finishes first, its terminal status
/// wins and the reset is skipped.
pub fn reap_stuck_sessions(
    conn: &Connection,
    config: &ReaperConfig,
) -> Result<ReaperReport, DatabaseError> {
    let cutoff = format!("-{} minutes", config.stuck_timeout_minutes);

    let mut stmt = conn.prepare(
        "SELECT id FROM review_sessions
         WHERE status = 'running'
           AND COALESCE(last_evaluated_at, created_at) < datetime('now', ?1)",
    )?;
    let rows = stmt.query_map(params![cutoff], |row| row.get::<_, String>(0))?;
    let mut candidates = Vec::new();
    for row in rows {
        candidates.push(row?);
    }

    let mut report = ReaperReport::default();
    for session_id in candidates {
        let changed = conn.execute(
            "UPDATE review_sessions
             SET status = 'awaiting',
                 last_error = 'evaluation timed out and was reset'
             WHERE id = ?1 AND status = 'running'",
            params![session_id],
        )?;
        if changed > 0 {
            tracing::info!(
                session_id = %session_id,
                timeout_minutes = config.stuck_timeout_minutes,
                "reset stuck session"
            );
            report.reset.push(session_id);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{get_session, insert_session, SessionStatus};
    use crate::db::sqlite::open_memory_database;
    use crate::pipeline::selector::list_awaiting_sessions;
    use crate::pipeline::state::{claim_running, mark_awaiting, ClaimOutcome};

    fn running_session(conn: &Connection, id: &str, age: &str) {
        insert_session(conn, id, "T").unwrap();
        mark_awaiting(conn, id).unwrap();
        claim_running(conn, id).unwrap();
        conn.execute(
            "UPDATE review_sessions SET last_evaluated_at = datetime('now', ?2) WHERE id = ?1",
            params![id, age],
        )
        .unwrap();
    }

    #[test]
    fn stale_running_session_is_reset_and_selectable() {
        let conn = open_memory_database().unwrap();
        running_session(&conn, "s", "-40 minutes");

        let report = reap_stuck_sessions(&conn, &ReaperConfig::default()).unwrap();
        assert_eq!(report.reset, vec!["s"]);

        let session = get_session(&conn, "s").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Awaiting);
        assert_eq!(
            session.last_error.as_deref(),
            Some("evaluation timed out and was reset")
        );

        assert_eq!(list_awaiting_sessions(&conn, 10).unwrap(), vec!["s"]);
        assert_eq!(claim_running(&conn, "s").unwrap(), ClaimOutcome::Claimed);
    }

    #[test]
    fn fresh_running_session_is_left_alone() {
        let conn = open_memory_database().unwrap();
        running_session(&conn, "s", "-5 minutes");

        let report = reap_stuck_sessions(&conn, &ReaperConfig::default()).unwrap();
        assert!(report.is_empty());
        assert_eq!(
            get_session(&conn, "s").unwrap().unwrap().status,
            SessionStatus::Running
        );
    }

    #[test]
    fn non_running_sessions_are_never_touched() {
        let conn = open_memory_database().unwrap();
        insert_session(&conn, "old-idle", "T").unwrap();
        conn.execute(
            "UPDATE review_sessions SET created_at = datetime('now', '-2 days') WHERE id = 'old-idle'",
            [],
        )
        .unwrap();

        let report = reap_stuck_sessions(&conn, &ReaperConfig::default()).unwrap();
        assert!(report.is_empty());
        assert_eq!(
            get_session(&conn, "old-idle").unwrap().unwrap().status,
            SessionStatus::Idle
        );
    }

    #[test]
    fn timeout_is_configurable() {
        let conn = open_memory_database().unwrap();
        running_session(&conn, "s", "-10 minutes");

        let config = ReaperConfig {
            stuck_timeout_minutes: 5,
        };
        let report = reap_stuck_sessions(&conn, &config).unwrap();
        assert_eq!(report.reset, vec!["s"]);
    }
}
