use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::DatabaseError;

/// An uploaded file owning a set of articles. Ingestion (parsing uploads
/// into rows) happens upstream; the pipeline only reads these.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    pub id: String,
    pub session_id: String,
    pub filename: String,
    pub article_count: i64,
}

pub fn insert_file(
    conn: &Connection,
    id: &str,
    session_id: &str,
    filename: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO source_files (id, session_id, filename) VALUES (?1, ?2, ?3)",
        params![id, session_id, filename],
    )?;
    Ok(())
}

pub fn list_files(conn: &Connection, session_id: &str) -> Result<Vec<SourceFile>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, filename, article_count
         FROM source_files WHERE session_id = ?1",
    )?;

    let rows = stmt.query_map(params![session_id], |row| {
        Ok(SourceFile {
            id: row.get(0)?,
            session_id: row.get(1)?,
            filename: row.get(2)?,
            article_count: row.get(3)?,
        })
    })?;

    let mut files = Vec::new();
    for row in rows {
        files.push(row?);
    }
    Ok(files)
}
