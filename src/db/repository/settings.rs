use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::DatabaseError;

/// Global evaluator settings. Read-only from the pipeline's perspective;
/// the most recently inserted row wins.
#[derive(Debug, Clone, Serialize)]
pub struct AiSettings {
    pub id: i64,
    pub instructions: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Best-effort reproducibility hint; providers may ignore it.
    pub seed: Option<i64>,
    pub batch_size: u32,
}

pub fn insert_settings(
    conn: &Connection,
    instructions: &str,
    model: &str,
    temperature: f64,
    max_tokens: u32,
    seed: Option<i64>,
    batch_size: u32,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO ai_settings (instructions, model, temperature, max_tokens, seed, batch_size)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![instructions, model, temperature, max_tokens, seed, batch_size],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Latest settings row, or `None` if nothing is configured yet.
pub fn latest_settings(conn: &Connection) -> Result<Option<AiSettings>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, instructions, model, temperature, max_tokens, seed, batch_size
         FROM ai_settings ORDER BY id DESC LIMIT 1",
    )?;

    let result = stmt.query_row([], |row| {
        Ok(AiSettings {
            id: row.get(0)?,
            instructions: row.get(1)?,
            model: row.get(2)?,
            temperature: row.get(3)?,
            max_tokens: row.get(4)?,
            seed: row.get(5)?,
            batch_size: row.get(6)?,
        })
    });

    match result {
        Ok(settings) => Ok(Some(settings)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
