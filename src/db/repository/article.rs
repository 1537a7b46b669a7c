use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::DatabaseError;
use crate::llm::Decision;

/// One title/abstract record to be screened.
///
/// Created with `needs_evaluation = true`; only the evaluator clears the
/// flag (together with setting decision/explanation). `user_decision` is
/// written by the reviewer UI, which is outside this service.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: String,
    pub file_id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub full_text: Option<String>,
    pub needs_evaluation: bool,
    pub ai_decision: Option<Decision>,
    pub ai_explanation: Option<String>,
    pub user_decision: Option<String>,
}

const ARTICLE_COLUMNS: &str = "id, file_id, title, abstract, full_text, needs_evaluation,
     ai_decision, ai_explanation, user_decision";

fn article_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArticleRow> {
    Ok(ArticleRow {
        id: row.get(0)?,
        file_id: row.get(1)?,
        title: row.get(2)?,
        abstract_text: row.get(3)?,
        full_text: row.get(4)?,
        needs_evaluation: row.get(5)?,
        ai_decision: row.get(6)?,
        ai_explanation: row.get(7)?,
        user_decision: row.get(8)?,
    })
}

struct ArticleRow {
    id: String,
    file_id: String,
    title: String,
    abstract_text: Option<String>,
    full_text: Option<String>,
    needs_evaluation: i64,
    ai_decision: Option<String>,
    ai_explanation: Option<String>,
    user_decision: Option<String>,
}

impl ArticleRow {
    fn into_article(self) -> Result<Article, DatabaseError> {
        let ai_decision = match self.ai_decision {
            None => None,
            Some(raw) => Some(Decision::parse(&raw).ok_or(DatabaseError::InvalidEnum {
                field: "articles.ai_decision".into(),
                value: raw,
            })?),
        };
        Ok(Article {
            id: self.id,
            file_id: self.file_id,
            title: self.title,
            abstract_text: self.abstract_text,
            full_text: self.full_text,
            needs_evaluation: self.needs_evaluation != 0,
            ai_decision,
            ai_explanation: self.ai_explanation,
            user_decision: self.user_decision,
        })
    }
}

pub fn insert_article(
    conn: &Connection,
    id: &str,
    file_id: &str,
    title: &str,
    abstract_text: Option<&str>,
    full_text: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO articles (id, file_id, title, abstract, full_text, needs_evaluation)
         VALUES (?1, ?2, ?3, ?4, ?5, 1)",
        params![id, file_id, title, abstract_text, full_text],
    )?;
    conn.execute(
        "UPDATE source_files SET article_count = article_count + 1 WHERE id = ?1",
        params![file_id],
    )?;
    Ok(())
}

pub fn get_article(conn: &Connection, id: &str) -> Result<Option<Article>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id], article_from_row);
    match result {
        Ok(row) => Ok(Some(row.into_article()?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Persist a successful evaluation: set decision + explanation, clear the
/// pending flag. The only write path that clears `needs_evaluation`.
pub fn record_evaluation(
    conn: &Connection,
    article_id: &str,
    decision: Decision,
    explanation: &str,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE articles
         SET ai_decision = ?2, ai_explanation = ?3, needs_evaluation = 0
         WHERE id = ?1",
        params![article_id, decision.as_str(), explanation],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Article".into(),
            id: article_id.into(),
        });
    }
    Ok(())
}

pub(crate) fn load_articles<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Article>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, article_from_row)?;

    let mut articles = Vec::new();
    for row in rows {
        articles.push(row?.into_article()?);
    }
    Ok(articles)
}
