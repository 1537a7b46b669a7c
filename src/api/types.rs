//! Shared API context and wire types (camelCase over the wire).

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{CompletionClient, Decision};
use crate::pipeline::{ArticleOutcome, CycleConfig};

/// Everything a handler needs. Cheap to clone; each invocation opens its
/// own database connection inside `spawn_blocking`.
#[derive(Clone)]
pub struct ApiContext {
    pub db_path: Arc<PathBuf>,
    pub llm: Arc<dyn CompletionClient>,
    pub cycle: CycleConfig,
}

impl ApiContext {
    pub fn new(db_path: PathBuf, llm: Arc<dyn CompletionClient>, cycle: CycleConfig) -> Self {
        Self {
            db_path: Arc::new(db_path),
            llm,
            cycle,
        }
    }
}

/// Body of `POST /api/evaluate`. Empty (or absent) means "run one cycle";
/// a populated body means ad-hoc evaluation of one title/abstract.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluateRequest {
    pub article_id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub criteria: Option<String>,
}

impl EvaluateRequest {
    /// Any field present switches the endpoint into ad-hoc mode.
    pub fn is_ad_hoc(&self) -> bool {
        self.article_id.is_some()
            || self.title.is_some()
            || self.abstract_text.is_some()
            || self.criteria.is_some()
    }
}

/// Response for a cycle invocation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResponse {
    pub invocation_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub processed_count: usize,
    pub is_session_completed: bool,
    pub more_sessions_queued: bool,
    pub per_article_results: Vec<ArticleOutcome>,
}

/// Response for an ad-hoc evaluation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdHocResponse {
    pub decision: Decision,
    pub explanation: String,
}
