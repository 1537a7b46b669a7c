//! Invocation router.
//!
//! `POST /api/evaluate` is the single entry point: an empty body runs one
//! housekeeping + selection + batch cycle, a populated body evaluates one
//! title/abstract ad hoc. The pipeline is blocking (rusqlite + blocking
//! HTTP), so each invocation runs under `spawn_blocking` with its own
//! database connection.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{AdHocResponse, ApiContext, CycleResponse, EvaluateRequest};
use crate::db::sqlite::open_database;
use crate::llm::Evaluation;
use crate::pipeline::{evaluate_single, run_cycle, CycleOutcome, EvaluationError};

pub fn api_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/api/evaluate", post(evaluate))
        .route("/api/health", get(health))
        .with_state(ctx)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn evaluate(
    State(ctx): State<ApiContext>,
    body: Option<Json<EvaluateRequest>>,
) -> Result<Response, ApiError> {
    let invocation_id = Uuid::new_v4().to_string();
    let request = body.map(|Json(r)| r).unwrap_or_default();

    if request.is_ad_hoc() {
        let response = ad_hoc_evaluation(&ctx, &invocation_id, request).await?;
        Ok(Json(response).into_response())
    } else {
        let response = cycle_invocation(&ctx, &invocation_id).await?;
        Ok(Json(response).into_response())
    }
}

async fn cycle_invocation(
    ctx: &ApiContext,
    invocation_id: &str,
) -> Result<CycleResponse, ApiError> {
    tracing::info!(invocation_id, "starting evaluation cycle");

    let db_path = ctx.db_path.clone();
    let client = ctx.llm.clone();
    let config = ctx.cycle;

    let outcome = tokio::task::spawn_blocking(move || -> Result<CycleOutcome, EvaluationError> {
        let conn = open_database(&db_path)?;
        run_cycle(&conn, client.as_ref(), &config)
    })
    .await
    .map_err(|e| ApiError::internal(invocation_id, e.to_string()))?
    .map_err(|e| ApiError::internal(invocation_id, e.to_string()))?;

    let message = cycle_message(&outcome);
    tracing::info!(invocation_id, %message, "cycle finished");

    let (processed_count, is_session_completed, per_article_results) = match outcome.summary {
        Some(summary) => (summary.processed_count, summary.is_completed, summary.results),
        None => (0, false, Vec::new()),
    };

    Ok(CycleResponse {
        invocation_id: invocation_id.to_string(),
        message,
        session_id: outcome.session_id,
        processed_count,
        is_session_completed,
        more_sessions_queued: outcome.more_sessions_queued,
        per_article_results,
    })
}

fn cycle_message(outcome: &CycleOutcome) -> String {
    let mut message = match (&outcome.session_id, &outcome.summary, &outcome.session_error) {
        (None, _, _) => "no sessions awaiting evaluation".to_string(),
        (Some(id), _, Some(error)) => format!("session {id} failed: {error}"),
        (Some(id), Some(summary), None) if summary.is_completed => format!(
            "session {id} completed; {} article(s) evaluated this cycle",
            summary.processed_count
        ),
        (Some(id), Some(summary), None) => format!(
            "evaluated {} article(s) in session {id}; articles remain pending",
            summary.processed_count
        ),
        (Some(id), None, None) => format!("session {id} produced no work"),
    };
    if !outcome.reaped.is_empty() {
        message.push_str(&format!("; reset {} stuck session(s)", outcome.reaped.len()));
    }
    message
}

async fn ad_hoc_evaluation(
    ctx: &ApiContext,
    invocation_id: &str,
    request: EvaluateRequest,
) -> Result<AdHocResponse, ApiError> {
    let title = request
        .title
        .ok_or_else(|| ApiError::bad_request(invocation_id, "ad-hoc evaluation requires `title`"))?;
    let criteria = request.criteria.ok_or_else(|| {
        ApiError::bad_request(invocation_id, "ad-hoc evaluation requires `criteria`")
    })?;
    let abstract_text = request.abstract_text;

    tracing::info!(invocation_id, article_id = ?request.article_id, "ad-hoc evaluation");

    let db_path = ctx.db_path.clone();
    let client = ctx.llm.clone();

    let evaluation = tokio::task::spawn_blocking(move || -> Result<Evaluation, EvaluationError> {
        let conn = open_database(&db_path)?;
        evaluate_single(
            &conn,
            client.as_ref(),
            &title,
            abstract_text.as_deref(),
            &criteria,
        )
    })
    .await
    .map_err(|e| ApiError::internal(invocation_id, e.to_string()))?
    .map_err(|e| ApiError::internal(invocation_id, e.to_string()))?;

    Ok(AdHocResponse {
        decision: evaluation.decision,
        explanation: evaluation.explanation,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::db::repository::{
        add_criterion, get_session, insert_article, insert_file, insert_session, insert_settings,
        SessionStatus,
    };
    use crate::llm::MockCompletionClient;
    use crate::pipeline::state::mark_awaiting;
    use crate::pipeline::CycleConfig;

    const INCLUDE: &str = "Decision: Include\nExplanation: Meets every criterion.";

    struct TestApp {
        ctx: ApiContext,
        _dir: tempfile::TempDir,
    }

    fn test_app(client: MockCompletionClient, seed: impl FnOnce(&rusqlite::Connection)) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("screening.db");
        let conn = open_database(&db_path).unwrap();
        seed(&conn);
        drop(conn);

        TestApp {
            ctx: ApiContext::new(db_path, Arc::new(client), CycleConfig::default()),
            _dir: dir,
        }
    }

    fn seed_queued_session(conn: &rusqlite::Connection, session_id: &str, articles: usize) {
        insert_settings(conn, "Screen abstracts.", "test-model", 0.0, 512, None, 10).unwrap();
        insert_session(conn, session_id, "T").unwrap();
        add_criterion(conn, session_id, "Randomized controlled trial").unwrap();
        insert_file(conn, "f", session_id, "export.ris").unwrap();
        for i in 0..articles {
            insert_article(
                conn,
                &format!("art-{i:03}"),
                "f",
                &format!("Article {i}"),
                Some("An abstract."),
                None,
            )
            .unwrap();
        }
        mark_awaiting(conn, session_id).unwrap();
    }

    fn post_evaluate(body: Option<&str>) -> Request<Body> {
        let builder = Request::builder().method("POST").uri("/api/evaluate");
        match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_app(MockCompletionClient::new(INCLUDE), |_| {});
        let router = api_router(app.ctx.clone());

        let req = Request::builder()
            .method("GET")
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(!json["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_body_runs_a_cycle() {
        let app = test_app(MockCompletionClient::new(INCLUDE), |conn| {
            seed_queued_session(conn, "s", 2);
        });
        let router = api_router(app.ctx.clone());

        let response = router.oneshot(post_evaluate(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert!(!json["invocationId"].as_str().unwrap().is_empty());
        assert_eq!(json["sessionId"], "s");
        assert_eq!(json["processedCount"], 2);
        assert_eq!(json["isSessionCompleted"], true);
        assert_eq!(json["moreSessionsQueued"], false);
        assert_eq!(json["perArticleResults"].as_array().unwrap().len(), 2);

        let conn = open_database(&app.ctx.db_path).unwrap();
        assert_eq!(
            get_session(&conn, "s").unwrap().unwrap().status,
            SessionStatus::Completed
        );
    }

    #[tokio::test]
    async fn empty_json_body_also_runs_a_cycle() {
        let app = test_app(MockCompletionClient::new(INCLUDE), |conn| {
            seed_queued_session(conn, "s", 1);
        });
        let router = api_router(app.ctx.clone());

        let response = router.oneshot(post_evaluate(Some("{}"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["processedCount"], 1);
    }

    #[tokio::test]
    async fn cycle_with_nothing_queued_reports_it() {
        let app = test_app(MockCompletionClient::new(INCLUDE), |_| {});
        let router = api_router(app.ctx.clone());

        let response = router.oneshot(post_evaluate(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["message"], "no sessions awaiting evaluation");
        assert!(json.get("sessionId").is_none());
        assert_eq!(json["processedCount"], 0);
    }

    #[tokio::test]
    async fn session_fatal_error_still_returns_200_with_message() {
        // Session queued but no ai_settings row.
        let app = test_app(MockCompletionClient::new(INCLUDE), |conn| {
            insert_session(conn, "s", "T").unwrap();
            add_criterion(conn, "s", "RCT").unwrap();
            mark_awaiting(conn, "s").unwrap();
        });
        let router = api_router(app.ctx.clone());

        let response = router.oneshot(post_evaluate(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert!(json["message"].as_str().unwrap().contains("failed"));
        assert_eq!(json["moreSessionsQueued"], true);

        let conn = open_database(&app.ctx.db_path).unwrap();
        assert_eq!(
            get_session(&conn, "s").unwrap().unwrap().status,
            SessionStatus::Failed
        );
    }

    #[tokio::test]
    async fn ad_hoc_body_returns_decision() {
        let app = test_app(
            MockCompletionClient::new("Decision: Exclude\nExplanation: Not a trial."),
            |conn| {
                insert_settings(conn, "Screen abstracts.", "test-model", 0.0, 512, None, 10)
                    .unwrap();
            },
        );
        let router = api_router(app.ctx.clone());

        let body = r#"{"articleId":"a-1","title":"Case report","abstract":"One patient.","criteria":"1. RCT design"}"#;
        let response = router.oneshot(post_evaluate(Some(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["decision"], "exclude");
        assert_eq!(json["explanation"], "Not a trial.");
    }

    #[tokio::test]
    async fn ad_hoc_without_criteria_is_rejected() {
        let app = test_app(MockCompletionClient::new(INCLUDE), |_| {});
        let router = api_router(app.ctx.clone());

        let body = r#"{"title":"Case report"}"#;
        let response = router.oneshot(post_evaluate(Some(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = response_json(response).await;
        assert!(
            !json["invocationId"].as_str().unwrap().is_empty(),
            "rejections still carry a correlatable invocation id"
        );
        assert!(json["error"].as_str().unwrap().contains("criteria"));
    }

    #[tokio::test]
    async fn ad_hoc_without_settings_returns_500_with_invocation_id() {
        let app = test_app(MockCompletionClient::new(INCLUDE), |_| {});
        let router = api_router(app.ctx.clone());

        let body = r#"{"title":"T","criteria":"1. RCT"}"#;
        let response = router.oneshot(post_evaluate(Some(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = response_json(response).await;
        assert!(!json["invocationId"].as_str().unwrap().is_empty());
        assert!(json["error"].as_str().unwrap().contains("settings"));
    }

    #[tokio::test]
    async fn repeated_cycles_drain_a_large_session() {
        let app = test_app(MockCompletionClient::new(INCLUDE), |conn| {
            seed_queued_session(conn, "s", 15);
        });

        let first = api_router(app.ctx.clone())
            .oneshot(post_evaluate(None))
            .await
            .unwrap();
        let first = response_json(first).await;
        assert_eq!(first["processedCount"], 10);
        assert_eq!(first["isSessionCompleted"], false);
        assert_eq!(first["moreSessionsQueued"], true);

        let second = api_router(app.ctx.clone())
            .oneshot(post_evaluate(None))
            .await
            .unwrap();
        let second = response_json(second).await;
        assert_eq!(second["processedCount"], 5);
        assert_eq!(second["isSessionCompleted"], true);
        assert_eq!(second["moreSessionsQueued"], false);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = test_app(MockCompletionClient::new(INCLUDE), |_| {});
        let router = api_router(app.ctx.clone());

        let req = Request::builder()
            .method("GET")
            .uri("/api/nonexistent")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
