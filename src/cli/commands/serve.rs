//! HTTP API server for integration with other systems.
//!
//! Exposes the ingestion, retrieval, analyze, and overview pipelines on a
//! single endpoint multiplexed by an `action` field, plus read-only
//! listing and a collection delete. Callers are the upload UI and other
//! collaborators; they never touch the pipelines directly.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::BlikkError;
use crate::frames::FrameRecord;
use crate::orchestrator::{Orchestrator, OverviewFrame};
use crate::vector_store::QueryMatch;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route(
            "/rag",
            get(listings).post(dispatch).delete(delete_collection),
        )
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Blikk API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Pipelines", "POST   /rag  (action: ingest | query | analyze | overview)");
    Output::kv("Listings", "GET    /rag?list=indexes | ?list=namespaces&indexName=");
    Output::kv("Delete", "DELETE /rag?indexName=");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RagRequest {
    action: String,
    index_name: Option<String>,
    /// Alternative collection source: the uploaded video's filename.
    video_file: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    video_id: Option<String>,
    #[serde(default)]
    skip_ensure: bool,
    /// Frame records; extractors send either key.
    #[serde(default, alias = "records")]
    frames: Vec<FrameRecord>,
    summary: Option<String>,
    video_filename: Option<String>,
    question: Option<String>,
    top_k: Option<usize>,
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "videoId must be a string or number, got {}",
            other
        ))),
    }
}

#[derive(Deserialize)]
struct ListParams {
    list: Option<String>,
    #[serde(rename = "indexName")]
    index_name: Option<String>,
}

#[derive(Serialize)]
struct IngestResponse {
    status: &'static str,
    upserted: usize,
    namespace: String,
    index: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    status: &'static str,
    matches: Vec<QueryMatch>,
    index: String,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    status: &'static str,
    answer: String,
    citations: Vec<QueryMatch>,
    index: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct OverviewResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    frames: Vec<OverviewFrame>,
    index: String,
    namespace: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct IndexEntry {
    name: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

fn error_response(error: BlikkError) -> axum::response::Response {
    let code = match &error {
        BlikkError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        code,
        Json(ErrorResponse {
            status: "error",
            message: error.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            status: "error",
            message: message.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RagRequest>,
) -> axum::response::Response {
    let index_name = req.index_name.as_deref().or(req.video_file.as_deref());
    let video_id = req.video_id.as_deref();

    match req.action.as_str() {
        // `ingest_final` is the extractor's last batch; both land in the
        // same pipeline.
        "ingest" | "ingest_final" => {
            match state
                .orchestrator
                .ingest(
                    index_name,
                    video_id,
                    req.frames,
                    req.summary,
                    req.video_filename,
                    req.skip_ensure,
                )
                .await
            {
                Ok(outcome) => Json(IngestResponse {
                    status: "ok",
                    upserted: outcome.upserted,
                    namespace: outcome.namespace,
                    index: outcome.index,
                    warnings: outcome.warnings,
                })
                .into_response(),
                Err(e) => error_response(e),
            }
        }

        "query" => {
            let question = req.question.unwrap_or_default();
            match state
                .orchestrator
                .search(index_name, video_id, &question, req.top_k, req.skip_ensure)
                .await
            {
                Ok(matches) => Json(QueryResponse {
                    status: "ok",
                    matches,
                    index: state.orchestrator.resolve_index_name(index_name),
                })
                .into_response(),
                Err(e) => error_response(e),
            }
        }

        "analyze" => {
            let question = req.question.unwrap_or_default();
            match state
                .orchestrator
                .analyze(index_name, video_id, &question, req.top_k, req.skip_ensure)
                .await
            {
                Ok(response) => Json(AnalyzeResponse {
                    status: "ok",
                    answer: response.answer,
                    citations: response.citations,
                    index: state.orchestrator.resolve_index_name(index_name),
                    warnings: response.warnings,
                })
                .into_response(),
                Err(e) => error_response(e),
            }
        }

        "overview" => {
            match state
                .orchestrator
                .overview(index_name, video_id, req.top_k, req.skip_ensure)
                .await
            {
                Ok(overview) => Json(OverviewResponse {
                    status: "ok",
                    summary: overview.summary,
                    frames: overview.frames,
                    index: overview.index,
                    namespace: overview.namespace,
                    warnings: overview.warnings,
                })
                .into_response(),
                Err(e) => error_response(e),
            }
        }

        other => bad_request(&format!("Unknown action: {}", other)),
    }
}

async fn listings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> axum::response::Response {
    match params.list.as_deref() {
        Some("indexes") => match state.orchestrator.list_indexes().await {
            Ok(names) => Json(serde_json::json!({
                "status": "ok",
                "indexes": names
                    .into_iter()
                    .map(|name| IndexEntry { name })
                    .collect::<Vec<_>>(),
            }))
            .into_response(),
            Err(e) => error_response(e),
        },

        Some("namespaces") => {
            match state
                .orchestrator
                .list_namespaces(params.index_name.as_deref())
                .await
            {
                Ok((index, namespaces)) => Json(serde_json::json!({
                    "status": "ok",
                    "index": index,
                    "namespaces": namespaces,
                }))
                .into_response(),
                Err(e) => error_response(e),
            }
        }

        _ => bad_request("Expected ?list=indexes or ?list=namespaces"),
    }
}

async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> axum::response::Response {
    let Some(name) = params.index_name.filter(|n| !n.trim().is_empty()) else {
        return bad_request("Missing indexName");
    };

    match state.orchestrator.delete_index(&name).await {
        Ok(index) => Json(serde_json::json!({
            "status": "ok",
            "index": index,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}
