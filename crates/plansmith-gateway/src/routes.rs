use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use plansmith_agent::FALLBACK_RESPONSE;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
}

/// POST /queryText
///
/// Always answers 200 with a `response`; failures become the fallback text.
pub async fn query_text(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QueryBody>, JsonRejection>,
) -> Json<QueryResponse> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(e) => {
            warn!(error = %e, "Rejected query body");
            return Json(QueryResponse {
                response: FALLBACK_RESPONSE.to_string(),
            });
        }
    };

    let response = state
        .service
        .query_text(&body.input, body.thread_id.as_deref())
        .await;
    Json(QueryResponse { response })
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.provider.as_str(),
        "model": state.model_id,
    }))
}
