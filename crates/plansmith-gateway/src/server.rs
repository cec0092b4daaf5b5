use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use plansmith_core::config::ServerConfig;

use crate::routes;
use crate::state::AppState;

/// Build the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/queryText", post(routes::query_text))
        .route("/api/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The HTTP gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!(
            addr = %addr,
            provider = %self.state.provider,
            model = %self.state.model_id,
            "Gateway listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use plansmith_agent::{QueryService, EMPTY_INPUT_RESPONSE, FALLBACK_RESPONSE};
    use plansmith_core::provider::Provider;
    use plansmith_test_utils::{test_config, ScriptedLlm, ScriptedTurn};
    use tower::ServiceExt;

    fn app(llm: &ScriptedLlm) -> Router {
        let config = test_config();
        let service = QueryService::from_config(Arc::new(llm.clone()), &config).unwrap();
        router(Arc::new(AppState {
            service: Arc::new(service),
            provider: Provider::OpenAi,
            model_id: config.model.model_id,
        }))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/queryText")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(res: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_text_returns_response() {
        let llm = ScriptedLlm::new([ScriptedTurn::direct_response("Hello there!")]);
        let res = app(&llm)
            .oneshot(post_json(r#"{"input": "hi", "thread_id": "abc"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["response"], "Hello there!");
    }

    #[tokio::test]
    async fn test_query_text_failure_is_still_ok() {
        let llm = ScriptedLlm::new([ScriptedTurn::Error("down".into())]);
        let res = app(&llm)
            .oneshot(post_json(r#"{"input": "hi"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["response"], FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_missing_input_asks_for_question() {
        let llm = ScriptedLlm::default();
        let res = app(&llm).oneshot(post_json("{}")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["response"], EMPTY_INPUT_RESPONSE);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_gets_fallback() {
        let llm = ScriptedLlm::default();
        let res = app(&llm).oneshot(post_json("not json")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["response"], FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_health() {
        let llm = ScriptedLlm::default();
        let res = app(&llm)
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "ChatOpenAI");
    }
}
