use std::sync::Arc;

use plansmith_agent::QueryService;
use plansmith_core::provider::Provider;

/// Shared application state for axum handlers.
pub struct AppState {
    pub service: Arc<QueryService>,
    pub provider: Provider,
    pub model_id: String,
}
