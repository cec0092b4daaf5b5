use futures::future::BoxFuture;
use futures::stream::BoxStream;
use reqwest::Client;

use plansmith_core::config::ModelConfig;
use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::traits::LlmClient;
use plansmith_core::types::*;

use super::openai::{send_streaming, OaiRequest};

const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Azure OpenAI client. Uses the same wire format as OpenAI but different
/// endpoint structure and `api-key` header instead of Bearer token.
pub struct AzureClient {
    http: Client,
}

impl AzureClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for AzureClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat-completions URL for a deployment. `base_url` replaces the whole URL.
pub(crate) fn endpoint_url(config: &ModelConfig) -> Result<String> {
    if let Some(url) = &config.base_url {
        return Ok(url.clone());
    }

    let instance = config
        .azure_instance
        .as_deref()
        .ok_or_else(|| PlansmithError::Config("Azure: instance name is required".into()))?;
    let deployment = config
        .azure_deployment
        .as_deref()
        .ok_or_else(|| PlansmithError::Config("Azure: deployment name is required".into()))?;
    let api_version = config
        .azure_api_version
        .as_deref()
        .unwrap_or(DEFAULT_API_VERSION);

    Ok(format!(
        "https://{instance}.openai.azure.com/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
    ))
}

impl LlmClient for AzureClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        request: ChatRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();

        Box::pin(async move {
            let url = endpoint_url(&config)?;
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| PlansmithError::Config("Azure: api_key is required".into()))?;

            // The deployment in the URL selects the model.
            let body = OaiRequest::build(&config, request, None);

            let mut req = self
                .http
                .post(&url)
                .header("api-key", api_key)
                .json(&body);

            for (k, v) in &config.extra_headers {
                req = req.header(k.as_str(), v.as_str());
            }

            send_streaming(req).await
        })
    }
}
