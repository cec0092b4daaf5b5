pub mod providers;
pub mod response;
pub mod streaming;

use std::sync::Arc;

use plansmith_core::config::ModelConfig;
use plansmith_core::provider::Provider;
use plansmith_core::traits::LlmClient;

pub use providers::anthropic::AnthropicClient;
pub use providers::azure::AzureClient;
pub use providers::openai::OpenAiClient;
pub use response::{complete, AssistantTurn, ToolCall};

/// Create an LLM client for the configured provider.
///
/// Mistral, Fireworks and Groq are served by the OpenAI-compatible client
/// pointed at their preset endpoint.
pub fn create_client(config: &ModelConfig) -> Arc<dyn LlmClient> {
    match config.provider {
        Provider::Anthropic => Arc::new(AnthropicClient::new()),
        Provider::AzureOpenAi => Arc::new(AzureClient::new()),
        Provider::OpenAi => Arc::new(OpenAiClient::new()),
        other => match providers::presets::get_preset(other) {
            Some(preset) => Arc::new(OpenAiClient::with_endpoint(preset.default_base_url)),
            None => Arc::new(OpenAiClient::new()),
        },
    }
}

/// Apply preset headers for the configured provider to `config`.
pub fn apply_preset(config: &mut ModelConfig) {
    if let Some(preset) = providers::presets::get_preset(config.provider) {
        config.extra_headers = providers::presets::build_extra_headers(&preset, &config.extra_headers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_for_every_provider() {
        for p in Provider::ALL {
            let config = ModelConfig::for_provider(p);
            let _client = create_client(&config);
        }
    }

    #[test]
    fn test_apply_preset_keeps_configured_headers() {
        let mut config = ModelConfig::for_provider(Provider::Groq);
        config.extra_headers = vec![("X-Trace".into(), "1".into())];
        apply_preset(&mut config);
        assert_eq!(config.extra_headers, vec![("X-Trace".to_string(), "1".to_string())]);
    }
}
