pub mod anthropic;
pub mod azure;
pub mod openai;
pub mod presets;

pub use anthropic::AnthropicClient;
pub use azure::AzureClient;
pub use openai::OpenAiClient;
