use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};
use tracing::{error, warn};

use crate::error::{PlansmithError, Result};
use crate::provider::{Provider, FALLBACK_PROVIDER};

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub workflow: WorkflowConfig,
    pub news: NewsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }

/// Chat-model settings handed to every LLM call.
#[derive(Debug, Clone, Serialize)]
pub struct ModelConfig {
    pub provider: Provider,
    pub model_id: String,
    #[serde(serialize_with = "redact")]
    pub api_key: Option<String>,
    /// Override for the provider's endpoint URL.
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub azure_instance: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: Option<String>,
    /// Extra request headers (set by presets or tests).
    #[serde(skip)]
    pub extra_headers: Vec<(String, String)>,
}

impl ModelConfig {
    /// A config for `provider` with its default model and no credentials.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            model_id: provider.default_model().unwrap_or_default().to_string(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            azure_instance: None,
            azure_deployment: None,
            azure_api_version: None,
            extra_headers: vec![],
        }
    }
}

fn default_max_tokens() -> u32 { 2048 }

/// Plan-and-execute loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Upper bound on node executions per request.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Route workers back to the planner while steps remain.
    #[serde(default)]
    pub replan: bool,
    /// Upper bound on LLM turns inside one tool-calling agent run.
    #[serde(default = "default_max_agent_iterations")]
    pub max_agent_iterations: usize,
    /// Number of prior exchanges on a thread shown to the planner.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Threads kept in memory; the least recently used is evicted past this.
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            replan: false,
            max_agent_iterations: default_max_agent_iterations(),
            history_limit: default_history_limit(),
            max_threads: default_max_threads(),
        }
    }
}

fn default_max_steps() -> usize { 50 }
fn default_max_agent_iterations() -> usize { 15 }
fn default_history_limit() -> usize { 10 }
fn default_max_threads() -> usize { 1000 }

/// News headline tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default, serialize_with = "redact")]
    pub api_key: Option<String>,
    #[serde(default = "default_news_base_url")]
    pub base_url: String,
    #[serde(default = "default_news_category")]
    pub category: String,
    #[serde(default = "default_news_country")]
    pub country: String,
    #[serde(default = "default_news_language")]
    pub language: String,
    #[serde(default = "default_news_page_size")]
    pub page_size: u32,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_news_base_url(),
            category: default_news_category(),
            country: default_news_country(),
            language: default_news_language(),
            page_size: default_news_page_size(),
        }
    }
}

fn default_news_base_url() -> String { "https://newsapi.org/v2/top-headlines".to_string() }
fn default_news_category() -> String { "business".to_string() }
fn default_news_country() -> String { "us".to_string() }
fn default_news_language() -> String { "en".to_string() }
fn default_news_page_size() -> u32 { 5 }

/// Optional TOML file. Credentials are never read from here; they come from
/// the environment only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelFileConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub news: NewsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelFileConfig {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl FileConfig {
    /// Load from a TOML file, with `${ENV_VAR}` expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PlansmithError::ConfigNotFound(path.display().to_string()),
            _ => PlansmithError::Io(e),
        })?;

        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| PlansmithError::Config(e.to_string()))
    }
}

impl AppConfig {
    /// Resolve config from the process environment and an optional TOML file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => FileConfig::load(p)?,
            None => FileConfig::default(),
        };
        Self::from_lookup(|key| std::env::var(key).ok(), file)
    }

    /// Resolve config from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F, file: FileConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = select_provider(&get)?;

        let mut server = file.server;
        if let Some(port) = get("PORT") {
            match port.trim().parse::<u16>() {
                Ok(p) => server.port = p,
                Err(_) => warn!(port = %port, "Invalid PORT, using {}", server.port),
            }
        }
        if let Some(host) = get("HOST") {
            server.host = host;
        }

        let azure_deployment = get("AZURE_OPENAI_API_DEPLOYMENT_NAME");
        let model_id = get("MODEL")
            .or(file.model.model_id)
            .or_else(|| provider.default_model().map(str::to_string))
            .or_else(|| azure_deployment.clone())
            .unwrap_or_default();

        let model = ModelConfig {
            provider,
            model_id,
            api_key: get(provider.api_key_var()),
            base_url: None,
            max_tokens: file.model.max_tokens.unwrap_or_else(default_max_tokens),
            temperature: parse_temperature(get("TEMPERATURE").as_deref()),
            azure_instance: get("AZURE_OPENAI_API_INSTANCE_NAME"),
            azure_deployment,
            azure_api_version: get("AZURE_OPENAI_API_VERSION"),
            extra_headers: vec![],
        };

        let mut news = file.news;
        if let Some(key) = get("NEWS_API_KEY") {
            news.api_key = Some(key);
        }

        Ok(Self {
            server,
            model,
            workflow: file.workflow,
            news,
        })
    }
}

/// Pick the provider named by `DEFAULT_AI`, falling back to OpenAI when the
/// name is unknown or its credentials are incomplete.
pub fn select_provider<F>(get: &F) -> Result<Provider>
where
    F: Fn(&str) -> Option<String>,
{
    let requested = get("DEFAULT_AI").unwrap_or_else(|| FALLBACK_PROVIDER.as_str().to_string());

    let provider = match requested.parse::<Provider>() {
        Ok(p) if missing_vars(p, get).is_empty() => p,
        Ok(p) => {
            warn!(
                provider = %p,
                missing = %missing_vars(p, get).join(", "),
                "Environment variables not found, defaulting to {}",
                FALLBACK_PROVIDER
            );
            FALLBACK_PROVIDER
        }
        Err(_) => {
            warn!(requested = %requested, "Unknown DEFAULT_AI, defaulting to {}", FALLBACK_PROVIDER);
            FALLBACK_PROVIDER
        }
    };

    let missing = missing_vars(provider, get);
    if !missing.is_empty() {
        error!(provider = %provider, "API key not found");
        return Err(PlansmithError::MissingCredentials {
            provider: provider.to_string(),
            missing: missing.join(", "),
        });
    }

    Ok(provider)
}

fn missing_vars<F>(provider: Provider, get: &F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    provider
        .required_env_vars()
        .iter()
        .copied()
        .filter(|var| get(var).is_none())
        .collect()
}

/// Parse `TEMPERATURE`: unset or unparseable gives 0, otherwise clamped to [0, 1].
pub fn parse_temperature(raw: Option<&str>) -> f32 {
    match raw.and_then(|s| s.trim().parse::<f32>().ok()) {
        Some(t) if t.is_finite() => t.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn redact<S: Serializer>(value: &Option<String>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(_) => s.serialize_str("***"),
        None => s.serialize_none(),
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_PLANSMITH_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_PLANSMITH_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_PLANSMITH_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_PLANSMITH_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_PLANSMITH_VAR}\"");
    }

    #[test]
    fn test_defaults_with_openai_key_only() {
        let config = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")]), FileConfig::default()).unwrap();
        assert_eq!(config.model.provider, Provider::OpenAi);
        assert_eq!(config.model.model_id, "gpt-4");
        assert_eq!(config.model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model.temperature, 0.0);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.workflow.max_steps, 50);
        assert!(!config.workflow.replan);
    }

    #[test]
    fn test_missing_default_credentials_fails() {
        let err = AppConfig::from_lookup(lookup(&[("ANTHROPIC_API_KEY", "")]), FileConfig::default()).unwrap_err();
        assert!(matches!(err, PlansmithError::MissingCredentials { .. }));
    }

    #[test]
    fn test_selected_provider_with_credentials() {
        let config = AppConfig::from_lookup(
            lookup(&[("DEFAULT_AI", "ChatAnthropic"), ("ANTHROPIC_API_KEY", "ak")]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(config.model.provider, Provider::Anthropic);
        assert_eq!(config.model.model_id, "claude-3-sonnet-20240229");
        assert_eq!(config.model.api_key.as_deref(), Some("ak"));
    }

    #[test]
    fn test_uncredentialed_provider_falls_back_to_openai() {
        let config = AppConfig::from_lookup(
            lookup(&[("DEFAULT_AI", "ChatMistralAI"), ("OPENAI_API_KEY", "sk")]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(config.model.provider, Provider::OpenAi);
    }

    #[test]
    fn test_unknown_provider_falls_back_to_openai() {
        let config = AppConfig::from_lookup(
            lookup(&[("DEFAULT_AI", "ChatLlama"), ("OPENAI_API_KEY", "sk")]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(config.model.provider, Provider::OpenAi);
    }

    #[test]
    fn test_partial_azure_credentials_fall_back() {
        let config = AppConfig::from_lookup(
            lookup(&[
                ("DEFAULT_AI", "AzureChatOpenAI"),
                ("AZURE_OPENAI_API_KEY", "az"),
                ("OPENAI_API_KEY", "sk"),
            ]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(config.model.provider, Provider::OpenAi);
    }

    #[test]
    fn test_azure_uses_deployment_as_model() {
        let config = AppConfig::from_lookup(
            lookup(&[
                ("DEFAULT_AI", "AzureChatOpenAI"),
                ("AZURE_OPENAI_API_KEY", "az"),
                ("AZURE_OPENAI_API_VERSION", "2024-06-01"),
                ("AZURE_OPENAI_API_INSTANCE_NAME", "my-instance"),
                ("AZURE_OPENAI_API_DEPLOYMENT_NAME", "gpt4-deploy"),
            ]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(config.model.provider, Provider::AzureOpenAi);
        assert_eq!(config.model.model_id, "gpt4-deploy");
        assert_eq!(config.model.azure_instance.as_deref(), Some("my-instance"));
    }

    #[test]
    fn test_parse_temperature() {
        assert_eq!(parse_temperature(None), 0.0);
        assert_eq!(parse_temperature(Some("abc")), 0.0);
        assert_eq!(parse_temperature(Some("0.7")), 0.7);
        assert_eq!(parse_temperature(Some("1.5")), 1.0);
        assert_eq!(parse_temperature(Some("-2")), 0.0);
    }

    #[test]
    fn test_invalid_port_keeps_default() {
        let config = AppConfig::from_lookup(
            lookup(&[("OPENAI_API_KEY", "sk"), ("PORT", "not-a-port")]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_file_settings_and_env_precedence() {
        let toml_str = r#"
[server]
port = 8080

[model]
model_id = "gpt-4o"
max_tokens = 512

[workflow]
max_steps = 12
replan = true
"#;
        let file: FileConfig = toml::from_str(toml_str).unwrap();
        let config = AppConfig::from_lookup(
            lookup(&[("OPENAI_API_KEY", "sk"), ("PORT", "9000")]),
            file,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.model.model_id, "gpt-4o");
        assert_eq!(config.model.max_tokens, 512);
        assert_eq!(config.workflow.max_steps, 12);
        assert!(config.workflow.replan);
        assert_eq!(config.workflow.max_agent_iterations, 15);
        assert_eq!(config.workflow.max_threads, 1000);
        assert_eq!(config.news.category, "business");
    }

    #[test]
    fn test_serialized_config_redacts_keys() {
        let config = AppConfig::from_lookup(
            lookup(&[("OPENAI_API_KEY", "sk-secret"), ("NEWS_API_KEY", "news-secret")]),
            FileConfig::default(),
        )
        .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!json.contains("news-secret"));
        assert!(json.contains("\"ChatOpenAI\""));
    }
}
