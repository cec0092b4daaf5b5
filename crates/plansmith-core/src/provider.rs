use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlansmithError;

/// Supported chat-model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "ChatOpenAI")]
    OpenAi,
    #[serde(rename = "AzureChatOpenAI")]
    AzureOpenAi,
    #[serde(rename = "ChatAnthropic")]
    Anthropic,
    #[serde(rename = "ChatMistralAI")]
    Mistral,
    #[serde(rename = "ChatFireworks")]
    Fireworks,
    #[serde(rename = "ChatGroq")]
    Groq,
}

/// Provider used when `DEFAULT_AI` is unset or unusable.
pub const FALLBACK_PROVIDER: Provider = Provider::OpenAi;

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::OpenAi,
        Provider::AzureOpenAi,
        Provider::Anthropic,
        Provider::Mistral,
        Provider::Fireworks,
        Provider::Groq,
    ];

    /// Canonical name, as accepted in `DEFAULT_AI`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "ChatOpenAI",
            Self::AzureOpenAi => "AzureChatOpenAI",
            Self::Anthropic => "ChatAnthropic",
            Self::Mistral => "ChatMistralAI",
            Self::Fireworks => "ChatFireworks",
            Self::Groq => "ChatGroq",
        }
    }

    /// Environment variables that must all be set for this provider.
    pub fn required_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::AzureOpenAi => &[
                "AZURE_OPENAI_API_KEY",
                "AZURE_OPENAI_API_VERSION",
                "AZURE_OPENAI_API_INSTANCE_NAME",
                "AZURE_OPENAI_API_DEPLOYMENT_NAME",
            ],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::Mistral => &["MISTRAL_API_KEY"],
            Self::Fireworks => &["FIREWORKS_API_KEY"],
            Self::Groq => &["GROQ_API_KEY"],
        }
    }

    /// The variable holding the API key itself.
    pub fn api_key_var(&self) -> &'static str {
        self.required_env_vars()[0]
    }

    /// Model used when no override is configured. Azure uses the deployment
    /// name instead, so it has none.
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("gpt-4"),
            Self::AzureOpenAi => None,
            Self::Anthropic => Some("claude-3-sonnet-20240229"),
            Self::Mistral => Some("mistral-large-latest"),
            Self::Fireworks => Some("accounts/fireworks/models/firefunction-v1"),
            Self::Groq => Some("llama3-70b-8192"),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = PlansmithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatopenai" | "openai" => Ok(Self::OpenAi),
            "azurechatopenai" | "azure" | "azure-openai" => Ok(Self::AzureOpenAi),
            "chatanthropic" | "anthropic" | "claude" => Ok(Self::Anthropic),
            "chatmistralai" | "mistral" => Ok(Self::Mistral),
            "chatfireworks" | "fireworks" => Ok(Self::Fireworks),
            "chatgroq" | "groq" => Ok(Self::Groq),
            _ => Err(PlansmithError::UnsupportedProvider(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_and_alias_names() {
        assert_eq!("ChatOpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("AzureChatOpenAI".parse::<Provider>().unwrap(), Provider::AzureOpenAi);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!("ChatGroq".parse::<Provider>().unwrap(), Provider::Groq);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = "ChatLlama".parse::<Provider>().unwrap_err();
        assert!(matches!(err, PlansmithError::UnsupportedProvider(_)));
    }

    #[test]
    fn test_canonical_name_roundtrips() {
        for p in Provider::ALL {
            assert_eq!(p.as_str().parse::<Provider>().unwrap(), p);
        }
    }

    #[test]
    fn test_azure_requires_four_vars() {
        assert_eq!(Provider::AzureOpenAi.required_env_vars().len(), 4);
        assert_eq!(Provider::AzureOpenAi.api_key_var(), "AZURE_OPENAI_API_KEY");
        assert!(Provider::AzureOpenAi.default_model().is_none());
    }
}
