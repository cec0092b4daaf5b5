use plansmith_core::provider::Provider;

/// Endpoint preset for a provider served through the OpenAI-compatible client.
pub struct ProviderPreset {
    pub default_base_url: &'static str,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

/// Look up the preset for a provider. `None` for providers with their own client.
pub fn get_preset(provider: Provider) -> Option<ProviderPreset> {
    match provider {
        Provider::Mistral => Some(ProviderPreset {
            default_base_url: "https://api.mistral.ai/v1/chat/completions",
            extra_headers: &[],
        }),
        Provider::Fireworks => Some(ProviderPreset {
            default_base_url: "https://api.fireworks.ai/inference/v1/chat/completions",
            extra_headers: &[],
        }),
        Provider::Groq => Some(ProviderPreset {
            default_base_url: "https://api.groq.com/openai/v1/chat/completions",
            extra_headers: &[],
        }),
        Provider::OpenAi | Provider::AzureOpenAi | Provider::Anthropic => None,
    }
}

/// Merge preset headers with configured ones. Configured values win.
pub fn build_extra_headers(
    preset: &ProviderPreset,
    configured: &[(String, String)],
) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = preset
        .extra_headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for (k, v) in configured {
        if let Some(pos) = headers.iter().position(|(hk, _)| hk.eq_ignore_ascii_case(k)) {
            headers[pos].1 = v.clone();
        } else {
            headers.push((k.clone(), v.clone()));
        }
    }

    headers
}
