use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use plansmith_core::config::NewsConfig;
use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::traits::Tool;
use plansmith_core::types::{ToolContext, ToolResult};

/// Fetches current top headlines from NewsAPI.
pub struct NewsTool {
    config: NewsConfig,
    http: reqwest::Client,
}

impl NewsTool {
    pub fn new(config: NewsConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
}

/// Article titles, one per line.
fn format_headlines(body: HeadlinesResponse) -> std::result::Result<String, String> {
    if body.status == "error" {
        return Err(body
            .message
            .unwrap_or_else(|| "News API returned an error".to_string()));
    }

    let titles: Vec<String> = body
        .articles
        .into_iter()
        .filter_map(|a| a.title)
        .filter(|t| !t.trim().is_empty())
        .collect();

    if titles.is_empty() {
        Ok("No headlines found.".to_string())
    } else {
        Ok(titles.join("\n"))
    }
}

impl Tool for NewsTool {
    fn name(&self) -> &str {
        "news"
    }

    fn description(&self) -> &str {
        "Can fetch latest news."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    fn execute(
        &self,
        _input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let Some(api_key) = self.config.api_key.as_deref() else {
                return Ok(ToolResult::error("News is unavailable: NEWS_API_KEY is not set"));
            };

            debug!(
                category = %self.config.category,
                country = %self.config.country,
                "Fetching top headlines"
            );

            let page_size = self.config.page_size.to_string();
            let resp = self
                .http
                .get(&self.config.base_url)
                .header("X-Api-Key", api_key)
                .header("User-Agent", concat!("plansmith/", env!("CARGO_PKG_VERSION")))
                .query(&[
                    ("language", self.config.language.as_str()),
                    ("country", self.config.country.as_str()),
                    ("category", self.config.category.as_str()),
                    ("pageSize", page_size.as_str()),
                ])
                .send()
                .await
                .map_err(|e| PlansmithError::ToolExecution {
                    tool: "news".into(),
                    message: e.to_string(),
                })?;

            let body: HeadlinesResponse =
                resp.json().await.map_err(|e| PlansmithError::ToolExecution {
                    tool: "news".into(),
                    message: e.to_string(),
                })?;

            Ok(match format_headlines(body) {
                Ok(text) => ToolResult::success(text),
                Err(message) => ToolResult::error(message),
            })
        })
    }

    fn timeout_secs(&self) -> u64 {
        20
    }
}
