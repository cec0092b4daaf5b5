use std::sync::Arc;

use plansmith_core::config::ModelConfig;
use plansmith_core::traits::LlmClient;
use plansmith_tools::ToolRegistry;

use crate::agent::{create_agent, Agent, AgentSpec};

pub const NEWS_PROMPT: &str = "Provide news summary to the user";

/// Headline-summarizing agent with the news tool.
pub fn news_agent(
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    tools: &ToolRegistry,
    max_iterations: usize,
) -> Arc<dyn Agent> {
    create_agent(
        llm,
        model,
        AgentSpec::new("News", NEWS_PROMPT)
            .with_tools(tools.subset(&["news"]))
            .with_max_iterations(max_iterations),
    )
}
