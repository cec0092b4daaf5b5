use std::sync::Arc;

use plansmith_core::config::ModelConfig;
use plansmith_core::traits::LlmClient;
use plansmith_tools::ToolRegistry;

use crate::agent::{create_agent, Agent, AgentSpec};

pub const GENERAL_PROMPT: &str = "Provide general answers to the user";

/// General-purpose agent with the calculator. Also planned as "Calculator".
pub fn general_agent(
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    tools: &ToolRegistry,
    max_iterations: usize,
) -> Arc<dyn Agent> {
    create_agent(
        llm,
        model,
        AgentSpec::new("General", GENERAL_PROMPT)
            .with_tools(tools.subset(&["calculator"]))
            .with_max_iterations(max_iterations),
    )
}
