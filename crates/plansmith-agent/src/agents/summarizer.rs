use std::sync::Arc;

use futures::future::BoxFuture;

use plansmith_core::config::ModelConfig;
use plansmith_core::error::Result;
use plansmith_core::traits::LlmClient;
use plansmith_core::types::{ChatMessage, ToolContext};
use plansmith_tools::ToolRegistry;

use crate::agent::{create_agent, Agent, AgentSpec};
use crate::workflow::{NodeId, StateUpdate, WorkflowNode, WorkflowState};

pub const SUMMARIZER_PROMPT: &str = "Below is a conversation between a human and multiple AI agents. \
Summarize the AI response so it is a single unified response to the user. \
Do not add filler words or mention that this is a summary. \
Do not re-mention the questions. Do not use markdown or LaTeX Syntax.";

/// Summarizer agent. Keeps the calculator for last-minute arithmetic.
pub fn summarizer_agent(
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    tools: &ToolRegistry,
    max_iterations: usize,
) -> Arc<dyn Agent> {
    create_agent(
        llm,
        model,
        AgentSpec::new("Summarizer", SUMMARIZER_PROMPT)
            .with_tools(tools.subset(&["calculator"]))
            .with_max_iterations(max_iterations),
    )
}

/// Merges all step results into the final response.
pub struct SummarizerNode {
    agent: Arc<dyn Agent>,
}

impl SummarizerNode {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }
}

/// The human's input followed by the agents' results, newline-separated.
fn conversation(state: &WorkflowState) -> Vec<ChatMessage> {
    let results = state
        .past_steps
        .iter()
        .map(|s| s.result.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut messages = vec![ChatMessage::user(state.input.clone())];
    if !results.trim().is_empty() {
        messages.push(ChatMessage::assistant_text(results));
    }
    messages
}

impl WorkflowNode for SummarizerNode {
    fn id(&self) -> NodeId {
        NodeId::Summarizer
    }

    fn run<'a>(
        &'a self,
        state: &'a WorkflowState,
        ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let response = self.agent.invoke(conversation(state), ctx).await?;
            Ok(StateUpdate::goto(NodeId::End).with_response(response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::PastStep;
    use plansmith_core::provider::Provider;
    use plansmith_core::types::Role;
    use plansmith_test_utils::{ScriptedLlm, ScriptedTurn};

    #[tokio::test]
    async fn test_summarizes_past_steps() {
        let llm = ScriptedLlm::new([ScriptedTurn::text("4606.91. Markets rallied.")]);
        let agent = summarizer_agent(
            Arc::new(llm.clone()),
            ModelConfig::for_provider(Provider::OpenAi),
            &ToolRegistry::with_builtins(&Default::default()),
            5,
        );

        let mut state = WorkflowState::new("Calculate 123/11*412 and give me the latest news");
        state.past_steps = vec![
            PastStep {
                step: "calc".into(),
                result: "4606.91".into(),
            },
            PastStep {
                step: "news".into(),
                result: "Markets rallied".into(),
            },
        ];

        let update = SummarizerNode::new(agent)
            .run(&state, &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(update.next, Some(NodeId::End));
        assert_eq!(update.response.as_deref(), Some("4606.91. Markets rallied."));

        let request = &llm.requests()[0];
        assert_eq!(request.messages[0].text(), SUMMARIZER_PROMPT);
        assert_eq!(request.messages[1].text(), state.input);
        assert_eq!(request.messages[2].role, Role::Assistant);
        assert_eq!(request.messages[2].text(), "4606.91\nMarkets rallied");
        assert_eq!(request.tools.len(), 1);
    }

    #[test]
    fn test_no_results_sends_only_input() {
        let state = WorkflowState::new("hello");
        let messages = conversation(&state);
        assert_eq!(messages.len(), 1);
    }
}
