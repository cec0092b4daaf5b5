use std::fmt::Write as _;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use plansmith_core::config::ModelConfig;
use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::traits::LlmClient;
use plansmith_core::types::*;
use plansmith_llm::complete;

use crate::workflow::{NodeId, PlanStep, StateUpdate, WorkflowNode, WorkflowState};

pub const PLAN_TOOL: &str = "plan";

const PLANNER_PROMPT: &str = "You are a supervisor managing a team of worker agents. \
For the given objective, come up with a simple step by step plan. \
Each step names the agent responsible for it and gives that agent self-contained \
instructions, because agents do not see each other's work or the original question. \
Do not add superfluous steps. Only use the agents listed. \
If some steps are already completed, plan only the remaining ones. \
If the objective can be answered directly without any agent, return an empty plan \
and put the answer in `response`. \
Always answer by calling the `plan` tool.";

/// The `plan` tool the planner is forced to call.
pub fn plan_tool() -> ToolDefinition {
    ToolDefinition {
        name: PLAN_TOOL.to_string(),
        description: "This tool is used to plan the steps to follow".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "plan": {
                    "type": "array",
                    "description": "different steps to follow, should be in sorted order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "agent": {
                                "type": "string",
                                "description": "The agent responsible for this step"
                            },
                            "instructions": {
                                "type": "string",
                                "description": "Instructions for the agent"
                            }
                        },
                        "required": ["agent", "instructions"]
                    }
                },
                "response": {
                    "type": "string",
                    "description": "Direct answer to the user when no steps are needed"
                }
            },
            "required": ["plan"]
        }),
    }
}

/// Raw structured output of the `plan` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanOutput {
    #[serde(default)]
    pub plan: Vec<RawStep>,
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStep {
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub instructions: String,
}

impl PlanOutput {
    /// Parse from the tool input, or from a JSON object embedded in text for
    /// models that answer in prose.
    pub fn from_turn(input: Option<&serde_json::Value>, text: &str) -> Result<Self> {
        if let Some(input) = input {
            return serde_json::from_value(input.clone())
                .map_err(|e| PlansmithError::LlmParse(format!("invalid plan: {}", e)));
        }

        let start = text.find('{');
        let end = text.rfind('}');
        match (start, end) {
            (Some(s), Some(e)) if s < e => serde_json::from_str(&text[s..=e])
                .map_err(|e| PlansmithError::LlmParse(format!("invalid plan: {}", e))),
            _ => Err(PlansmithError::LlmParse(
                "planner returned neither a plan call nor JSON".into(),
            )),
        }
    }

    /// Map agent names onto worker nodes. Summarizer and FINISH steps are
    /// dropped; unknown names go to General.
    pub fn into_steps(self, fallback_instructions: &str) -> Vec<PlanStep> {
        self.plan
            .into_iter()
            .filter_map(|raw| {
                let agent = match raw.agent.parse::<NodeId>() {
                    Ok(id) if id.is_worker() => id,
                    Ok(id) => {
                        debug!(agent = %id, "Dropping non-worker plan step");
                        return None;
                    }
                    Err(_) => {
                        warn!(agent = %raw.agent, "Unknown agent in plan, routing to General");
                        NodeId::General
                    }
                };
                let instructions = if raw.instructions.trim().is_empty() {
                    fallback_instructions.to_string()
                } else {
                    raw.instructions
                };
                Some(PlanStep::new(agent, instructions))
            })
            .collect()
    }
}

/// Decide the next state from a normalized plan.
pub fn route(steps: Vec<PlanStep>, response: Option<String>) -> StateUpdate {
    match steps.first() {
        Some(first) => StateUpdate::goto(first.agent)
            .with_instructions(first.instructions.clone())
            .with_plan(steps),
        None => match response.filter(|r| !r.trim().is_empty()) {
            Some(response) => StateUpdate::goto(NodeId::End)
                .with_plan(vec![])
                .with_response(response),
            None => StateUpdate::goto(NodeId::Summarizer).with_plan(vec![]),
        },
    }
}

/// Planner node: asks the model for a plan through a forced `plan` call.
pub struct PlannerNode {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    members: Vec<NodeId>,
}

impl PlannerNode {
    pub fn new(llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self {
            llm,
            model,
            members: NodeId::WORKERS.to_vec(),
        }
    }

    fn request(&self, state: &WorkflowState) -> ChatRequest {
        let mut system = String::from(PLANNER_PROMPT);
        let members: Vec<&str> = self.members.iter().map(|m| m.as_str()).collect();
        let _ = write!(system, "\n\nAvailable agents: {}.", members.join(", "));
        let _ = write!(
            system,
            "\nGeneral answers general questions and evaluates arithmetic with a calculator. \
             News fetches and summarizes the latest headlines."
        );

        let mut messages = vec![ChatMessage::system(system)];
        for exchange in state
            .history
            .iter()
            .filter(|e| !e.input.trim().is_empty() && !e.response.trim().is_empty())
        {
            messages.push(ChatMessage::user(exchange.input.clone()));
            messages.push(ChatMessage::assistant_text(exchange.response.clone()));
        }
        messages.push(ChatMessage::user(format_objective(state)));

        ChatRequest::new(messages)
            .with_tools(vec![plan_tool()])
            .force_tool(PLAN_TOOL)
    }
}

/// Objective, current plan and completed steps as one prompt.
fn format_objective(state: &WorkflowState) -> String {
    let mut out = format!("Objective: {}", state.input);

    if !state.plan.is_empty() {
        out.push_str("\n\nCurrent plan:");
        for (i, step) in state.plan.iter().enumerate() {
            let _ = write!(out, "\n{}. [{}] {}", i + 1, step.agent, step.instructions);
        }
    }

    if !state.past_steps.is_empty() {
        out.push_str("\n\nCompleted steps:");
        for step in &state.past_steps {
            let _ = write!(out, "\n- {}\n  Result: {}", step.step, step.result);
        }
    }

    out
}

impl WorkflowNode for PlannerNode {
    fn id(&self) -> NodeId {
        NodeId::Planner
    }

    fn run<'a>(
        &'a self,
        state: &'a WorkflowState,
        _ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let turn = complete(self.llm.as_ref(), &self.model, self.request(state)).await?;

            let call = turn.tool_calls.iter().find(|c| c.name == PLAN_TOOL);
            let output = PlanOutput::from_turn(call.map(|c| &c.input), &turn.text)?;
            let response = output.response.clone();
            let steps = output.into_steps(&state.input);

            info!(
                steps = steps.len(),
                agents = %steps.iter().map(|s| s.agent.as_str()).collect::<Vec<_>>().join(","),
                direct = response.is_some(),
                "Plan ready"
            );
            Ok(route(steps, response))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::state::{Exchange, PastStep};
    use plansmith_core::provider::Provider;
    use plansmith_test_utils::{ScriptedLlm, ScriptedTurn};

    fn planner(llm: &ScriptedLlm) -> PlannerNode {
        PlannerNode::new(Arc::new(llm.clone()), ModelConfig::for_provider(Provider::OpenAi))
    }

    #[test]
    fn test_normalizes_agent_names() {
        let output: PlanOutput = serde_json::from_value(json!({
            "plan": [
                {"agent": "calculator", "instructions": "Compute 2+2"},
                {"agent": "NEWS", "instructions": "Get headlines"},
                {"agent": "Weather", "instructions": "Forecast"},
                {"agent": "Summarizer", "instructions": "Summarize"},
                {"agent": "FINISH", "instructions": ""}
            ]
        }))
        .unwrap();

        let steps = output.into_steps("q");
        assert_eq!(
            steps,
            vec![
                PlanStep::new(NodeId::General, "Compute 2+2"),
                PlanStep::new(NodeId::News, "Get headlines"),
                PlanStep::new(NodeId::General, "Forecast"),
            ]
        );
    }

    #[test]
    fn test_route_policies() {
        let update = route(vec![PlanStep::new(NodeId::News, "headlines")], None);
        assert_eq!(update.next, Some(NodeId::News));
        assert_eq!(update.instructions.as_deref(), Some("headlines"));

        let update = route(vec![], Some("Hello!".into()));
        assert_eq!(update.next, Some(NodeId::End));
        assert_eq!(update.response.as_deref(), Some("Hello!"));

        let update = route(vec![], Some("  ".into()));
        assert_eq!(update.next, Some(NodeId::Summarizer));
        assert_eq!(update.plan, Some(vec![]));
    }

    #[test]
    fn test_plan_from_text_fallback() {
        let output = PlanOutput::from_turn(
            None,
            "Sure! {\"plan\": [{\"agent\": \"General\", \"instructions\": \"x\"}]} done",
        )
        .unwrap();
        assert_eq!(output.plan.len(), 1);

        let err = PlanOutput::from_turn(None, "no plan here").unwrap_err();
        assert!(matches!(err, PlansmithError::LlmParse(_)));
    }

    #[tokio::test]
    async fn test_planner_forces_plan_tool() {
        let llm = ScriptedLlm::new([ScriptedTurn::plan(&[
            ("General", "Calculate 123/11*412"),
            ("News", "Get the latest news"),
        ])]);
        let mut state = WorkflowState::new("Calculate 123/11*412 and give me the latest news");
        state.history = vec![Exchange {
            input: "hi".into(),
            response: "hello".into(),
        }];

        let update = planner(&llm)
            .run(&state, &ToolContext::default())
            .await
            .unwrap();

        assert_eq!(update.next, Some(NodeId::General));
        assert_eq!(update.plan.as_ref().map(|p| p.len()), Some(2));

        let request = &llm.requests()[0];
        assert_eq!(request.tool_choice, ToolChoice::Tool("plan".into()));
        assert!(request.messages[0].text().contains("General, News"));
        // system, history pair, objective
        assert_eq!(request.messages.len(), 4);
        assert!(request.messages[3].text().starts_with("Objective: Calculate"));
    }

    #[tokio::test]
    async fn test_blank_history_is_not_replayed() {
        let llm = ScriptedLlm::new([ScriptedTurn::direct_response("ok")]);
        let mut state = WorkflowState::new("q");
        state.history = vec![
            Exchange {
                input: "hi".into(),
                response: "".into(),
            },
            Exchange {
                input: "2+2?".into(),
                response: "4".into(),
            },
        ];

        planner(&llm)
            .run(&state, &ToolContext::default())
            .await
            .unwrap();

        let request = &llm.requests()[0];
        // system, one history pair, objective
        assert_eq!(request.messages.len(), 4);
        assert!(request.messages.iter().all(|m| !m.text().is_empty()));
    }

    #[test]
    fn test_objective_lists_completed_steps() {
        let mut state = WorkflowState::new("q");
        state.plan = vec![PlanStep::new(NodeId::News, "headlines")];
        state.past_steps = vec![PastStep {
            step: "calc".into(),
            result: "4".into(),
        }];
        let text = format_objective(&state);
        assert!(text.contains("1. [News] headlines"));
        assert!(text.contains("- calc\n  Result: 4"));
    }
}
