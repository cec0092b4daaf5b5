use serde::{Deserialize, Serialize};

use super::node::NodeId;

pub const DEFAULT_INSTRUCTIONS: &str = "Solve the human's question.";

/// A planned sub-task and the worker assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub agent: NodeId,
    pub instructions: String,
}

impl PlanStep {
    pub fn new(agent: NodeId, instructions: impl Into<String>) -> Self {
        Self {
            agent,
            instructions: instructions.into(),
        }
    }
}

/// A completed step and the worker's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastStep {
    pub step: String,
    pub result: String,
}

/// A prior request/answer pair on the same thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub input: String,
    pub response: String,
}

/// Shared record threaded through every node of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub input: String,
    pub plan: Vec<PlanStep>,
    pub past_steps: Vec<PastStep>,
    pub instructions: String,
    pub next: NodeId,
    pub response: Option<String>,
    pub history: Vec<Exchange>,
}

impl WorkflowState {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            plan: Vec::new(),
            past_steps: Vec::new(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            next: NodeId::Planner,
            response: None,
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<Exchange>) -> Self {
        self.history = history;
        self
    }

    /// Merge a node's update.
    ///
    /// `plan` is replaced, `past_steps` appended, and `response`, `next` and
    /// `instructions` take the update's value unless it is absent or empty.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(plan) = update.plan {
            self.plan = plan;
        }
        self.past_steps.extend(update.past_steps);
        if let Some(response) = update.response.filter(|r| !r.trim().is_empty()) {
            self.response = Some(response);
        }
        if let Some(next) = update.next {
            self.next = next;
        }
        if let Some(instructions) = update.instructions.filter(|i| !i.trim().is_empty()) {
            self.instructions = instructions;
        }
    }
}

/// Partial update returned by a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub plan: Option<Vec<PlanStep>>,
    pub past_steps: Vec<PastStep>,
    pub response: Option<String>,
    pub next: Option<NodeId>,
    pub instructions: Option<String>,
}

impl StateUpdate {
    pub fn goto(next: NodeId) -> Self {
        Self {
            next: Some(next),
            ..Default::default()
        }
    }

    pub fn with_plan(mut self, plan: Vec<PlanStep>) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_past_step(mut self, step: impl Into<String>, result: impl Into<String>) -> Self {
        self.past_steps.push(PastStep {
            step: step.into(),
            result: result.into(),
        });
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = WorkflowState::new("hi");
        assert_eq!(state.next, NodeId::Planner);
        assert_eq!(state.instructions, DEFAULT_INSTRUCTIONS);
        assert!(state.response.is_none());
    }

    #[test]
    fn test_plan_replaced_and_past_steps_appended() {
        let mut state = WorkflowState::new("q");
        state.apply(StateUpdate::goto(NodeId::General).with_plan(vec![
            PlanStep::new(NodeId::General, "a"),
            PlanStep::new(NodeId::News, "b"),
        ]));
        state.apply(
            StateUpdate::goto(NodeId::News)
                .with_plan(vec![PlanStep::new(NodeId::News, "b")])
                .with_past_step("a", "1"),
        );
        state.apply(StateUpdate::goto(NodeId::Summarizer).with_plan(vec![]).with_past_step("b", "2"));

        assert!(state.plan.is_empty());
        assert_eq!(state.past_steps.len(), 2);
        assert_eq!(state.past_steps[1].result, "2");
        assert_eq!(state.next, NodeId::Summarizer);
    }

    #[test]
    fn test_empty_values_keep_previous() {
        let mut state = WorkflowState::new("q");
        state.apply(StateUpdate::default().with_instructions("step one").with_response("done"));
        state.apply(StateUpdate::default().with_instructions("  ").with_response(""));
        assert_eq!(state.instructions, "step one");
        assert_eq!(state.response.as_deref(), Some("done"));
        assert_eq!(state.next, NodeId::Planner);
    }

    #[test]
    fn test_absent_plan_keeps_previous() {
        let mut state = WorkflowState::new("q");
        state.apply(StateUpdate::default().with_plan(vec![PlanStep::new(NodeId::News, "x")]));
        state.apply(StateUpdate::goto(NodeId::News));
        assert_eq!(state.plan.len(), 1);
    }
}
