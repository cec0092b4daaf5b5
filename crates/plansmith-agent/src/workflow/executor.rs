use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::types::ToolContext;

use super::edge::TransitionTable;
use super::node::{NodeId, WorkflowNode};
use super::state::WorkflowState;

pub const DEFAULT_MAX_STEPS: usize = 50;

/// Result of one workflow invocation.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub state: WorkflowState,
    /// Nodes executed, in order.
    pub trace: Vec<NodeId>,
    pub elapsed_ms: u64,
}

impl WorkflowRun {
    pub fn steps(&self) -> usize {
        self.trace.len()
    }
}

/// A compiled state machine: node handlers plus the transition table.
///
/// Immutable once built, so one instance serves concurrent requests.
pub struct Workflow {
    nodes: HashMap<NodeId, Arc<dyn WorkflowNode>>,
    transitions: TransitionTable,
    entry: NodeId,
    max_steps: usize,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Run from the entry node until `End`.
    ///
    /// Each node's update is merged into the state, and the `next` it leaves
    /// behind must be allowed by the transition table.
    pub async fn invoke(&self, mut state: WorkflowState, ctx: &ToolContext) -> Result<WorkflowRun> {
        let start = Instant::now();
        let mut trace = Vec::new();
        let mut current = self.entry;
        state.next = current;

        while !current.is_terminal() {
            if trace.len() >= self.max_steps {
                return Err(PlansmithError::StepBudgetExceeded(self.max_steps));
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| PlansmithError::MissingNode(current.to_string()))?;

            let node_start = Instant::now();
            let update = node.run(&state, ctx).await?;
            state.apply(update);
            trace.push(current);

            let next = state.next;
            self.transitions.check(current, next)?;

            info!(
                node = %current,
                next = %next,
                step = trace.len(),
                elapsed_ms = node_start.elapsed().as_millis() as u64,
                "Workflow step complete"
            );
            current = next;
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(steps = trace.len(), elapsed_ms, "Workflow reached End");

        Ok(WorkflowRun {
            state,
            trace,
            elapsed_ms,
        })
    }
}

/// Assembles and validates a [`Workflow`].
pub struct WorkflowBuilder {
    nodes: HashMap<NodeId, Arc<dyn WorkflowNode>>,
    transitions: TransitionTable,
    entry: NodeId,
    max_steps: usize,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            transitions: TransitionTable::standard(),
            entry: NodeId::Planner,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl WorkflowBuilder {
    /// Register a handler, replacing any previous one for the same id.
    pub fn node(mut self, node: Arc<dyn WorkflowNode>) -> Self {
        self.nodes.insert(node.id(), node);
        self
    }

    pub fn transitions(mut self, table: TransitionTable) -> Self {
        self.transitions = table;
        self
    }

    pub fn entry(mut self, entry: NodeId) -> Self {
        self.entry = entry;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Fails if the entry or any non-terminal node in the table lacks a handler.
    pub fn build(self) -> Result<Workflow> {
        let mut required: Vec<NodeId> = self
            .transitions
            .nodes()
            .into_iter()
            .filter(|n| !n.is_terminal())
            .collect();
        required.push(self.entry);

        if let Some(missing) = required.iter().find(|n| !self.nodes.contains_key(n)) {
            return Err(PlansmithError::MissingNode(missing.to_string()));
        }

        Ok(Workflow {
            nodes: self.nodes,
            transitions: self.transitions,
            entry: self.entry,
            max_steps: self.max_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::state::{PlanStep, StateUpdate};
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Node that always returns the same update.
    struct FixedNode {
        id: NodeId,
        update: StateUpdate,
        calls: AtomicUsize,
    }

    impl FixedNode {
        fn new(id: NodeId, update: StateUpdate) -> Arc<Self> {
            Arc::new(Self {
                id,
                update,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl WorkflowNode for FixedNode {
        fn id(&self) -> NodeId {
            self.id
        }

        fn run<'a>(
            &'a self,
            _state: &'a WorkflowState,
            _ctx: &'a ToolContext,
        ) -> BoxFuture<'a, Result<StateUpdate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let update = self.update.clone();
            Box::pin(async move { Ok(update) })
        }
    }

    /// Worker that consumes the head of the plan.
    struct PopNode(NodeId);

    impl WorkflowNode for PopNode {
        fn id(&self) -> NodeId {
            self.0
        }

        fn run<'a>(
            &'a self,
            state: &'a WorkflowState,
            _ctx: &'a ToolContext,
        ) -> BoxFuture<'a, Result<StateUpdate>> {
            Box::pin(async move {
                let rest = state.plan.get(1..).unwrap_or_default().to_vec();
                let next = rest.first().map(|s| s.agent).unwrap_or(NodeId::Summarizer);
                Ok(StateUpdate::goto(next)
                    .with_plan(rest)
                    .with_past_step(state.instructions.clone(), format!("{} done", self.0)))
            })
        }
    }

    fn standard_nodes(planner: StateUpdate) -> WorkflowBuilder {
        Workflow::builder()
            .node(FixedNode::new(NodeId::Planner, planner))
            .node(Arc::new(PopNode(NodeId::General)))
            .node(Arc::new(PopNode(NodeId::News)))
            .node(FixedNode::new(
                NodeId::Summarizer,
                StateUpdate::goto(NodeId::End).with_response("summary"),
            ))
    }

    #[tokio::test]
    async fn test_runs_plan_to_end() {
        let plan = vec![
            PlanStep::new(NodeId::General, "calc"),
            PlanStep::new(NodeId::News, "news"),
        ];
        let workflow = standard_nodes(
            StateUpdate::goto(NodeId::General)
                .with_plan(plan)
                .with_instructions("calc"),
        )
        .build()
        .unwrap();

        let run = workflow
            .invoke(WorkflowState::new("q"), &ToolContext::default())
            .await
            .unwrap();

        assert_eq!(
            run.trace,
            vec![NodeId::Planner, NodeId::General, NodeId::News, NodeId::Summarizer]
        );
        assert_eq!(run.state.past_steps.len(), 2);
        assert_eq!(run.state.past_steps[0].step, "calc");
        assert_eq!(run.state.response.as_deref(), Some("summary"));
        assert_eq!(run.state.next, NodeId::End);
    }

    #[tokio::test]
    async fn test_step_budget_exceeded() {
        // Planner -> General -> Planner -> ... never ends.
        let looping = Workflow::builder()
            .node(FixedNode::new(NodeId::Planner, StateUpdate::goto(NodeId::General)))
            .node(FixedNode::new(NodeId::General, StateUpdate::goto(NodeId::Planner)))
            .node(FixedNode::new(NodeId::News, StateUpdate::goto(NodeId::Summarizer)))
            .node(FixedNode::new(NodeId::Summarizer, StateUpdate::goto(NodeId::End)))
            .max_steps(7)
            .build()
            .unwrap();

        let err = looping
            .invoke(WorkflowState::new("q"), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlansmithError::StepBudgetExceeded(7)));
    }

    #[tokio::test]
    async fn test_invalid_transition() {
        let workflow = standard_nodes(StateUpdate::default()).build().unwrap();
        // Planner leaves next unchanged: Planner -> Planner is not allowed.
        let err = workflow
            .invoke(WorkflowState::new("q"), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlansmithError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_direct_response_skips_workers() {
        let workflow = standard_nodes(StateUpdate::goto(NodeId::End).with_response("hello"))
            .build()
            .unwrap();
        let run = workflow
            .invoke(WorkflowState::new("hi"), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(run.steps(), 1);
        assert_eq!(run.state.response.as_deref(), Some("hello"));
    }

    #[test]
    fn test_build_requires_all_handlers() {
        let result = Workflow::builder()
            .node(FixedNode::new(NodeId::Planner, StateUpdate::goto(NodeId::End)))
            .build();
        assert!(matches!(result, Err(PlansmithError::MissingNode(_))));
    }
}
