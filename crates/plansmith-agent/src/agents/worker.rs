use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use plansmith_core::error::Result;
use plansmith_core::types::{ChatMessage, ToolContext};

use crate::agent::Agent;
use crate::workflow::{NodeId, StateUpdate, WorkflowNode, WorkflowState};

/// Runs the current plan step on its agent and advances the plan.
pub struct WorkerNode {
    id: NodeId,
    agent: Arc<dyn Agent>,
    replan: bool,
}

impl WorkerNode {
    pub fn new(id: NodeId, agent: Arc<dyn Agent>) -> Self {
        Self {
            id,
            agent,
            replan: false,
        }
    }

    /// Route back to the Planner after each step while steps remain.
    pub fn with_replan(mut self, replan: bool) -> Self {
        self.replan = replan;
        self
    }
}

impl WorkflowNode for WorkerNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn run<'a>(
        &'a self,
        state: &'a WorkflowState,
        ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<StateUpdate>> {
        Box::pin(async move {
            let result = self
                .agent
                .invoke(vec![ChatMessage::user(state.instructions.clone())], ctx)
                .await?;

            let remaining = state.plan.get(1..).unwrap_or_default().to_vec();
            let update = match remaining.first() {
                Some(_) if self.replan => StateUpdate::goto(NodeId::Planner),
                Some(step) => {
                    StateUpdate::goto(step.agent).with_instructions(step.instructions.clone())
                }
                None => StateUpdate::goto(NodeId::Summarizer),
            };

            debug!(
                agent = %self.agent.name(),
                remaining = remaining.len(),
                result_len = result.len(),
                "Plan step done"
            );

            Ok(update
                .with_plan(remaining)
                .with_past_step(state.instructions.clone(), result))
        })
    }
}
