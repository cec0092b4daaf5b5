pub mod agent;
pub mod agents;
pub mod planner;
pub mod service;
pub mod workflow;

pub use agent::{create_agent, Agent, AgentSpec, PromptAgent, ToolCallingAgent};
pub use planner::PlannerNode;
pub use service::{build_workflow, QueryService, EMPTY_INPUT_RESPONSE, FALLBACK_RESPONSE};
pub use workflow::{
    NodeId, PlanStep, StateUpdate, ThreadStore, TransitionTable, Workflow, WorkflowNode,
    WorkflowRun, WorkflowState,
};
