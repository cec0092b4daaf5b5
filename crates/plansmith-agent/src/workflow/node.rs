use std::fmt;
use std::str::FromStr;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::types::ToolContext;

use super::state::{StateUpdate, WorkflowState};

/// A state in the plan-and-execute machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeId {
    Planner,
    General,
    News,
    Summarizer,
    End,
}

impl NodeId {
    /// Nodes that carry out plan steps.
    pub const WORKERS: [NodeId; 2] = [NodeId::General, NodeId::News];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "Planner",
            Self::General => "General",
            Self::News => "News",
            Self::Summarizer => "Summarizer",
            Self::End => "End",
        }
    }

    pub fn is_worker(&self) -> bool {
        Self::WORKERS.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeId {
    type Err = PlansmithError;

    /// Case-insensitive. "Calculator" names the General worker and "FINISH"
    /// the terminal state.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planner" => Ok(Self::Planner),
            "general" | "calculator" => Ok(Self::General),
            "news" => Ok(Self::News),
            "summarizer" => Ok(Self::Summarizer),
            "end" | "finish" | "__end__" => Ok(Self::End),
            _ => Err(PlansmithError::MissingNode(s.to_string())),
        }
    }
}

/// One executable state of the workflow.
pub trait WorkflowNode: Send + Sync + 'static {
    fn id(&self) -> NodeId;

    /// Read the shared state and return a partial update.
    fn run<'a>(
        &'a self,
        state: &'a WorkflowState,
        ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<StateUpdate>>;
}
