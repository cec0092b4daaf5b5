//! Plan-and-execute state machine.
//!
//! A [`Workflow`] maps each [`NodeId`] to a [`WorkflowNode`] handler and walks
//! from the Planner to `End`, merging every node's [`StateUpdate`] into the
//! shared [`WorkflowState`]. Routing follows `state.next` and is checked
//! against a static [`TransitionTable`].

pub mod edge;
pub mod executor;
pub mod node;
pub mod state;
pub mod threads;

pub use edge::TransitionTable;
pub use executor::{Workflow, WorkflowBuilder, WorkflowRun, DEFAULT_MAX_STEPS};
pub use node::{NodeId, WorkflowNode};
pub use state::{Exchange, PastStep, PlanStep, StateUpdate, WorkflowState, DEFAULT_INSTRUCTIONS};
pub use threads::ThreadStore;
