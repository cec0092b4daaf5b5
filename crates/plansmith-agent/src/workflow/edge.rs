use std::collections::{HashMap, HashSet};

use plansmith_core::error::{PlansmithError, Result};

use super::node::NodeId;

/// Allowed `from -> to` moves of the state machine.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    edges: HashMap<NodeId, HashSet<NodeId>>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plan-and-execute machine:
    ///
    /// - Planner goes to a worker, to Summarizer, or straight to End with a
    ///   direct answer.
    /// - A worker goes to the next step's worker, to Summarizer once the plan
    ///   is used up, or back to Planner when replanning.
    /// - Summarizer always ends.
    pub fn standard() -> Self {
        let mut table = Self::new();
        for worker in NodeId::WORKERS {
            table.allow(NodeId::Planner, worker);
            for next in NodeId::WORKERS {
                table.allow(worker, next);
            }
            table.allow(worker, NodeId::Summarizer);
            table.allow(worker, NodeId::Planner);
        }
        table.allow(NodeId::Planner, NodeId::Summarizer);
        table.allow(NodeId::Planner, NodeId::End);
        table.allow(NodeId::Summarizer, NodeId::End);
        table
    }

    pub fn allow(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        self.edges.entry(from).or_default().insert(to);
        self
    }

    pub fn allows(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    /// Error unless `from -> to` is allowed.
    pub fn check(&self, from: NodeId, to: NodeId) -> Result<()> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(PlansmithError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Every node that appears in the table, as source or target.
    pub fn nodes(&self) -> HashSet<NodeId> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| std::iter::once(*from).chain(targets.iter().copied()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_routes() {
        let table = TransitionTable::standard();
        assert!(table.allows(NodeId::Planner, NodeId::General));
        assert!(table.allows(NodeId::Planner, NodeId::End));
        assert!(table.allows(NodeId::News, NodeId::General));
        assert!(table.allows(NodeId::General, NodeId::Summarizer));
        assert!(table.allows(NodeId::Summarizer, NodeId::End));
    }

    #[test]
    fn test_disallowed_routes() {
        let table = TransitionTable::standard();
        assert!(!table.allows(NodeId::Summarizer, NodeId::Planner));
        assert!(!table.allows(NodeId::General, NodeId::End));
        assert!(!table.allows(NodeId::End, NodeId::Planner));

        let err = table.check(NodeId::Summarizer, NodeId::General).unwrap_err();
        assert!(matches!(err, PlansmithError::InvalidTransition { .. }));
    }

    #[test]
    fn test_nodes_cover_machine() {
        let nodes = TransitionTable::standard().nodes();
        assert_eq!(nodes.len(), 5);
    }
}
