use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use plansmith_core::config::NewsConfig;
use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::traits::Tool;
use plansmith_core::types::{ToolContext, ToolDefinition, ToolResult};

use crate::builtin::calculator::CalculatorTool;
use crate::builtin::news::NewsTool;

/// Registry of available tools.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.
    pub fn register(&mut self, tool: impl Tool) {
        self.register_arc(Arc::new(tool));
    }

    /// Register an already shared tool.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Names of all registered tools, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A registry holding only the named tools. Unknown names are skipped.
    pub fn subset(&self, names: &[&str]) -> Self {
        let mut registry = Self::new();
        for name in names {
            if let Some(tool) = self.get(name) {
                registry.register_arc(tool);
            }
        }
        registry
    }

    /// Get tool definitions for sending to the LLM, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| PlansmithError::ToolNotFound(name.to_string()))?;

        debug!(tool = %name, thread = %ctx.thread_id, "Executing tool");
        let timeout = std::time::Duration::from_secs(tool.timeout_secs());

        match tokio::time::timeout(timeout, tool.execute(input, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(PlansmithError::ToolTimeout {
                tool: name.to_string(),
                timeout_secs: tool.timeout_secs(),
            }),
        }
    }

    /// Create a registry with all built-in tools registered.
    pub fn with_builtins(news: &NewsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(CalculatorTool);
        registry.register(NewsTool::new(news.clone()));
        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;

    struct SlowTool;

    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Never finishes in time"
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }

        fn execute(
            &self,
            _input: serde_json::Value,
            _ctx: ToolContext,
        ) -> BoxFuture<'_, Result<ToolResult>> {
            Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(ToolResult::success("late"))
            })
        }

        fn timeout_secs(&self) -> u64 {
            1
        }
    }

    #[test]
    fn test_builtins_and_subset() {
        let registry = ToolRegistry::with_builtins(&NewsConfig::default());
        assert_eq!(registry.list(), vec!["calculator", "news"]);

        let calc_only = registry.subset(&["calculator", "missing"]);
        assert_eq!(calc_only.len(), 1);
        assert_eq!(calc_only.definitions()[0].name, "calculator");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("nope", serde_json::json!({}), ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlansmithError::ToolNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let err = registry
            .execute("slow", serde_json::json!({}), ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlansmithError::ToolTimeout { timeout_secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_execute_calculator() {
        let registry = ToolRegistry::with_builtins(&NewsConfig::default());
        let result = registry
            .execute(
                "calculator",
                serde_json::json!({"expression": "2 + 3 * 4"}),
                ToolContext::default(),
            )
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, "14");
    }
}
