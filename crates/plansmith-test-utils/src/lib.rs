//! Test doubles shared across plansmith crates.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use plansmith_core::config::{AppConfig, FileConfig, ModelConfig};
use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::traits::{LlmClient, Tool};
use plansmith_core::types::*;

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Plain text answer.
    Text(String),
    /// One or more tool calls, as `(name, input)`.
    ToolCalls(Vec<(String, serde_json::Value)>),
    /// The request fails before any delta is streamed.
    Error(String),
}

impl ScriptedTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn tool(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self::ToolCalls(vec![(name.into(), input)])
    }

    /// A forced `plan` call with `(agent, instructions)` steps.
    pub fn plan(steps: &[(&str, &str)]) -> Self {
        let plan: Vec<serde_json::Value> = steps
            .iter()
            .map(|(agent, instructions)| {
                serde_json::json!({ "agent": agent, "instructions": instructions })
            })
            .collect();
        Self::tool("plan", serde_json::json!({ "plan": plan }))
    }

    /// A forced `plan` call with no steps and a direct response.
    pub fn direct_response(response: impl Into<String>) -> Self {
        Self::tool(
            "plan",
            serde_json::json!({ "plan": [], "response": response.into() }),
        )
    }

    fn into_deltas(self) -> Result<Vec<StreamDelta>> {
        match self {
            Self::Text(text) => Ok(vec![
                StreamDelta::TextDelta(text),
                StreamDelta::Stop(StopReason::EndTurn),
            ]),
            Self::ToolCalls(calls) => {
                let mut deltas = Vec::new();
                for (index, (name, input)) in calls.into_iter().enumerate() {
                    deltas.push(StreamDelta::ToolUseStart {
                        index,
                        id: format!("call_{index}"),
                        name,
                    });
                    deltas.push(StreamDelta::ToolInputDelta {
                        index,
                        delta: input.to_string(),
                    });
                }
                deltas.push(StreamDelta::Stop(StopReason::ToolUse));
                Ok(deltas)
            }
            Self::Error(message) => Err(PlansmithError::LlmRequest(message)),
        }
    }
}

/// Mock `LlmClient` that replays scripted turns in order and records every
/// request it receives. Fails once the script is exhausted.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    script: Arc<Mutex<VecDeque<ScriptedTurn>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedLlm {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            script: Arc::new(Mutex::new(turns.into_iter().collect())),
            requests: Arc::default(),
        }
    }

    /// Append another turn to the script.
    pub fn push(&self, turn: ScriptedTurn) {
        self.script.lock().unwrap().push_back(turn);
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        request: ChatRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();

        Box::pin(async move {
            let turn = next.ok_or_else(|| PlansmithError::LlmRequest("script exhausted".into()))?;
            let deltas = turn.into_deltas()?;
            Ok(Box::pin(futures::stream::iter(deltas.into_iter().map(Ok))) as BoxStream<'_, _>)
        })
    }
}

/// A tool returning fixed output and recording its inputs.
#[derive(Clone)]
pub struct StaticTool {
    name: String,
    output: String,
    calls: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl StaticTool {
    pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<serde_json::Value> {
        self.calls.lock().unwrap().clone()
    }
}

impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Returns a fixed string"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        self.calls.lock().unwrap().push(input);
        let output = self.output.clone();
        Box::pin(async move { Ok(ToolResult::success(output)) })
    }
}

/// Config resolved from an OpenAI key only, with no file.
pub fn test_config() -> AppConfig {
    test_config_with(&[])
}

/// Like [`test_config`] with extra variables layered on top.
pub fn test_config_with(vars: &[(&str, &str)]) -> AppConfig {
    let mut map: HashMap<String, String> = HashMap::new();
    map.insert("OPENAI_API_KEY".into(), "sk-test".into());
    for (k, v) in vars {
        map.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(move |k| map.get(k).cloned(), FileConfig::default())
        .expect("test config must resolve")
}
