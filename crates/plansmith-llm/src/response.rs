use futures::StreamExt;
use tracing::{debug, warn};

use plansmith_core::config::ModelConfig;
use plansmith_core::error::Result;
use plansmith_core::traits::LlmClient;
use plansmith_core::types::*;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// One fully accumulated assistant turn.
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<StopReason>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl AssistantTurn {
    /// The turn as a history message, so tool results can follow it.
    pub fn to_message(&self) -> ChatMessage {
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentBlock::Text {
                text: self.text.clone(),
            });
        }
        for tc in &self.tool_calls {
            content.push(ContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.name.clone(),
                input: tc.input.clone(),
            });
        }
        ChatMessage {
            role: Role::Assistant,
            content,
            timestamp: Some(chrono::Utc::now()),
        }
    }
}

#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

/// Send `request` and drain the delta stream into a single turn.
pub async fn complete(
    llm: &dyn LlmClient,
    config: &ModelConfig,
    request: ChatRequest,
) -> Result<AssistantTurn> {
    let mut stream = llm.chat_stream(config, request).await?;

    let mut turn = AssistantTurn::default();
    let mut tool_calls: Vec<ToolCallAccumulator> = Vec::new();

    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::TextDelta(text) => turn.text.push_str(&text),
            StreamDelta::ToolUseStart { index, id, name } => {
                while tool_calls.len() <= index {
                    tool_calls.push(ToolCallAccumulator::default());
                }
                tool_calls[index].id = id;
                tool_calls[index].name = name;
            }
            StreamDelta::ToolInputDelta { index, delta } => {
                if let Some(tc) = tool_calls.get_mut(index) {
                    tc.input_json.push_str(&delta);
                }
            }
            StreamDelta::Stop(reason) => turn.stop_reason = Some(reason),
            StreamDelta::Usage {
                input_tokens,
                output_tokens,
            } => {
                turn.input_tokens += input_tokens;
                turn.output_tokens += output_tokens;
            }
            StreamDelta::MessageId(_) => {}
        }
    }

    turn.tool_calls = tool_calls
        .into_iter()
        .enumerate()
        // Anthropic indexes tool blocks after text blocks, leaving gaps.
        .filter(|(_, tc)| !tc.name.is_empty())
        .map(|(i, tc)| ToolCall {
            id: if tc.id.is_empty() {
                format!("call_{i}")
            } else {
                tc.id
            },
            input: parse_tool_input(&tc.name, &tc.input_json),
            name: tc.name,
        })
        .collect();

    debug!(
        text_len = turn.text.len(),
        tool_calls = turn.tool_calls.len(),
        input_tokens = turn.input_tokens,
        output_tokens = turn.output_tokens,
        "LLM turn complete"
    );

    Ok(turn)
}

fn parse_tool_input(name: &str, raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(tool = %name, error = %e, "Tool input is not valid JSON");
            serde_json::Value::String(raw.to_string())
        }
    }
}
