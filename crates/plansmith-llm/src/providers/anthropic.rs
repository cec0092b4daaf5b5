use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use plansmith_core::config::ModelConfig;
use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::traits::LlmClient;
use plansmith_core::types::*;

use crate::streaming::{SseEvent, SseStream};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: Client,
}

impl AnthropicClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

// Anthropic API request types
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

impl AnthropicRequest {
    fn build(config: &ModelConfig, request: ChatRequest) -> Self {
        let (system, messages) = convert_messages(request.messages);
        let tool_choice = match (&request.tool_choice, request.tools.is_empty()) {
            (ToolChoice::Tool(name), false) => Some(serde_json::json!({
                "type": "tool",
                "name": name,
            })),
            _ => None,
        };

        Self {
            model: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            messages,
            system,
            stream: true,
            tools: request
                .tools
                .iter()
                .map(|t| ApiTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.input_schema.clone(),
                })
                .collect(),
            tool_choice,
        }
    }
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// Anthropic API response types
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum SseData {
    #[serde(rename = "message_start")]
    MessageStart { message: MessageInfo },
    #[serde(rename = "content_block_start")]
    ContentBlockStart { index: usize, content_block: ContentBlockInfo },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: usize, delta: DeltaInfo },
    #[serde(rename = "message_delta")]
    MessageDelta { delta: MessageDeltaInfo, usage: Option<UsageInfo> },
    #[serde(rename = "error")]
    Error { error: ApiError },
    #[serde(other)]
    Ignored,
}

#[derive(Deserialize, Debug)]
struct MessageInfo {
    id: String,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct UsageInfo {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum ContentBlockInfo {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum DeltaInfo {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct MessageDeltaInfo {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

/// Split out the system prompt; Anthropic takes it as a top-level field.
/// Multiple system messages are joined.
fn convert_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<ApiMessage>) {
    let mut system: Vec<String> = Vec::new();
    let mut api_msgs = Vec::new();

    for msg in messages {
        let role = match msg.role {
            Role::System => {
                system.push(msg.text());
                continue;
            }
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        api_msgs.push(ApiMessage {
            role: role.to_string(),
            content: convert_content_blocks(&msg.content),
        });
    }

    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, api_msgs)
}

fn convert_content_blocks(blocks: &[ContentBlock]) -> serde_json::Value {
    if let [ContentBlock::Text { text }] = blocks {
        return serde_json::Value::String(text.clone());
    }

    let api_blocks: Vec<serde_json::Value> = blocks
        .iter()
        .map(|b| match b {
            ContentBlock::Text { text } => serde_json::json!({
                "type": "text",
                "text": text,
            }),
            ContentBlock::ToolUse { id, name, input } => serde_json::json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": input,
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => serde_json::json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            }),
        })
        .collect();

    serde_json::Value::Array(api_blocks)
}

fn parse_sse_to_deltas(event: SseEvent) -> Vec<Result<StreamDelta>> {
    let data: SseData = match serde_json::from_str(&event.data) {
        Ok(d) => d,
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse SSE data");
            return vec![];
        }
    };

    match data {
        SseData::MessageStart { message } => {
            let mut deltas = vec![Ok(StreamDelta::MessageId(message.id))];
            if let Some(usage) = message.usage {
                deltas.push(Ok(StreamDelta::Usage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                }));
            }
            deltas
        }
        SseData::ContentBlockStart {
            index,
            content_block: ContentBlockInfo::ToolUse { id, name },
        } => vec![Ok(StreamDelta::ToolUseStart { index, id, name })],
        SseData::ContentBlockStart { .. } => vec![],
        SseData::ContentBlockDelta { index, delta } => match delta {
            DeltaInfo::TextDelta { text } => vec![Ok(StreamDelta::TextDelta(text))],
            DeltaInfo::InputJsonDelta { partial_json } => vec![Ok(StreamDelta::ToolInputDelta {
                index,
                delta: partial_json,
            })],
            DeltaInfo::Other => vec![],
        },
        SseData::MessageDelta { delta, usage } => {
            let mut deltas = Vec::new();
            if let Some(usage) = usage {
                deltas.push(Ok(StreamDelta::Usage {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                }));
            }
            let stop = match delta.stop_reason.as_deref() {
                Some("end_turn") => Some(StopReason::EndTurn),
                Some("tool_use") => Some(StopReason::ToolUse),
                Some("max_tokens") => Some(StopReason::MaxTokens),
                Some("stop_sequence") => Some(StopReason::StopSequence),
                _ => None,
            };
            if let Some(stop) = stop {
                deltas.push(Ok(StreamDelta::Stop(stop)));
            }
            deltas
        }
        SseData::Error { error } => vec![Err(PlansmithError::LlmStream(error.message))],
        SseData::Ignored => vec![],
    }
}

impl LlmClient for AnthropicClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        request: ChatRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();

        Box::pin(async move {
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| PlansmithError::Config("Anthropic API key not set".into()))?;

            let url = config.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL);
            let body = AnthropicRequest::build(&config, request);

            let mut req = self
                .http
                .post(url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body);

            for (k, v) in &config.extra_headers {
                req = req.header(k.as_str(), v.as_str());
            }

            let response = req
                .send()
                .await
                .map_err(|e| PlansmithError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(PlansmithError::LlmRequest(format!(
                    "HTTP {}: {}",
                    status, body
                )));
            }

            let delta_stream = SseStream::new(response.bytes_stream())
                .map(|event| futures::stream::iter(parse_sse_to_deltas(event)))
                .flatten();

            Ok(Box::pin(delta_stream) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}
