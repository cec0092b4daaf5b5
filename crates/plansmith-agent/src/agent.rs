use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use plansmith_core::config::ModelConfig;
use plansmith_core::error::{PlansmithError, Result};
use plansmith_core::traits::LlmClient;
use plansmith_core::types::*;
use plansmith_llm::complete;
use plansmith_tools::ToolRegistry;

pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// A named LLM pipeline that turns a conversation into a text answer.
pub trait Agent: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn invoke<'a>(
        &'a self,
        messages: Vec<ChatMessage>,
        ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<String>>;
}

/// Everything needed to build an agent.
#[derive(Clone)]
pub struct AgentSpec {
    pub name: String,
    pub system_prompt: String,
    pub tools: ToolRegistry,
    pub max_iterations: usize,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            tools: ToolRegistry::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Build an agent: a single prompt-to-LLM call when `spec` has no tools,
/// otherwise a tool-calling loop.
pub fn create_agent(llm: Arc<dyn LlmClient>, model: ModelConfig, spec: AgentSpec) -> Arc<dyn Agent> {
    if spec.tools.is_empty() {
        Arc::new(PromptAgent {
            name: spec.name,
            system_prompt: spec.system_prompt,
            llm,
            model,
        })
    } else {
        Arc::new(ToolCallingAgent {
            name: spec.name,
            system_prompt: spec.system_prompt,
            llm,
            model,
            tools: spec.tools,
            max_iterations: spec.max_iterations.max(1),
        })
    }
}

/// System prompt followed by the conversation, one LLM call.
pub struct PromptAgent {
    name: String,
    system_prompt: String,
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
}

impl Agent for PromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(
        &'a self,
        messages: Vec<ChatMessage>,
        _ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let mut conversation = vec![ChatMessage::system(self.system_prompt.clone())];
            conversation.extend(messages);

            let turn = complete(self.llm.as_ref(), &self.model, ChatRequest::new(conversation)).await?;
            debug!(agent = %self.name, output_tokens = turn.output_tokens, "Prompt agent answered");
            Ok(turn.text)
        })
    }
}

/// ReAct loop: call the model, run requested tools, feed results back, until
/// the model answers without tool calls or the iteration budget runs out.
pub struct ToolCallingAgent {
    name: String,
    system_prompt: String,
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    tools: ToolRegistry,
    max_iterations: usize,
}

impl ToolCallingAgent {
    async fn run(&self, messages: Vec<ChatMessage>, ctx: &ToolContext) -> Result<String> {
        let start = Instant::now();
        let tool_defs = self.tools.definitions();

        let mut conversation = vec![ChatMessage::system(self.system_prompt.clone())];
        conversation.extend(messages);

        let mut total_input_tokens = 0u64;
        let mut total_output_tokens = 0u64;

        for iteration in 0..self.max_iterations {
            debug!(agent = %self.name, iteration, "Starting agent turn");

            let request = ChatRequest::new(conversation.clone()).with_tools(tool_defs.clone());
            let turn = complete(self.llm.as_ref(), &self.model, request).await?;
            total_input_tokens += turn.input_tokens;
            total_output_tokens += turn.output_tokens;

            if turn.tool_calls.is_empty() {
                if turn.stop_reason == Some(StopReason::MaxTokens) {
                    warn!(agent = %self.name, "LLM hit max tokens");
                }
                info!(
                    agent = %self.name,
                    turns = iteration + 1,
                    input_tokens = total_input_tokens,
                    output_tokens = total_output_tokens,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Agent run complete"
                );
                return Ok(turn.text);
            }

            conversation.push(turn.to_message());

            let mut results = Vec::with_capacity(turn.tool_calls.len());
            for call in &turn.tool_calls {
                let result = match self
                    .tools
                    .execute(&call.name, call.input.clone(), ctx.clone())
                    .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(agent = %self.name, tool = %call.name, error = %e, "Tool failed");
                        ToolResult::error(e.to_string())
                    }
                };
                debug!(
                    agent = %self.name,
                    tool = %call.name,
                    is_error = result.is_error,
                    "Tool finished"
                );
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: result.content,
                    is_error: result.is_error,
                });
            }

            conversation.push(ChatMessage {
                role: Role::User,
                content: results,
                timestamp: Some(chrono::Utc::now()),
            });
        }

        Err(PlansmithError::MaxIterationsExceeded(self.max_iterations))
    }
}

impl Agent for ToolCallingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(
        &'a self,
        messages: Vec<ChatMessage>,
        ctx: &'a ToolContext,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.run(messages, ctx))
    }
}
