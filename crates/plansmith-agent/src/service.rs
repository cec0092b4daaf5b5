use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};

use plansmith_core::config::AppConfig;
use plansmith_core::error::Result;
use plansmith_core::traits::LlmClient;
use plansmith_core::types::{ThreadId, ToolContext};
use plansmith_tools::ToolRegistry;

use crate::agents::{general_agent, news_agent, summarizer_agent, SummarizerNode, WorkerNode};
use crate::planner::PlannerNode;
use crate::workflow::{Exchange, NodeId, ThreadStore, Workflow, WorkflowRun, WorkflowState};

/// Returned instead of an answer when the workflow fails.
pub const FALLBACK_RESPONSE: &str =
    "Sorry, I wasn't able to answer that right now. Please try again later.";

/// Returned for blank input without running the workflow.
pub const EMPTY_INPUT_RESPONSE: &str = "Please ask me a question.";

/// Threads keep at most this many exchanges.
const MAX_EXCHANGES_PER_THREAD: usize = 100;

/// Compile the standard workflow: Planner, General, News and Summarizer.
pub fn build_workflow(
    llm: Arc<dyn LlmClient>,
    config: &AppConfig,
    tools: &ToolRegistry,
) -> Result<Workflow> {
    let model = &config.model;
    let iterations = config.workflow.max_agent_iterations;
    let replan = config.workflow.replan;

    let general = general_agent(llm.clone(), model.clone(), tools, iterations);
    let news = news_agent(llm.clone(), model.clone(), tools, iterations);
    let summarizer = summarizer_agent(llm.clone(), model.clone(), tools, iterations);

    Workflow::builder()
        .node(Arc::new(PlannerNode::new(llm, model.clone())))
        .node(Arc::new(WorkerNode::new(NodeId::General, general).with_replan(replan)))
        .node(Arc::new(WorkerNode::new(NodeId::News, news).with_replan(replan)))
        .node(Arc::new(SummarizerNode::new(summarizer)))
        .max_steps(config.workflow.max_steps)
        .build()
}

/// Runs one user query through the workflow and records thread history.
pub struct QueryService {
    workflow: Workflow,
    threads: ThreadStore,
    history_limit: usize,
}

impl QueryService {
    pub fn new(workflow: Workflow, history_limit: usize) -> Self {
        Self {
            workflow,
            threads: ThreadStore::new().with_capacity_per_thread(MAX_EXCHANGES_PER_THREAD),
            history_limit,
        }
    }

    /// Bound the number of threads kept in memory.
    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.threads = self.threads.with_max_threads(max);
        self
    }

    /// Build the workflow with the built-in tools.
    pub fn from_config(llm: Arc<dyn LlmClient>, config: &AppConfig) -> Result<Self> {
        let tools = ToolRegistry::with_builtins(&config.news);
        let workflow = build_workflow(llm, config, &tools)?;
        Ok(Self::new(workflow, config.workflow.history_limit)
            .with_max_threads(config.workflow.max_threads))
    }

    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    /// Run the workflow, propagating any failure.
    pub async fn run(&self, input: &str, thread: &ThreadId) -> Result<WorkflowRun> {
        let history = self.threads.recent(thread, self.history_limit);
        let state = WorkflowState::new(input).with_history(history);
        let ctx = ToolContext {
            thread_id: thread.clone(),
        };

        let run = self.workflow.invoke(state, &ctx).await?;

        // Only answered exchanges are replayed to the planner later.
        match run.state.response.as_deref().map(str::trim) {
            Some(response) if !response.is_empty() => self.threads.append(
                thread,
                Exchange {
                    input: input.to_string(),
                    response: response.to_string(),
                },
            ),
            _ => warn!(thread = %thread, "Workflow ended without a response"),
        }
        Ok(run)
    }

    /// Answer `input`. Never fails: errors become [`FALLBACK_RESPONSE`].
    pub async fn query_text(&self, input: &str, thread_id: Option<&str>) -> String {
        let input = input.trim();
        if input.is_empty() {
            return EMPTY_INPUT_RESPONSE.to_string();
        }

        let thread = ThreadId::or_default(thread_id);
        let span = info_span!(
            "query",
            request_id = %uuid::Uuid::new_v4(),
            thread = %thread,
        );

        async {
            match self.run(input, &thread).await {
                Ok(run) => {
                    info!(steps = run.steps(), elapsed_ms = run.elapsed_ms, "Query answered");
                    run.state.response.unwrap_or_else(|| FALLBACK_RESPONSE.to_string())
                }
                Err(e) => {
                    error!(error = %e, "Workflow failed");
                    FALLBACK_RESPONSE.to_string()
                }
            }
        }
        .instrument(span)
        .await
    }
}
