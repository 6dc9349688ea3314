//! Sequential pipeline runner
//!
//! Runs the four tasks strictly in order through an explicit state machine:
//!
//! ```text
//! Verifying -> Researching -> DealFinding -> Reporting -> Done
//!     \            \              \             \
//!      +------------+--------------+-------------+--> Failed
//! ```
//!
//! Each stage is one LLM conversation with a bounded tool-calling loop. The
//! first error of any stage aborts the run; no partial report is produced.

use super::task::{Task, TaskKind};
use crate::config::ShopperConfig;
use crate::error::{sanitize_error_message, ShopperError, ShopperResult};
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider, Message};
use crate::observability::metrics::metrics;
use crate::tools::{ToolBox, ToolSet};
use crate::{run_span, stage_span, tool_span};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

const OUTPUT_PREVIEW_LEN: usize = 200;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Verifying,
    Researching,
    DealFinding,
    Reporting,
    Done,
    Failed,
}

impl PipelineState {
    /// Working state for the stage running `kind`
    pub fn for_stage(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Verify => PipelineState::Verifying,
            TaskKind::Research => PipelineState::Researching,
            TaskKind::FindDeals => PipelineState::DealFinding,
            TaskKind::Report => PipelineState::Reporting,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// LLM request parameters shared by every stage
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_tool_iterations: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &ShopperConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            max_tool_iterations: config.pipeline.max_tool_iterations,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&ShopperConfig::default())
    }
}

/// Result of one completed stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutput {
    pub kind: TaskKind,
    pub output: String,
    /// LLM round trips made by the stage
    pub llm_iterations: usize,
    pub tool_calls: usize,
}

/// Every stage output of a successful run, in execution order
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub stages: Vec<StageOutput>,
    pub duration_ms: u64,
}

impl RunReport {
    /// The report stage's text, which is what the user sees
    pub fn final_output(&self) -> &str {
        self.stages
            .last()
            .map(|stage| stage.output.as_str())
            .unwrap_or_default()
    }

    pub fn stage(&self, kind: TaskKind) -> Option<&StageOutput> {
        self.stages.iter().find(|stage| stage.kind == kind)
    }
}

/// One run of the shopping pipeline; built fresh per request
pub struct PipelineRunner {
    run_id: Uuid,
    llm: Arc<dyn LlmProvider>,
    tools: ToolSet,
    tasks: Vec<Task>,
    settings: PipelineSettings,
    state: PipelineState,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("run_id", &self.run_id)
            .field("llm", &self.llm.name())
            .field("tasks", &self.tasks.len())
            .field("state", &self.state)
            .finish()
    }
}

impl PipelineRunner {
    /// Create a runner; tasks must appear in pipeline order, each at most once
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: ToolSet,
        tasks: Vec<Task>,
        settings: PipelineSettings,
    ) -> ShopperResult<Self> {
        Self::validate_task_order(&tasks)?;

        Ok(Self {
            run_id: Uuid::new_v4(),
            llm,
            tools,
            tasks,
            settings,
            state: PipelineState::Pending,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Reject empty, out-of-order or repeated task lists (pure validation)
    fn validate_task_order(tasks: &[Task]) -> ShopperResult<()> {
        if tasks.is_empty() {
            return Err(ShopperError::internal_error("Pipeline has no tasks"));
        }
        let in_order = tasks.windows(2).all(|pair| pair[0].kind < pair[1].kind);
        if !in_order {
            return Err(ShopperError::internal_error(
                "Pipeline tasks must be in verify, research, find_deals, report order",
            ));
        }
        Ok(())
    }

    /// Run every stage in order and return their outputs
    ///
    /// A runner runs once; calling this again after a terminal state is an error.
    pub async fn run(&mut self) -> ShopperResult<RunReport> {
        if self.state != PipelineState::Pending {
            return Err(ShopperError::internal_error(format!(
                "Pipeline run {} already in state {:?}",
                self.run_id, self.state
            )));
        }

        let span = run_span!(run_id = %self.run_id);
        let started = Instant::now();
        metrics().run_started();

        let result = self.run_stages().instrument(span).await;
        let elapsed = started.elapsed();

        match result {
            Ok(stages) => {
                self.state = PipelineState::Done;
                metrics().run_completed(elapsed);
                info!(
                    run_id = %self.run_id,
                    duration_ms = elapsed.as_millis() as u64,
                    "Pipeline run completed"
                );
                Ok(RunReport {
                    run_id: self.run_id,
                    stages,
                    duration_ms: elapsed.as_millis() as u64,
                })
            }
            Err(e) => {
                let failed_in = self.state;
                self.state = PipelineState::Failed;
                metrics().run_failed(elapsed);
                error!(
                    run_id = %self.run_id,
                    state = ?failed_in,
                    error = %sanitize_error_message(&e.to_string()),
                    "Pipeline run failed"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self) -> ShopperResult<Vec<StageOutput>> {
        let mut completed: Vec<StageOutput> = Vec::with_capacity(self.tasks.len());

        for index in 0..self.tasks.len() {
            let task = self.tasks[index].clone();
            self.state = PipelineState::for_stage(task.kind);

            let context = Self::collect_context(&task, &completed)?;
            let prompt = task.effective_prompt(&context);

            let span = stage_span!(stage = %task.kind, role = %task.agent.role);
            let stage = self.execute_stage(&task, prompt).instrument(span).await?;

            metrics().stage_completed(task.kind.as_str());
            Self::log_stage_output(&task, &stage);
            completed.push(stage);
        }

        Ok(completed)
    }

    /// Outputs of the task's context entries, in context order (pure function)
    fn collect_context<'a>(
        task: &Task,
        completed: &'a [StageOutput],
    ) -> ShopperResult<Vec<(TaskKind, &'a str)>> {
        task.context
            .iter()
            .map(|kind| {
                completed
                    .iter()
                    .find(|stage| stage.kind == *kind)
                    .map(|stage| (*kind, stage.output.as_str()))
                    .ok_or_else(|| {
                        ShopperError::internal_error(format!(
                            "Task '{}' depends on '{}' which has not completed",
                            task.kind, kind
                        ))
                    })
            })
            .collect()
    }

    fn log_stage_output(task: &Task, stage: &StageOutput) {
        if task.agent.verbose {
            info!(
                stage = %stage.kind,
                llm_iterations = stage.llm_iterations,
                tool_calls = stage.tool_calls,
                output = %preview(&stage.output, OUTPUT_PREVIEW_LEN),
                "Stage completed"
            );
        } else {
            debug!(
                stage = %stage.kind,
                llm_iterations = stage.llm_iterations,
                tool_calls = stage.tool_calls,
                output = %stage.output,
                "Stage completed"
            );
        }
    }

    /// One stage: LLM conversation with a bounded tool loop
    async fn execute_stage(&self, task: &Task, prompt: String) -> ShopperResult<StageOutput> {
        let toolbox = self.tools.toolbox_for(&task.agent.tools)?;
        let mut messages = vec![
            Message::system(task.agent.system_prompt(Utc::now())),
            Message::user(prompt),
        ];

        let max_iterations = self.settings.max_tool_iterations;
        let mut tool_call_count = 0;
        let mut iteration = 0;

        loop {
            iteration += 1;

            let request = self.create_completion_request(messages.clone(), &toolbox);
            let response = self.llm.complete(request).await?;
            metrics().llm_request_completed(
                response.usage.prompt_tokens,
                response.usage.completion_tokens,
            );

            if !response.has_tool_calls() {
                return Ok(StageOutput {
                    kind: task.kind,
                    output: Self::extract_final_content(&response),
                    llm_iterations: iteration,
                    tool_calls: tool_call_count,
                });
            }

            Self::check_iteration_limit(task.kind, iteration, max_iterations)?;

            let tool_calls = response.tool_calls.as_deref().unwrap_or_default();
            debug!(
                stage = %task.kind,
                iteration,
                tool_count = tool_calls.len(),
                "Processing tool calls"
            );

            Self::add_assistant_response(&mut messages, &response);
            let mut results = Vec::with_capacity(tool_calls.len());
            for call in tool_calls {
                results.push(
                    self.execute_tool_call(task, &toolbox, &call.name, &call.arguments)
                        .await?,
                );
                tool_call_count += 1;
            }
            Self::add_tool_results(&mut messages, &results);
        }
    }

    fn create_completion_request(&self, messages: Vec<Message>, toolbox: &ToolBox) -> CompletionRequest {
        CompletionRequest {
            messages,
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tools: if toolbox.is_empty() {
                None
            } else {
                Some(toolbox.descriptions())
            },
        }
    }

    /// Run one requested tool and render its result for the conversation
    ///
    /// Parameter validation failures are fed back so the model can correct
    /// itself; every other tool failure aborts the stage.
    async fn execute_tool_call(
        &self,
        task: &Task,
        toolbox: &ToolBox,
        tool_name: &str,
        arguments: &serde_json::Value,
    ) -> ShopperResult<String> {
        if !toolbox.contains(tool_name) {
            return Err(ShopperError::tool_not_permitted(
                tool_name,
                task.agent.role.clone(),
            ));
        }

        let span = tool_span!(tool = tool_name, stage = %task.kind);
        match toolbox
            .execute_tool(tool_name, arguments)
            .instrument(span)
            .await
        {
            Ok(result) => Ok(format!("Tool {tool_name} result: {result}")),
            Err(e) if e.is_recoverable() => {
                warn!(tool = tool_name, error = %e, "Tool call rejected; returning error to model");
                Ok(format!("Tool {tool_name} failed: {e}"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fail when the model still wants tools on its last permitted round trip (pure validation)
    fn check_iteration_limit(
        stage: TaskKind,
        iteration: usize,
        max_iterations: usize,
    ) -> ShopperResult<()> {
        if iteration >= max_iterations {
            return Err(ShopperError::tool_iterations_exceeded(
                stage.as_str(),
                max_iterations,
            ));
        }
        Ok(())
    }

    /// Record the assistant turn that requested tools (pure function)
    fn add_assistant_response(messages: &mut Vec<Message>, response: &CompletionResponse) {
        let content = match (&response.content, &response.tool_calls) {
            (Some(content), _) if !content.trim().is_empty() => content.clone(),
            (_, Some(calls)) => {
                let requested: Vec<String> = calls
                    .iter()
                    .map(|call| format!("{}({})", call.name, call.arguments))
                    .collect();
                format!("Calling tools: {}", requested.join(", "))
            }
            _ => return,
        };
        messages.push(Message::assistant(content));
    }

    /// Add tool results to messages (pure function)
    fn add_tool_results(messages: &mut Vec<Message>, tool_results: &[String]) {
        if !tool_results.is_empty() {
            messages.push(Message::user(format!(
                "Tool results:\n{}",
                tool_results.join("\n")
            )));
        }
    }

    /// Final stage text; a missing body is accepted as empty (pure function)
    fn extract_final_content(response: &CompletionResponse) -> String {
        response.content.clone().unwrap_or_default()
    }
}

/// First `max_len` bytes of `text` on a char boundary, for log lines
fn preview(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::agent::Agent;
    use crate::llm::provider::{FinishReason, TokenUsage, ToolCall};
    use crate::testing::mocks::{MockLlmProvider, MockTool};
    use crate::tools::ToolKind;
    use serde_json::json;

    fn task(kind: TaskKind, context: Vec<TaskKind>, tools: &[ToolKind]) -> Task {
        Task {
            kind,
            description: format!("Do the {kind} step"),
            agent: Agent::new(format!("{kind} agent"), "goal", "backstory").with_tools(tools),
            context,
            expected_output: "An answer".to_string(),
        }
    }

    fn response_with_calls(calls: Vec<ToolCall>) -> CompletionResponse {
        CompletionResponse {
            content: None,
            model: "mock".to_string(),
            usage: TokenUsage::default(),
            finish_reason: FinishReason::ToolCalls,
            tool_calls: Some(calls),
        }
    }

    #[test]
    fn test_state_for_stage() {
        assert_eq!(PipelineState::for_stage(TaskKind::Verify), PipelineState::Verifying);
        assert_eq!(PipelineState::for_stage(TaskKind::FindDeals), PipelineState::DealFinding);
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Reporting.is_terminal());
    }

    #[test]
    fn test_rejects_out_of_order_tasks() {
        let tasks = vec![
            task(TaskKind::Research, vec![], &[]),
            task(TaskKind::Verify, vec![], &[]),
        ];
        let result = PipelineRunner::new(
            Arc::new(MockLlmProvider::new()),
            ToolSet::new(),
            tasks,
            PipelineSettings::default(),
        );
        assert!(matches!(result, Err(ShopperError::InternalError { .. })));
    }

    #[test]
    fn test_rejects_empty_task_list() {
        let result = PipelineRunner::new(
            Arc::new(MockLlmProvider::new()),
            ToolSet::new(),
            vec![],
            PipelineSettings::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_iteration_limit() {
        assert!(PipelineRunner::check_iteration_limit(TaskKind::Verify, 1, 3).is_ok());
        assert!(matches!(
            PipelineRunner::check_iteration_limit(TaskKind::Verify, 3, 3),
            Err(ShopperError::ToolIterationsExceeded { max: 3, .. })
        ));
    }

    #[test]
    fn test_assistant_response_summarizes_tool_calls() {
        let mut messages = Vec::new();
        let response = response_with_calls(vec![ToolCall {
            id: "call_1".to_string(),
            name: "search_internet".to_string(),
            arguments: json!({"search_query": "air fryer"}),
        }]);

        PipelineRunner::add_assistant_response(&mut messages, &response);

        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.starts_with("Calling tools: search_internet("));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("ééé", 3), "é...");
    }

    #[tokio::test]
    async fn test_run_twice_is_an_error() {
        let llm = Arc::new(MockLlmProvider::new().with_text("verified"));
        let mut runner = PipelineRunner::new(
            llm,
            ToolSet::new(),
            vec![task(TaskKind::Verify, vec![], &[])],
            PipelineSettings::default(),
        )
        .unwrap();

        let report = runner.run().await.unwrap();
        assert_eq!(report.final_output(), "verified");
        assert_eq!(runner.state(), PipelineState::Done);

        assert!(runner.run().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_context_is_internal_error() {
        let llm = Arc::new(MockLlmProvider::new().with_text("research"));
        let mut runner = PipelineRunner::new(
            llm,
            ToolSet::new(),
            vec![task(TaskKind::Research, vec![TaskKind::Verify], &[])],
            PipelineSettings::default(),
        )
        .unwrap();

        let result = runner.run().await;

        assert!(matches!(result, Err(ShopperError::InternalError { .. })));
        assert_eq!(runner.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn test_validation_error_is_fed_back() {
        let tool = Arc::new(MockTool::search_internet());
        let llm = Arc::new(
            MockLlmProvider::new()
                .with_tool_calls(vec![("search_internet", json!({"wrong": 1}))])
                .with_text("done"),
        );
        let mut runner = PipelineRunner::new(
            llm.clone(),
            ToolSet::new().with_tool(ToolKind::SearchInternet, tool.clone()),
            vec![task(TaskKind::Verify, vec![], &[ToolKind::SearchInternet])],
            PipelineSettings::default(),
        )
        .unwrap();

        let report = runner.run().await.unwrap();

        assert_eq!(report.final_output(), "done");
        assert!(tool.calls().await.is_empty());
        let requests = llm.requests().await;
        let last = requests[1].messages.last().unwrap();
        assert!(last.content.contains("Tool search_internet failed"));
    }
}
