//! Mock implementations for testing
//!
//! Provides a scripted LlmProvider, recording Tools and a CrewFactory so the
//! pipeline and presentation layer can be tested without network access.

use crate::config::Credentials;
use crate::crew::{shopping_tasks, PipelineRunner, PipelineSettings, ShoppingAgents};
use crate::error::{ShopperError, ShopperResult};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
    ToolCall,
};
use crate::service::CrewFactory;
use crate::tools::{Tool, ToolDescription, ToolError, ToolKind, ToolSet};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One scripted LLM turn
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    ToolCalls(Vec<(String, Value)>),
    Error(LlmError),
}

/// Mock LLM provider replaying a script of replies in order
///
/// Once the script is exhausted every request gets `"Mock response"`.
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    script: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
    should_fail: bool,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose every request fails
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_reply(MockReply::Text(text.into()))
    }

    pub fn with_tool_calls(self, calls: Vec<(&str, Value)>) -> Self {
        self.with_reply(MockReply::ToolCalls(
            calls
                .into_iter()
                .map(|(name, arguments)| (name.to_string(), arguments))
                .collect(),
        ))
    }

    pub fn with_error(self, error: LlmError) -> Self {
        self.with_reply(MockReply::Error(error))
    }

    pub fn with_reply(mut self, reply: MockReply) -> Self {
        self.script.get_mut().push_back(reply);
        self
    }

    /// Sleep before answering, to interleave concurrent runs
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received, in order
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    fn usage() -> TokenUsage {
        TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let reply = self.script.lock().await.pop_front();
        let (content, finish_reason, tool_calls) = match reply {
            Some(MockReply::Error(error)) => return Err(error),
            Some(MockReply::Text(text)) => (Some(text), FinishReason::Stop, None),
            Some(MockReply::ToolCalls(calls)) => {
                let calls = calls
                    .into_iter()
                    .enumerate()
                    .map(|(index, (name, arguments))| ToolCall {
                        id: format!("call_{index}"),
                        name,
                        arguments,
                    })
                    .collect();
                (None, FinishReason::ToolCalls, Some(calls))
            }
            None => (Some("Mock response".to_string()), FinishReason::Stop, None),
        };

        Ok(CompletionResponse {
            content,
            model: "mock-model".to_string(),
            usage: Self::usage(),
            finish_reason,
            tool_calls,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// How a failing [`MockTool`] fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockToolFailure {
    Network,
    NotFound,
}

/// Mock tool recording its calls and returning a fixed result
#[derive(Debug)]
pub struct MockTool {
    description: ToolDescription,
    result: Value,
    failure: Option<MockToolFailure>,
    calls: Mutex<Vec<Value>>,
}

impl MockTool {
    pub fn new(description: ToolDescription, result: Value) -> Self {
        Self {
            description,
            result,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn search_internet() -> Self {
        Self::new(
            Self::description(
                ToolKind::SearchInternet,
                json!({
                    "search_query": {"type": "string", "minLength": 1},
                    "num_results": {"type": "integer", "minimum": 1, "maximum": 20}
                }),
                &["search_query"],
            ),
            json!({
                "query": "mock query",
                "results": [{
                    "title": "Mock Product - Example Store",
                    "link": "https://store.example.com/product",
                    "snippet": "In stock. $199.99"
                }]
            }),
        )
    }

    pub fn search_website() -> Self {
        Self::new(
            Self::description(
                ToolKind::SearchWebsite,
                json!({
                    "website_url": {"type": "string"},
                    "search_query": {"type": "string", "minLength": 1}
                }),
                &["website_url", "search_query"],
            ),
            json!({
                "url": "https://store.example.com/product",
                "passages": ["Warranty: 2 years limited"]
            }),
        )
    }

    pub fn scrape_website() -> Self {
        Self::new(
            Self::description(
                ToolKind::ScrapeWebsite,
                json!({"website_url": {"type": "string"}}),
                &["website_url"],
            ),
            json!({
                "url": "https://store.example.com/product",
                "content": "Mock Product\nPrice: $199.99\nIn stock"
            }),
        )
    }

    /// Make every call fail after being recorded
    pub fn failing(mut self, failure: MockToolFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub async fn calls(&self) -> Vec<Value> {
        self.calls.lock().await.clone()
    }

    fn description(kind: ToolKind, properties: Value, required: &[&str]) -> ToolDescription {
        ToolDescription {
            name: kind.name().to_string(),
            description: format!("Mock {kind}"),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl Tool for MockTool {
    fn describe(&self) -> ToolDescription {
        self.description.clone()
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        self.calls.lock().await.push(parameters.clone());

        match self.failure {
            Some(MockToolFailure::Network) => Err(ToolError::NetworkError(format!(
                "Mock connection refused: {}",
                self.description.name
            ))),
            Some(MockToolFailure::NotFound) => Err(ToolError::NotFound(format!(
                "Mock page missing: {}",
                self.description.name
            ))),
            None => Ok(self.result.clone()),
        }
    }
}

/// Build a tool set of the three mock tools
pub fn mock_tool_set() -> (ToolSet, [Arc<MockTool>; 3]) {
    let search_internet = Arc::new(MockTool::search_internet());
    let search_website = Arc::new(MockTool::search_website());
    let scrape_website = Arc::new(MockTool::scrape_website());

    let tools = ToolSet::new()
        .with_tool(ToolKind::SearchInternet, search_internet.clone())
        .with_tool(ToolKind::SearchWebsite, search_website.clone())
        .with_tool(ToolKind::ScrapeWebsite, scrape_website.clone());

    (tools, [search_internet, search_website, scrape_website])
}

type LlmScript = dyn Fn(&Credentials, &str) -> MockLlmProvider + Send + Sync;

/// Crew factory building the real shopping tasks over a mock LLM and mock tools
pub struct MockCrewFactory {
    script: Arc<LlmScript>,
    tools: ToolSet,
    settings: PipelineSettings,
    builds: std::sync::Mutex<Vec<(Credentials, String)>>,
    build_error: Option<String>,
}

impl MockCrewFactory {
    /// Each build gets a fresh provider from `script`
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Credentials, &str) -> MockLlmProvider + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            tools: mock_tool_set().0,
            settings: PipelineSettings::default(),
            builds: std::sync::Mutex::new(Vec::new()),
            build_error: None,
        }
    }

    /// Every stage answers with text naming the LLM key and query
    pub fn echoing() -> Self {
        Self::new(|credentials, query| {
            let mut llm = MockLlmProvider::new();
            for kind in crate::crew::TaskKind::ORDER {
                llm = llm.with_text(format!("{}:{}:{}", credentials.llm_api_key, kind, query));
            }
            llm
        })
    }

    /// Factory whose construction always fails
    pub fn failing_build(message: impl Into<String>) -> Self {
        Self {
            build_error: Some(message.into()),
            ..Self::new(|_, _| MockLlmProvider::new())
        }
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Credentials and query of every build, in order
    pub fn builds(&self) -> Vec<(Credentials, String)> {
        self.builds
            .lock()
            .map(|builds| builds.clone())
            .unwrap_or_default()
    }

    pub fn build_count(&self) -> usize {
        self.builds().len()
    }
}

impl CrewFactory for MockCrewFactory {
    fn build(&self, credentials: &Credentials, query: &str) -> ShopperResult<PipelineRunner> {
        if let Ok(mut builds) = self.builds.lock() {
            builds.push((credentials.clone(), query.to_string()));
        }

        if let Some(message) = &self.build_error {
            return Err(ShopperError::internal_error(message.clone()));
        }

        let agents = ShoppingAgents::new(false);
        PipelineRunner::new(
            Arc::new((self.script)(credentials, query)),
            self.tools.clone(),
            shopping_tasks(query, &agents),
            self.settings.clone(),
        )
    }
}
