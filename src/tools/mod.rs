//! Tool adapters exposed to pipeline agents
//!
//! Every tool describes itself with a JSON Schema parameter object (sent to the
//! LLM as a function definition) and executes against an external service.
//! A [`ToolSet`] holds the request-scoped instances; each agent receives a
//! [`ToolBox`] containing only the tools it is permitted to call.

use crate::config::{Credentials, ToolsSection};
use crate::observability::metrics::metrics;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

pub mod builtin;

/// Tool interface
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, purpose and JSON Schema of accepted parameters
    fn describe(&self) -> ToolDescription;

    /// Run the tool with parameters already validated against `describe()`
    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError>;
}

/// Tool description handed to the LLM as a function definition
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The three tool adapters an agent may be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    SearchInternet,
    SearchWebsite,
    ScrapeWebsite,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::SearchInternet,
        ToolKind::SearchWebsite,
        ToolKind::ScrapeWebsite,
    ];

    /// Function name the LLM uses to call this tool
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::SearchInternet => "search_internet",
            ToolKind::SearchWebsite => "search_website",
            ToolKind::ScrapeWebsite => "scrape_website",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request-scoped collection of tool instances keyed by kind
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: HashMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the builtin HTTP-backed tools for one request
    pub fn from_credentials(
        credentials: &Credentials,
        config: &ToolsSection,
    ) -> Result<Self, ToolError> {
        let fetcher = builtin::PageFetcher::new(config)?;

        Ok(Self::new()
            .with_tool(
                ToolKind::SearchInternet,
                Arc::new(builtin::SearchInternetTool::new(
                    &credentials.search_api_key,
                    config,
                )?),
            )
            .with_tool(
                ToolKind::SearchWebsite,
                Arc::new(builtin::SearchWebsiteTool::new(
                    fetcher.clone(),
                    config.max_passages,
                )),
            )
            .with_tool(
                ToolKind::ScrapeWebsite,
                Arc::new(builtin::ScrapeWebsiteTool::new(fetcher)),
            ))
    }

    /// Register a tool under the given kind, replacing any previous one
    pub fn with_tool(mut self, kind: ToolKind, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(kind, tool);
        self
    }

    /// Assemble the tool box for an agent permitted to use `kinds`
    pub fn toolbox_for(&self, kinds: &[ToolKind]) -> Result<ToolBox, ToolError> {
        let tools = kinds
            .iter()
            .map(|kind| {
                self.tools
                    .get(kind)
                    .cloned()
                    .map(|tool| (kind.name().to_string(), tool))
                    .ok_or_else(|| ToolError::UnknownTool(kind.name().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ToolBox { tools })
    }
}

/// Tools available to one agent, in the order they were granted
#[derive(Clone, Default)]
pub struct ToolBox {
    tools: Vec<(String, Arc<dyn Tool>)>,
}

impl ToolBox {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get list of available tool names
    pub fn list_tools(&self) -> Vec<String> {
        self.tools.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.find(tool_name).is_some()
    }

    /// Descriptions of every tool, for the LLM request
    pub fn descriptions(&self) -> Vec<ToolDescription> {
        self.tools.iter().map(|(_, tool)| tool.describe()).collect()
    }

    fn find(&self, tool_name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|(name, _)| name == tool_name)
            .map(|(_, tool)| tool)
    }

    /// Execute tool with validated parameters
    pub async fn execute_tool(&self, tool_name: &str, parameters: &Value) -> Result<Value, ToolError> {
        let tool = self
            .find(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        Self::validate_parameters(tool.as_ref(), parameters)?;

        let started = Instant::now();
        let result = tool.execute(parameters).await;
        metrics().tool_executed(tool_name, started.elapsed(), result.is_ok());

        match &result {
            Ok(_) => debug!(tool = tool_name, "Tool completed"),
            Err(e) => warn!(tool = tool_name, error = %e, "Tool failed"),
        }

        result
    }

    /// Validate parameters against the tool's JSON Schema
    fn validate_parameters(tool: &dyn Tool, parameters: &Value) -> Result<(), ToolError> {
        let description = tool.describe();
        let validator = jsonschema::validator_for(&description.parameters)
            .map_err(|e| ToolError::SchemaError(format!("Schema compilation error: {e}")))?;

        validator.validate(parameters).map_err(|errors| {
            let error_messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            ToolError::ValidationError(error_messages.join("; "))
        })
    }
}

/// Tool errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool initialization failed: {0}")]
    InitializationError(String),
    #[error("Parameter validation failed: {0}")]
    ValidationError(String),
    #[error("Schema error: {0}")]
    SchemaError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}

impl ToolError {
    /// Errors the model caused and can correct on its next turn
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ToolError::ValidationError(_))
    }

    /// Map a transport-level request failure
    pub fn from_request_error(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() || error.is_request() || error.is_body() {
            ToolError::NetworkError(error.to_string())
        } else {
            ToolError::ExecutionError(error.to_string())
        }
    }
}
