//! Configuration system for the shopping assistant
//!
//! All sections are optional in the TOML file; missing fields fall back to
//! defaults. API keys are never read from the file: they are supplied per
//! request as [`Credentials`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShopperConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// LLM section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible API base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional max tokens per completion
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_llm_base_url(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Pipeline section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSection {
    /// Maximum LLM round trips per stage while the model keeps requesting tools
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    /// Log full stage outputs as they complete
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            verbose: default_verbose(),
        }
    }
}

/// Tool adapter section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsSection {
    /// Serper.dev API base URL
    #[serde(default = "default_serper_base_url")]
    pub serper_base_url: String,
    /// Upper bound on search results per query (1 to 20)
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Largest page body accepted by the website tools, in bytes
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
    /// Per-request timeout in seconds
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
    /// Passages returned by website search
    #[serde(default = "default_max_passages")]
    pub max_passages: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            serper_base_url: default_serper_base_url(),
            max_results: default_max_results(),
            max_response_size: default_max_response_size(),
            timeout_secs: default_tool_timeout(),
            max_passages: default_max_passages(),
        }
    }
}

impl ToolsSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Web front end section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_max_tool_iterations() -> usize {
    8
}

fn default_verbose() -> bool {
    true
}

fn default_serper_base_url() -> String {
    "https://google.serper.dev".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_max_response_size() -> usize {
    1024 * 1024
}

fn default_tool_timeout() -> u64 {
    30
}

fn default_max_passages() -> usize {
    5
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7860
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ShopperConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ShopperConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "llm.temperature must be between 0.0 and 2.0, got {temperature}"
                )));
            }
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "llm.model must not be empty".to_string(),
            ));
        }
        if self.pipeline.max_tool_iterations == 0 {
            return Err(ConfigError::InvalidConfig(
                "pipeline.max_tool_iterations must be at least 1".to_string(),
            ));
        }
        if !(1..=20).contains(&self.tools.max_results) {
            return Err(ConfigError::InvalidConfig(format!(
                "tools.max_results must be between 1 and 20, got {}",
                self.tools.max_results
            )));
        }
        if self.tools.max_passages == 0 {
            return Err(ConfigError::InvalidConfig(
                "tools.max_passages must be at least 1".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must not be 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request-scoped API credentials
///
/// Passed explicitly into the LLM provider and tool adapters; never written to
/// the process environment, so concurrent requests cannot see each other's keys.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub llm_api_key: String,
    pub search_api_key: String,
}

impl Credentials {
    /// Build credentials from form input; both values must be non-blank
    pub fn from_form(llm_api_key: &str, search_api_key: &str) -> Option<Self> {
        if llm_api_key.trim().is_empty() || search_api_key.trim().is_empty() {
            return None;
        }
        Some(Self {
            llm_api_key: llm_api_key.trim().to_string(),
            search_api_key: search_api_key.trim().to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"***")
            .field("search_api_key", &"***")
            .finish()
    }
}
