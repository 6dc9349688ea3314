//! Error types for shopping pipeline operations
//!
//! Subsystem errors (LLM provider, tools, configuration) are unified under
//! [`ShopperError`]. Only two kinds ever reach the user: a missing-credential
//! validation message, and a run error rendered as `"An error occurred: ..."`.

use crate::config::ConfigError;
use crate::llm::provider::LlmError;
use crate::tools::ToolError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Message returned when either credential is blank
pub const MISSING_CREDENTIALS_MESSAGE: &str = "Please enter both API keys";

/// Prefix of every user-facing run error
pub const RUN_ERROR_PREFIX: &str = "An error occurred: ";

const MAX_LOGGED_MESSAGE_LEN: usize = 500;

/// Main error type for shopping pipeline operations
#[derive(Debug, Error)]
pub enum ShopperError {
    #[error("{}", MISSING_CREDENTIALS_MESSAGE)]
    MissingCredentials,

    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tool '{tool}' is not available to the {role}")]
    ToolNotPermitted { tool: String, role: String },

    #[error("{stage} stage exceeded maximum tool iterations ({max})")]
    ToolIterationsExceeded { stage: String, max: usize },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ShopperError {
    /// Create tool-not-permitted error
    pub fn tool_not_permitted<S: Into<String>, R: Into<String>>(tool: S, role: R) -> Self {
        Self::ToolNotPermitted {
            tool: tool.into(),
            role: role.into(),
        }
    }

    /// Create tool iteration limit error
    pub fn tool_iterations_exceeded<S: Into<String>>(stage: S, max: usize) -> Self {
        Self::ToolIterationsExceeded {
            stage: stage.into(),
            max,
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Whether this is the credential validation failure (run never started)
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingCredentials)
    }

    /// Render the string returned to the form for this error
    pub fn to_user_message(&self) -> String {
        if self.is_validation() {
            MISSING_CREDENTIALS_MESSAGE.to_string()
        } else {
            format!("{RUN_ERROR_PREFIX}{self}")
        }
    }
}

static SECRET_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("static pattern compiles")
});

static BEARER_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"sk-[A-Za-z0-9_\-*]{4,}").expect("static pattern compiles"));

/// Redact credential-looking substrings before an error message is logged
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_ASSIGNMENT
        .replace_all(message, "${1}=***")
        .to_string();
    sanitized = BEARER_KEY.replace_all(&sanitized, "sk-***").to_string();

    if sanitized.len() > MAX_LOGGED_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_LOGGED_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for shopping pipeline operations
pub type ShopperResult<T> = Result<T, ShopperError>;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_missing_credentials_message() {
        let error = ShopperError::MissingCredentials;
        assert!(error.is_validation());
        assert_eq!(error.to_user_message(), "Please enter both API keys");
    }

    #[test]
    fn test_run_error_prefix() {
        let error = ShopperError::Tool(ToolError::NetworkError("connection refused".into()));
        let message = error.to_user_message();

        assert!(message.starts_with("An error occurred: "));
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn test_llm_error_wraps_display() {
        let error: ShopperError = LlmError::RateLimitExceeded("slow down".into()).into();
        assert_eq!(
            error.to_string(),
            "LLM provider error: Rate limit exceeded: slow down"
        );
    }

    #[test]
    fn test_tool_not_permitted_constructor() {
        let error = ShopperError::tool_not_permitted("scrape_website", "Shopping Report Specialist");
        assert_eq!(
            error.to_string(),
            "Tool 'scrape_website' is not available to the Shopping Report Specialist"
        );
    }

    #[test]
    fn test_tool_iterations_exceeded_constructor() {
        let error = ShopperError::tool_iterations_exceeded("research", 8);
        assert!(error.to_string().contains("research"));
        assert!(error.to_string().contains('8'));
    }

    #[test]
    fn test_sanitize_redacts_assignments() {
        let sanitized = sanitize_error_message("auth failed: api_key=abc123 token: xyz");
        assert!(!sanitized.contains("abc123"));
        assert!(!sanitized.contains("xyz"));
        assert!(sanitized.contains("key=***"));
    }

    #[test]
    fn test_sanitize_redacts_openai_keys() {
        let sanitized = sanitize_error_message("Incorrect API key provided: sk-proj-AbCdEf123456");
        assert!(!sanitized.contains("AbCdEf123456"));
        assert!(sanitized.contains("sk-***"));
    }

    #[test]
    fn test_sanitize_truncates_long_messages() {
        let sanitized = sanitize_error_message(&"é".repeat(400));
        assert!(sanitized.len() <= 500);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_sanitize_empty_message() {
        assert_eq!(sanitize_error_message(""), "");
    }

    proptest! {
        #[test]
        fn prop_sanitize_never_leaks_openai_key(
            prefix in "[a-z ]{0,20}",
            key in "[A-Z0-9]{8,40}",
        ) {
            let sanitized = sanitize_error_message(&format!("{prefix} sk-{key}"));
            prop_assert!(!sanitized.contains(&key));
        }

        #[test]
        fn prop_sanitize_respects_length_cap(message in "\\PC{0,800}") {
            let sanitized = sanitize_error_message(&message);
            prop_assert!(sanitized.len() <= MAX_LOGGED_MESSAGE_LEN);
        }
    }
}
