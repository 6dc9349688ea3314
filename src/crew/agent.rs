//! Agent personas

use crate::tools::ToolKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A prompt persona with a goal, backstory and permitted tools
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agent {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Vec<ToolKind>,
    pub verbose: bool,
}

impl Agent {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            tools: Vec::new(),
            verbose: false,
        }
    }

    pub fn with_tools(mut self, tools: &[ToolKind]) -> Self {
        self.tools = tools.to_vec();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// System prompt carrying the persona and the current date (pure function)
    pub fn system_prompt(&self, now: DateTime<Utc>) -> String {
        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role,
            normalize_whitespace(&self.backstory),
            self.goal
        );

        if self.tools.is_empty() {
            prompt.push_str("\n\nYou have no tools; answer from the context you are given.");
        } else {
            let names: Vec<&str> = self.tools.iter().map(ToolKind::name).collect();
            prompt.push_str(&format!(
                "\n\nYou can use these tools to gather facts: {}. Call them whenever the answer depends on current information.",
                names.join(", ")
            ));
        }

        prompt.push_str(&format!(
            "\n\nCurrent date and time: {} UTC",
            now.format("%Y-%m-%d %H:%M:%S")
        ));
        prompt
    }
}

/// Collapse runs of whitespace from multi-line prompt literals
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
