//! Task definitions and effective prompt assembly

use super::agent::Agent;
use serde::Serialize;
use std::fmt;

/// The four pipeline tasks, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Verify,
    Research,
    FindDeals,
    Report,
}

impl TaskKind {
    pub const ORDER: [TaskKind; 4] = [
        TaskKind::Verify,
        TaskKind::Research,
        TaskKind::FindDeals,
        TaskKind::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Verify => "verify",
            TaskKind::Research => "research",
            TaskKind::FindDeals => "find_deals",
            TaskKind::Report => "report",
        }
    }

    /// Heading used when this task's output is quoted as context
    pub fn context_heading(&self) -> &'static str {
        match self {
            TaskKind::Verify => "Product verification findings",
            TaskKind::Research => "Product research findings",
            TaskKind::FindDeals => "Deals analysis",
            TaskKind::Report => "Shopping report",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prompt template bound to one agent and to prior tasks' outputs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub kind: TaskKind,
    pub description: String,
    pub agent: Agent,
    /// Tasks whose outputs are quoted into this task's prompt, in order
    pub context: Vec<TaskKind>,
    /// Advisory description of the answer; never validated
    pub expected_output: String,
}

impl Task {
    /// Build the user prompt from the description and context outputs (pure function)
    ///
    /// `context_outputs` must be in the same order as `self.context`.
    pub fn effective_prompt(&self, context_outputs: &[(TaskKind, &str)]) -> String {
        let mut prompt = self.description.trim().to_string();

        if !context_outputs.is_empty() {
            prompt.push_str("\n\nThis is the context you're working with:");
            for (kind, output) in context_outputs {
                prompt.push_str(&format!(
                    "\n\n### {}\n{}",
                    kind.context_heading(),
                    output
                ));
            }
        }

        prompt.push_str(&format!(
            "\n\nThis is the expected criteria for your final answer: {}\nYou MUST return the actual complete content as the final answer, not a summary.",
            self.expected_output.trim()
        ));

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task(context: Vec<TaskKind>) -> Task {
        Task {
            kind: TaskKind::FindDeals,
            description: "Analyze current deals".to_string(),
            agent: Agent::new("r", "g", "b"),
            context,
            expected_output: "Deals analysis".to_string(),
        }
    }

    #[test]
    fn test_task_kind_order() {
        let mut sorted = TaskKind::ORDER;
        sorted.sort();
        assert_eq!(sorted, TaskKind::ORDER);
        assert_eq!(TaskKind::FindDeals.to_string(), "find_deals");
    }

    #[test]
    fn test_effective_prompt_without_context() {
        let prompt = sample_task(vec![]).effective_prompt(&[]);

        assert!(prompt.starts_with("Analyze current deals"));
        assert!(!prompt.contains("context you're working with"));
        assert!(prompt.contains("expected criteria for your final answer: Deals analysis"));
    }

    #[test]
    fn test_effective_prompt_includes_context_in_order() {
        let task = sample_task(vec![TaskKind::Verify, TaskKind::Research]);
        let prompt = task.effective_prompt(&[
            (TaskKind::Verify, "MODEL X100 confirmed"),
            (TaskKind::Research, "Sold at three retailers"),
        ]);

        let verify_at = prompt.find("MODEL X100 confirmed").unwrap();
        let research_at = prompt.find("Sold at three retailers").unwrap();
        assert!(verify_at < research_at);
        assert!(prompt.contains("### Product verification findings"));
    }
}
