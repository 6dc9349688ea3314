//! The shopping crew: four agent personas and their task prompts

use super::agent::Agent;
use super::task::{Task, TaskKind};
use crate::tools::ToolKind;

/// Queries offered as one-click examples in the form
pub const EXAMPLE_QUERIES: [&str; 6] = [
    "High-end espresso machine under $1000",
    "4K gaming monitor with 144Hz refresh rate",
    "Noise-cancelling headphones with long battery life",
    "Robot vacuum with mapping capability",
    "Air fryer with digital controls",
    "Smart doorbell with video recording",
];

const WEB_TOOLS: [ToolKind; 3] = [
    ToolKind::SearchInternet,
    ToolKind::SearchWebsite,
    ToolKind::ScrapeWebsite,
];

/// The four personas, one per task
#[derive(Debug, Clone)]
pub struct ShoppingAgents {
    pub verifier: Agent,
    pub researcher: Agent,
    pub deal_finder: Agent,
    pub reporter: Agent,
}

impl ShoppingAgents {
    pub fn new(verbose: bool) -> Self {
        Self {
            verifier: Agent::new(
                "Product Specification Verifier",
                "Verify exact product details and model information",
                "You are a technical specialist who verifies product specifications, \
                 model numbers, and ensures accuracy of product information. You have extensive \
                 experience in consumer electronics and can spot incorrect or outdated information.",
            )
            .with_tools(&[ToolKind::SearchInternet, ToolKind::SearchWebsite])
            .verbose(verbose),

            researcher: Agent::new(
                "Product Research Specialist",
                "Conduct comprehensive product research including customer reviews and availability",
                "You are an expert product researcher who specializes in detailed product analysis. \
                 You focus on gathering authentic customer reviews, checking real-time stock \
                 availability, and verifying warranty information. You know how to distinguish \
                 genuine reviews from fake ones and can provide balanced perspectives from actual users.",
            )
            .with_tools(&WEB_TOOLS)
            .verbose(verbose),

            deal_finder: Agent::new(
                "Deals Analysis Expert",
                "Find and verify current deals with specific dates and conditions",
                "You are a professional deal finder who specializes in tracking promotion dates \
                 and conditions. You verify the legitimacy of deals, understand complex terms and \
                 conditions, and can find hidden savings opportunities. You're expert at comparing \
                 warranty options and total ownership costs.",
            )
            .with_tools(&WEB_TOOLS)
            .verbose(verbose),

            reporter: Agent::new(
                "Shopping Report Specialist",
                "Create detailed, accurate shopping reports with specific links and availability info",
                "You are an experienced shopping analyst who creates comprehensive reports. \
                 You ensure all information is current and accurate, include specific product links, \
                 and provide detailed availability information. You excel at presenting complex \
                 information in an easy-to-understand format while maintaining technical accuracy.",
            )
            .verbose(verbose),
        }
    }

    pub fn all(&self) -> [&Agent; 4] {
        [
            &self.verifier,
            &self.researcher,
            &self.deal_finder,
            &self.reporter,
        ]
    }
}

/// Build the four tasks for `query`; each consumes every earlier task's output
pub fn shopping_tasks(query: &str, agents: &ShoppingAgents) -> Vec<Task> {
    let query = query.trim();

    vec![
        Task {
            kind: TaskKind::Verify,
            description: format!(
                "Verify exact product specifications for: {query}

Required Steps:
1. Confirm exact model number and name
2. Verify all technical specifications
3. Check for any recent product updates or revisions
4. Confirm product variants and options
5. Validate compatibility information

Return:
- Exact model numbers and names
- Confirmed specifications
- Any discrepancies found
- Latest product updates"
            ),
            agent: agents.verifier.clone(),
            context: vec![],
            expected_output: "Detailed product verification findings".to_string(),
        },
        Task {
            kind: TaskKind::Research,
            description: format!(
                "Research this product in detail: {query}

Required Steps:
1. Search for the product across major retailers
2. Collect and analyze customer reviews (minimum 10)
3. Check current stock availability
4. Verify warranty options and terms
5. Analyze return policies
6. Compare technical specifications

Return findings including:
- Verified retailer list with exact product page URLs
- Detailed warranty information
- Stock availability status
- Curated customer reviews (positive and negative)
- Technical specifications comparison
- Return policy details"
            ),
            agent: agents.researcher.clone(),
            context: vec![TaskKind::Verify],
            expected_output: "Detailed product research findings which should include:
- Verified retailer list with exact product page URLs
- Detailed warranty information
- Stock availability status
- Curated customer reviews (positive and negative)
- Technical specifications comparison
- Return policy details"
                .to_string(),
        },
        Task {
            kind: TaskKind::FindDeals,
            description: "Using the research findings, analyze current deals:

Required Steps:
1. Verify current prices and promotions
2. Document specific promotion dates
3. Detail all terms and conditions
4. Compare warranty options
5. Check stock availability for deals
6. Verify shipping timeframes

Provide for each retailer:
- Current price with promotion dates
- Detailed terms and conditions
- Warranty options and costs
- Stock availability status
- Shipping/pickup options and timeframes
- Total cost breakdown including all fees"
                .to_string(),
            agent: agents.deal_finder.clone(),
            context: vec![TaskKind::Verify, TaskKind::Research],
            expected_output: "Detailed deals analysis which should include:
- Current price with promotion dates
- Detailed terms and conditions
- Warranty options and costs
- Stock availability status
- Shipping/pickup options and timeframes
- Total cost breakdown including all fees"
                .to_string(),
        },
        Task {
            kind: TaskKind::Report,
            description: "Create a comprehensive shopping report including:

1. Executive Summary
   - Top recommendation with reasoning
   - Price range overview with specific dates
   - Best current deal with terms

2. Product Details
   - Verified model numbers and specifications
   - Detailed pros and cons
   - Curated customer reviews (minimum 5 positive and 5 negative)
   - Warranty options comparison

3. Price and Availability Comparison
   - Retailer comparison table with exact URLs
   - Current stock availability
   - Promotion dates and terms
   - Complete cost breakdown

4. Buying Guide
   - Best retailer choice with reasoning
   - Stock availability alerts
   - Direct product page links
   - Warranty recommendations

Format the report clearly with sections and bullet points.
Include specific dates, model numbers, and direct links."
                .to_string(),
            agent: agents.reporter.clone(),
            context: vec![TaskKind::Verify, TaskKind::Research, TaskKind::FindDeals],
            expected_output: "Final shopping report formatted clearly with sections and bullet points. \
                Include specific dates, model numbers, and direct links"
                .to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_follow_fixed_order() {
        let agents = ShoppingAgents::new(false);
        let kinds: Vec<TaskKind> = shopping_tasks("monitor", &agents)
            .iter()
            .map(|t| t.kind)
            .collect();

        assert_eq!(kinds, TaskKind::ORDER.to_vec());
    }

    #[test]
    fn test_each_task_consumes_full_prefix() {
        let agents = ShoppingAgents::new(false);
        let tasks = shopping_tasks("monitor", &agents);

        for (index, task) in tasks.iter().enumerate() {
            assert_eq!(task.context, TaskKind::ORDER[..index].to_vec());
        }
    }

    #[test]
    fn test_query_interpolated_into_first_two_tasks() {
        let agents = ShoppingAgents::new(false);
        let tasks = shopping_tasks("  Air fryer with digital controls ", &agents);

        assert!(tasks[0]
            .description
            .starts_with("Verify exact product specifications for: Air fryer with digital controls\n"));
        assert!(tasks[1].description.contains("Air fryer with digital controls"));
        assert!(!tasks[2].description.contains("Air fryer"));
    }

    #[test]
    fn test_agent_tool_grants() {
        let agents = ShoppingAgents::new(true);

        assert_eq!(
            agents.verifier.tools,
            vec![ToolKind::SearchInternet, ToolKind::SearchWebsite]
        );
        assert_eq!(agents.researcher.tools, WEB_TOOLS.to_vec());
        assert_eq!(agents.deal_finder.tools, WEB_TOOLS.to_vec());
        assert!(agents.reporter.tools.is_empty());
        assert!(agents.all().iter().all(|a| a.verbose));
    }

    #[test]
    fn test_tasks_bound_to_matching_agents() {
        let agents = ShoppingAgents::new(false);
        let tasks = shopping_tasks("monitor", &agents);

        assert_eq!(tasks[0].agent.role, "Product Specification Verifier");
        assert_eq!(tasks[1].agent.role, "Product Research Specialist");
        assert_eq!(tasks[2].agent.role, "Deals Analysis Expert");
        assert_eq!(tasks[3].agent.role, "Shopping Report Specialist");
    }
}
