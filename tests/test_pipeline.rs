//! Pipeline runner behavior with the real shopping tasks over a scripted LLM
//!
//! Assertions are structural: stage order, context chaining, tool loop
//! bookkeeping and abort semantics. LLM text is never judged.

use serde_json::json;
use shopsurfer::crew::{
    shopping_tasks, PipelineRunner, PipelineSettings, PipelineState, ShoppingAgents, TaskKind,
};
use shopsurfer::error::ShopperError;
use shopsurfer::llm::provider::{LlmError, MessageRole};
use shopsurfer::testing::mocks::{mock_tool_set, MockLlmProvider, MockTool, MockToolFailure};
use shopsurfer::tools::{ToolError, ToolKind};
use std::sync::Arc;

const QUERY: &str = "4K gaming monitor with 144Hz refresh rate";

fn runner(llm: Arc<MockLlmProvider>, tools: shopsurfer::tools::ToolSet) -> PipelineRunner {
    runner_with_settings(llm, tools, PipelineSettings::default())
}

fn runner_with_settings(
    llm: Arc<MockLlmProvider>,
    tools: shopsurfer::tools::ToolSet,
    settings: PipelineSettings,
) -> PipelineRunner {
    let agents = ShoppingAgents::new(false);
    PipelineRunner::new(llm, tools, shopping_tasks(QUERY, &agents), settings).unwrap()
}

fn four_stage_script() -> MockLlmProvider {
    MockLlmProvider::new()
        .with_text("VERIFY-OUTPUT model XG-27 confirmed")
        .with_text("RESEARCH-OUTPUT sold at three retailers")
        .with_text("DEALS-OUTPUT best price $299 until Friday")
        .with_text("REPORT-OUTPUT final shopping report")
}

#[tokio::test]
async fn test_stages_run_once_each_in_order() {
    let llm = Arc::new(four_stage_script());
    let (tools, _) = mock_tool_set();
    let mut runner = runner(llm.clone(), tools);

    let report = runner.run().await.unwrap();

    let kinds: Vec<TaskKind> = report.stages.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, TaskKind::ORDER.to_vec());
    assert_eq!(report.final_output(), "REPORT-OUTPUT final shopping report");
    assert_eq!(runner.state(), PipelineState::Done);
    assert_eq!(llm.request_count().await, 4);

    let requests = llm.requests().await;
    assert!(requests[0].messages[0]
        .content
        .starts_with("You are Product Specification Verifier."));
    assert!(requests[3].messages[0]
        .content
        .starts_with("You are Shopping Report Specialist."));
}

#[tokio::test]
async fn test_each_stage_prompt_contains_all_prior_outputs_in_order() {
    let llm = Arc::new(four_stage_script());
    let (tools, _) = mock_tool_set();
    let mut runner = runner(llm.clone(), tools);

    runner.run().await.unwrap();

    let outputs = [
        "VERIFY-OUTPUT model XG-27 confirmed",
        "RESEARCH-OUTPUT sold at three retailers",
        "DEALS-OUTPUT best price $299 until Friday",
    ];
    let requests = llm.requests().await;

    for (stage_index, request) in requests.iter().enumerate() {
        let user_prompt = &request.messages[1];
        assert_eq!(user_prompt.role, MessageRole::User);

        let positions: Vec<usize> = outputs[..stage_index]
            .iter()
            .map(|output| {
                user_prompt
                    .content
                    .find(output)
                    .unwrap_or_else(|| panic!("stage {stage_index} prompt lacks '{output}'"))
            })
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));

        for later in &outputs[stage_index..] {
            assert!(!user_prompt.content.contains(later));
        }
    }
}

#[tokio::test]
async fn test_query_embedded_in_verify_and_research_prompts() {
    let llm = Arc::new(four_stage_script());
    let (tools, _) = mock_tool_set();
    let mut runner = runner(llm.clone(), tools);

    runner.run().await.unwrap();

    let requests = llm.requests().await;
    assert!(requests[0].messages[1].content.contains(QUERY));
    assert!(requests[1].messages[1].content.contains(QUERY));
}

#[tokio::test]
async fn test_agents_receive_only_their_tools() {
    let llm = Arc::new(four_stage_script());
    let (tools, _) = mock_tool_set();
    let mut runner = runner(llm.clone(), tools);

    runner.run().await.unwrap();

    let requests = llm.requests().await;
    let tool_names = |index: usize| -> Vec<String> {
        requests[index]
            .tools
            .as_ref()
            .map(|tools| tools.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default()
    };

    assert_eq!(tool_names(0), vec!["search_internet", "search_website"]);
    assert_eq!(
        tool_names(1),
        vec!["search_internet", "search_website", "scrape_website"]
    );
    assert_eq!(tool_names(2).len(), 3);
    assert!(requests[3].tools.is_none());
}

#[tokio::test]
async fn test_tool_results_fed_back_until_text_response() {
    let llm = Arc::new(
        MockLlmProvider::new()
            .with_tool_calls(vec![(
                "search_internet",
                json!({"search_query": "XG-27 monitor specs"}),
            )])
            .with_text("VERIFY-OUTPUT")
            .with_text("RESEARCH-OUTPUT")
            .with_text("DEALS-OUTPUT")
            .with_text("REPORT-OUTPUT"),
    );
    let (tools, [search_internet, _, _]) = mock_tool_set();
    let mut runner = runner(llm.clone(), tools);

    let report = runner.run().await.unwrap();

    let verify = report.stage(TaskKind::Verify).unwrap();
    assert_eq!(verify.output, "VERIFY-OUTPUT");
    assert_eq!(verify.llm_iterations, 2);
    assert_eq!(verify.tool_calls, 1);
    assert_eq!(
        search_internet.calls().await,
        vec![json!({"search_query": "XG-27 monitor specs"})]
    );

    let requests = llm.requests().await;
    assert_eq!(requests.len(), 5);
    let follow_up = requests[1].messages.last().unwrap();
    assert_eq!(follow_up.role, MessageRole::User);
    assert!(follow_up.content.starts_with("Tool results:\n"));
    assert!(follow_up.content.contains("Mock Product - Example Store"));
}

#[tokio::test]
async fn test_stage_two_connectivity_failure_stops_run() {
    let llm = Arc::new(
        MockLlmProvider::new()
            .with_text("VERIFY-OUTPUT")
            .with_tool_calls(vec![(
                "scrape_website",
                json!({"website_url": "https://store.example.com/xg27"}),
            )])
            .with_text("never reached")
            .with_text("never reached"),
    );
    let scrape = Arc::new(MockTool::scrape_website().failing(MockToolFailure::Network));
    let (tools, _) = mock_tool_set();
    let tools = tools.with_tool(ToolKind::ScrapeWebsite, scrape.clone());
    let mut runner = runner(llm.clone(), tools);

    let result = runner.run().await;

    assert!(matches!(
        result,
        Err(ShopperError::Tool(ToolError::NetworkError(_)))
    ));
    assert_eq!(runner.state(), PipelineState::Failed);
    assert_eq!(scrape.calls().await.len(), 1);
    // verify + the research call that requested the tool; deals and report never run
    assert_eq!(llm.request_count().await, 2);
}

#[tokio::test]
async fn test_llm_failure_aborts_without_partial_report() {
    let llm = Arc::new(
        MockLlmProvider::new()
            .with_text("VERIFY-OUTPUT")
            .with_text("RESEARCH-OUTPUT")
            .with_error(LlmError::RateLimitExceeded("quota".to_string())),
    );
    let (tools, _) = mock_tool_set();
    let mut runner = runner(llm.clone(), tools);

    let result = runner.run().await;

    match result {
        Err(e) => assert!(e.to_user_message().starts_with("An error occurred: ")),
        Ok(report) => panic!("expected failure, got {report:?}"),
    }
    assert_eq!(llm.request_count().await, 3);
}

#[tokio::test]
async fn test_tool_outside_agent_toolbox_fails_run() {
    // the verifier is not granted scrape_website
    let llm = Arc::new(MockLlmProvider::new().with_tool_calls(vec![(
        "scrape_website",
        json!({"website_url": "https://store.example.com"}),
    )]));
    let (tools, [_, _, scrape]) = mock_tool_set();
    let mut runner = runner(llm.clone(), tools);

    let result = runner.run().await;

    match result {
        Err(ShopperError::ToolNotPermitted { tool, role }) => {
            assert_eq!(tool, "scrape_website");
            assert_eq!(role, "Product Specification Verifier");
        }
        other => panic!("expected ToolNotPermitted, got {other:?}"),
    }
    assert!(scrape.calls().await.is_empty());
}

#[tokio::test]
async fn test_tool_iteration_limit_fails_run() {
    let search = json!({"search_query": "monitor"});
    let llm = Arc::new(
        MockLlmProvider::new()
            .with_tool_calls(vec![("search_internet", search.clone())])
            .with_tool_calls(vec![("search_internet", search.clone())])
            .with_tool_calls(vec![("search_internet", search.clone())]),
    );
    let (tools, [search_internet, _, _]) = mock_tool_set();
    let settings = PipelineSettings {
        max_tool_iterations: 2,
        ..PipelineSettings::default()
    };
    let mut runner = runner_with_settings(llm.clone(), tools, settings);

    let result = runner.run().await;

    assert!(matches!(
        result,
        Err(ShopperError::ToolIterationsExceeded { max: 2, .. })
    ));
    assert_eq!(llm.request_count().await, 2);
    assert_eq!(search_internet.calls().await.len(), 1);
}

#[tokio::test]
async fn test_empty_final_text_is_accepted() {
    let llm = Arc::new(
        MockLlmProvider::new()
            .with_text("")
            .with_text("RESEARCH-OUTPUT")
            .with_text("DEALS-OUTPUT")
            .with_text(""),
    );
    let (tools, _) = mock_tool_set();
    let mut runner = runner(llm, tools);

    let report = runner.run().await.unwrap();

    assert_eq!(report.stages.len(), 4);
    assert_eq!(report.final_output(), "");
}

#[tokio::test]
async fn test_settings_flow_into_requests() {
    let llm = Arc::new(four_stage_script());
    let (tools, _) = mock_tool_set();
    let settings = PipelineSettings {
        model: "gpt-4o".to_string(),
        temperature: Some(0.2),
        max_tokens: Some(1500),
        max_tool_iterations: 4,
    };
    let mut runner = runner_with_settings(llm.clone(), tools, settings);

    runner.run().await.unwrap();

    for request in llm.requests().await {
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(1500));
    }
}
