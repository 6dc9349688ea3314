//! Internet search tool backed by the Serper.dev Google Search API

use crate::config::ToolsSection;
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Serper search tool; the API key is the request's search credential
pub struct SearchInternetTool {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: usize,
}

impl SearchInternetTool {
    pub fn new(api_key: &str, config: &ToolsSection) -> Result<Self, ToolError> {
        if api_key.trim().is_empty() {
            return Err(ToolError::InitializationError(
                "Serper API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ToolError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: config.serper_base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    /// Build search payload (pure function)
    fn build_search_payload(query: &str, num_results: usize, max_results: usize) -> Value {
        json!({
            "q": query,
            "num": num_results.min(max_results),
            "gl": "us",
            "hl": "en"
        })
    }

    /// Parse organic results and the answer box, if any (pure function)
    fn parse_search_response(search_result: &Value, num_results: usize) -> Vec<Value> {
        let mut formatted_results = Vec::new();

        if let Some(answer) = search_result
            .get("answerBox")
            .and_then(|a| a.get("snippet").or_else(|| a.get("answer")))
            .and_then(|s| s.as_str())
        {
            formatted_results.push(json!({
                "title": "Answer box",
                "url": search_result["answerBox"]
                    .get("link")
                    .and_then(|l| l.as_str())
                    .unwrap_or(""),
                "snippet": answer
            }));
        }

        if let Some(organic) = search_result.get("organic").and_then(|o| o.as_array()) {
            for result in organic.iter().take(num_results) {
                if let (Some(title), Some(link)) = (
                    result.get("title").and_then(|t| t.as_str()),
                    result.get("link").and_then(|l| l.as_str()),
                ) {
                    let snippet = result.get("snippet").and_then(|s| s.as_str()).unwrap_or("");

                    formatted_results.push(json!({
                        "title": title,
                        "url": link,
                        "snippet": snippet
                    }));
                }
            }
        }

        formatted_results
    }

    /// Extract number of results from parameters (pure function)
    fn extract_num_results(parameters: &Value, default: usize) -> usize {
        parameters
            .get("num_results")
            .and_then(|n| n.as_u64())
            .map(|n| n as usize)
            .unwrap_or(default)
    }
}

#[async_trait]
impl Tool for SearchInternetTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "search_internet".to_string(),
            description: "Search the internet for current product listings, prices, reviews and retailer pages. Returns titles, URLs and snippets.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "search_query": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Search query"
                    },
                    "num_results": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 20
                    }
                },
                "required": ["search_query"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let query = parameters["search_query"]
            .as_str()
            .ok_or_else(|| ToolError::ValidationError("search_query is required".to_string()))?;
        let num_results = Self::extract_num_results(parameters, self.max_results);

        let payload = Self::build_search_payload(query, num_results, self.max_results);

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(ToolError::from_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ToolError::ApiError {
                status: status.as_u16(),
                message: format!("Serper API error: {error_text}"),
            });
        }

        let search_result: Value = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Failed to parse response: {e}")))?;

        let results = Self::parse_search_response(&search_result, num_results);
        if results.is_empty() {
            return Err(ToolError::NotFound(format!("No search results for '{query}'")));
        }

        Ok(json!({
            "query": query,
            "results": results
        }))
    }
}
