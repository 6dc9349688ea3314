//! Website scraping tool: returns the readable text of a single page

use super::page::PageFetcher;
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct ScrapeWebsiteTool {
    fetcher: PageFetcher,
}

impl ScrapeWebsiteTool {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for ScrapeWebsiteTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "scrape_website".to_string(),
            description: "Read the full text content of a web page, such as a retailer product page or review article.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "website_url": {
                        "type": "string",
                        "description": "Absolute http(s) URL of the page to read"
                    }
                },
                "required": ["website_url"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let raw_url = parameters["website_url"]
            .as_str()
            .ok_or_else(|| ToolError::ValidationError("website_url is required".to_string()))?;
        let url = PageFetcher::parse_url(raw_url)?;

        let content = self.fetcher.fetch_text(&url).await?;

        Ok(json!({
            "url": url.as_str(),
            "content": content
        }))
    }
}
