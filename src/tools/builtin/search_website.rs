//! Website search tool: finds the passages of a page relevant to a query
//!
//! The page text is split into paragraph-sized passages which are ranked by
//! how many distinct query terms they contain, then by total term hits.

use super::page::PageFetcher;
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;

/// Target passage length in bytes; lines are merged until it is reached
const PASSAGE_TARGET_LEN: usize = 600;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "for", "in", "is", "of", "on", "or", "the", "to", "with",
];

pub struct SearchWebsiteTool {
    fetcher: PageFetcher,
    max_passages: usize,
}

impl SearchWebsiteTool {
    pub fn new(fetcher: PageFetcher, max_passages: usize) -> Self {
        Self {
            fetcher,
            max_passages,
        }
    }
}

/// Split page text into passages of roughly `PASSAGE_TARGET_LEN` bytes (pure function)
pub fn split_passages(text: &str) -> Vec<String> {
    let mut passages = Vec::new();
    let mut current = String::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !current.is_empty() && current.len() + line.len() > PASSAGE_TARGET_LEN {
            passages.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        passages.push(current);
    }

    passages
}

/// Lowercased, de-duplicated search terms without stop words (pure function)
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric() && c != '$' && c != '.')
        .map(|t| t.trim_matches('.').to_lowercase())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Return up to `limit` passages matching at least one term, best first (pure function)
pub fn rank_passages(passages: &[String], terms: &[String], limit: usize) -> Vec<String> {
    let mut scored: Vec<(usize, usize, usize)> = passages
        .iter()
        .enumerate()
        .filter_map(|(index, passage)| {
            let lower = passage.to_lowercase();
            let distinct = terms.iter().filter(|t| lower.contains(t.as_str())).count();
            if distinct == 0 {
                return None;
            }
            let hits = terms
                .iter()
                .map(|t| lower.matches(t.as_str()).count())
                .sum();
            Some((distinct, hits, index))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

    scored
        .into_iter()
        .take(limit)
        .map(|(_, _, index)| passages[index].clone())
        .collect()
}

#[async_trait]
impl Tool for SearchWebsiteTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "search_website".to_string(),
            description: "Search within a specific web page for passages relevant to a query, e.g. warranty terms, specifications or promotion conditions.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "website_url": {
                        "type": "string",
                        "description": "Absolute http(s) URL of the page to search"
                    },
                    "search_query": {
                        "type": "string",
                        "minLength": 1,
                        "description": "What to look for on the page"
                    }
                },
                "required": ["website_url", "search_query"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let raw_url = parameters["website_url"]
            .as_str()
            .ok_or_else(|| ToolError::ValidationError("website_url is required".to_string()))?;
        let query = parameters["search_query"]
            .as_str()
            .ok_or_else(|| ToolError::ValidationError("search_query is required".to_string()))?;

        let terms = query_terms(query);
        if terms.is_empty() {
            return Err(ToolError::ValidationError(format!(
                "search_query '{query}' has no searchable terms"
            )));
        }

        let url = PageFetcher::parse_url(raw_url)?;
        let text = self.fetcher.fetch_text(&url).await?;

        let passages = rank_passages(&split_passages(&text), &terms, self.max_passages);
        if passages.is_empty() {
            return Err(ToolError::NotFound(format!(
                "No passages on {url} match '{query}'"
            )));
        }

        Ok(json!({
            "url": url.as_str(),
            "query": query,
            "passages": passages
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_passages_merges_short_lines() {
        let text = "Price: $199\nIn stock\n\nFree shipping";
        let passages = split_passages(text);

        assert_eq!(passages, vec!["Price: $199\nIn stock\nFree shipping"]);
    }

    #[test]
    fn test_split_passages_breaks_long_text() {
        let line = "x".repeat(400);
        let text = format!("{line}\n{line}\n{line}");
        let passages = split_passages(&text);

        assert_eq!(passages.len(), 3);
    }

    #[test]
    fn test_query_terms_drops_stop_words_and_duplicates() {
        let terms = query_terms("Warranty for the warranty and Returns");
        assert_eq!(terms, vec!["warranty", "returns"]);
    }

    #[test]
    fn test_query_terms_keeps_prices() {
        let terms = query_terms("under $1000.");
        assert_eq!(terms, vec!["under", "$1000"]);
    }

    #[test]
    fn test_rank_passages_prefers_more_distinct_terms() {
        let passages = vec![
            "Warranty: 1 year limited".to_string(),
            "Shipping takes 3 days".to_string(),
            "Extended warranty and return policy: 30 day returns".to_string(),
        ];
        let terms = query_terms("warranty returns");

        let ranked = rank_passages(&passages, &terms, 5);

        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].starts_with("Extended warranty"));
        assert!(ranked[1].starts_with("Warranty: 1 year"));
    }

    #[test]
    fn test_rank_passages_no_match() {
        let passages = vec!["Nothing relevant".to_string()];
        let ranked = rank_passages(&passages, &query_terms("warranty"), 5);
        assert!(ranked.is_empty());
    }

    proptest! {
        #[test]
        fn prop_ranked_passages_are_bounded_matching_subset(
            passages in prop::collection::vec("[a-z ]{0,40}", 0..20),
            query in "[a-z]{1,6}( [a-z]{1,6}){0,3}",
            limit in 1usize..8,
        ) {
            let terms = query_terms(&query);
            let ranked = rank_passages(&passages, &terms, limit);

            prop_assert!(ranked.len() <= limit);
            for passage in &ranked {
                prop_assert!(passages.contains(passage));
                prop_assert!(terms.iter().any(|t| passage.contains(t.as_str())));
            }
        }

        #[test]
        fn prop_split_passages_preserves_content(
            lines in prop::collection::vec("[a-z]{1,80}", 0..30),
        ) {
            let text = lines.join("\n");
            let passages = split_passages(&text);
            let rejoined: Vec<&str> = passages.iter().flat_map(|p| p.lines()).collect();
            let original: Vec<&str> = lines.iter().map(String::as_str).collect();
            prop_assert_eq!(rejoined, original);
        }
    }
}
