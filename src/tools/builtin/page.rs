//! Page fetching and readable-text extraction shared by the website tools
//!
//! Pages are fetched with a size cap, run through Mozilla Readability
//! (article_scraper) and flattened to plain text. When Readability cannot make
//! sense of a page the tag-stripping extractor is used instead.

use crate::config::ToolsSection;
use crate::tools::ToolError;
use article_scraper::Readability;
use reqwest::StatusCode;
use url::Url;

/// HTTP client plus extraction settings for website tools
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    max_response_size: usize,
}

impl PageFetcher {
    pub fn new(config: &ToolsSection) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("shopsurfer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            max_response_size: config.max_response_size,
        })
    }

    /// Validate that a tool argument is an absolute http(s) URL (pure function)
    pub fn parse_url(raw: &str) -> Result<Url, ToolError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ToolError::ValidationError(format!("Invalid URL '{raw}': {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ToolError::ValidationError(format!(
                "Unsupported URL scheme '{scheme}'"
            ))),
        }
    }

    /// Fetch a page and return its readable text
    pub async fn fetch_text(&self, url: &Url) -> Result<String, ToolError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(ToolError::from_request_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(ToolError::NotFound(format!("{url} returned {status}")));
        }
        if !status.is_success() {
            return Err(ToolError::ApiError {
                status: status.as_u16(),
                message: format!("Fetching {url} failed"),
            });
        }

        if let Some(length) = response.content_length() {
            self.check_size(length as usize)?;
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(true);

        let body = response
            .text()
            .await
            .map_err(ToolError::from_request_error)?;
        self.check_size(body.len())?;

        let text = if is_html {
            extract_readable_text(&body, url).await
        } else {
            body.trim().to_string()
        };

        if text.is_empty() {
            return Err(ToolError::NotFound(format!("{url} has no readable content")));
        }

        Ok(text)
    }

    fn check_size(&self, size: usize) -> Result<(), ToolError> {
        if size > self.max_response_size {
            return Err(ToolError::ExecutionError(format!(
                "Response too large: {} bytes (max: {})",
                size, self.max_response_size
            )));
        }
        Ok(())
    }
}

/// Extract article text with Readability, falling back to tag stripping
pub async fn extract_readable_text(html: &str, url: &Url) -> String {
    // article_scraper can panic on malformed markup, so it runs isolated
    let html_owned = html.to_string();
    let base_url = url.clone();
    let result = tokio::task::spawn_blocking(move || {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tokio::runtime::Handle::current()
                .block_on(async { Readability::extract(&html_owned, Some(base_url)).await })
        }))
    })
    .await;

    match result {
        Ok(Ok(Ok(article_html))) => {
            let text = html_to_text(&article_html);
            if text.is_empty() {
                html_to_text(html)
            } else {
                text
            }
        }
        Ok(Ok(Err(e))) => {
            tracing::debug!("Readability extraction failed for {url}: {e}, using fallback");
            html_to_text(html)
        }
        Ok(Err(_panic)) => {
            tracing::warn!("Readability panicked on {url}, using fallback extraction");
            html_to_text(html)
        }
        Err(e) => {
            tracing::warn!("Extraction task failed: {}", e);
            html_to_text(html)
        }
    }
}

const BLOCK_TAGS: &[&str] = &[
    "div", "p", "br", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "td", "th", "section",
    "article", "table", "ul", "ol",
];

/// Strip tags, scripts and styles from HTML (pure function)
pub fn html_to_text(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    let mut skip_depth = 0usize;
    let mut tag = String::new();

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let trimmed = tag.trim();
                let (closing, rest) = match trimmed.strip_prefix('/') {
                    Some(rest) => (true, rest),
                    None => (false, trimmed),
                };
                let bare = rest
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("")
                    .to_lowercase();

                if matches!(bare.as_str(), "script" | "style" | "noscript") {
                    if closing {
                        skip_depth = skip_depth.saturating_sub(1);
                    } else {
                        skip_depth += 1;
                    }
                } else if BLOCK_TAGS.contains(&bare.as_str()) {
                    result.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ if skip_depth > 0 => {}
            c if c.is_whitespace() => {
                if !result.ends_with(' ') && !result.ends_with('\n') {
                    result.push(' ');
                }
            }
            c => result.push(c),
        }
    }

    decode_entities(&result)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_strips_markup() {
        let html = "<html><body><h1>Title</h1><p>Paragraph</p><script>code()</script></body></html>";
        let text = html_to_text(html);

        assert!(text.contains("Title"));
        assert!(text.contains("Paragraph"));
        assert!(!text.contains("code()"));
        assert!(!text.contains("<h1>"));
    }

    #[test]
    fn test_html_to_text_handles_attributes() {
        let html = r#"<div class="price"><span>$199</span></div><div id="x">In stock</div>"#;
        let text = html_to_text(html);

        assert_eq!(text, "$199\nIn stock");
    }

    #[test]
    fn test_html_to_text_removes_styles_with_attributes() {
        let html = r#"<style type="text/css">body { color: red; }</style><p>Visible</p>"#;
        let text = html_to_text(html);

        assert_eq!(text, "Visible");
    }

    #[test]
    fn test_html_to_text_decodes_entities() {
        let text = html_to_text("<p>Tom &amp; Jerry&nbsp;&lt;3</p>");
        assert_eq!(text, "Tom & Jerry <3");
    }

    #[test]
    fn test_parse_url_rejects_non_http() {
        assert!(PageFetcher::parse_url("https://example.com/product").is_ok());
        assert!(matches!(
            PageFetcher::parse_url("ftp://example.com"),
            Err(ToolError::ValidationError(_))
        ));
        assert!(matches!(
            PageFetcher::parse_url("not a url"),
            Err(ToolError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_readable_text_keeps_article_body() {
        let html = r#"
            <!DOCTYPE html>
            <html>
            <head><title>Review</title></head>
            <body>
                <article>
                    <h1>Espresso Machine Review</h1>
                    <p>The machine heats up in thirty seconds and holds temperature well.</p>
                    <p>Steam pressure is strong enough for latte art.</p>
                </article>
            </body>
            </html>
        "#;
        let url = Url::parse("https://example.com/review").unwrap();

        let text = extract_readable_text(html, &url).await;

        assert!(text.contains("heats up in thirty seconds"));
        assert!(!text.contains('<'));
    }
}
