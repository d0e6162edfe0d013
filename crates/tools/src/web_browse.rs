//! Web browse tool — fetch a page and return its readable text.
//!
//! The response body is stripped of `<script>`/`<style>` blocks, then of all
//! remaining tags; whitespace collapses to single spaces and the result is
//! capped at 20 000 characters.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tamalebot_core::{PolicyAction, Tool, ToolOutcome};
use tracing::debug;

use crate::args::req_str;

const MAX_PAGE_CHARS: usize = 20_000;
const FETCH_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "tamalebot/0.3 (+https://github.com/tamalebot/tamalebot)";

pub struct WebBrowseTool {
    client: reqwest::Client,
    script_re: Regex,
    style_re: Regex,
    tag_re: Regex,
    whitespace_re: Regex,
}

impl WebBrowseTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            script_re: Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("static pattern"),
            style_re: Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("static pattern"),
            tag_re: Regex::new(r"<[^>]+>").expect("static pattern"),
            whitespace_re: Regex::new(r"\s+").expect("static pattern"),
        }
    }

    /// Reduce an HTML body to collapsed plain text.
    fn extract_text(&self, html: &str) -> String {
        let no_scripts = self.script_re.replace_all(html, " ");
        let no_styles = self.style_re.replace_all(&no_scripts, " ");
        let no_tags = self.tag_re.replace_all(&no_styles, " ");
        let collapsed = self.whitespace_re.replace_all(&no_tags, " ");
        let trimmed = collapsed.trim();
        trimmed.chars().take(MAX_PAGE_CHARS).collect()
    }
}

impl Default for WebBrowseTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebBrowseTool {
    fn name(&self) -> &str {
        "web_browse"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return the page's readable text content (scripts, styles, and markup removed)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    fn action(&self, input: &Map<String, Value>) -> Result<(PolicyAction, String), String> {
        let url = req_str(input, "url")?;
        Ok((PolicyAction::HttpRequest, url.to_string()))
    }

    async fn perform(&self, input: &Map<String, Value>) -> ToolOutcome {
        let url = match req_str(input, "url") {
            Ok(u) => u,
            Err(e) => return ToolOutcome::error(e),
        };

        debug!(url, "Fetching page");

        let response = match self
            .client
            .get(url)
            .header("Accept", "text/html, text/plain;q=0.9, */*;q=0.5")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return ToolOutcome::error(format!("Fetch failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            return ToolOutcome::error(format!("HTTP {} fetching {url}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) => ToolOutcome::ok(self.extract_text(&body)),
            Err(e) => ToolOutcome::error(format!("Failed to read response body: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_styles_and_tags() {
        let tool = WebBrowseTool::new();
        let html = r#"
            <html><head>
              <style>body { color: red; }</style>
              <script>alert("evil");</script>
            </head>
            <body><h1>Title</h1><p>Some   <b>bold</b>
            text.</p></body></html>
        "#;
        let text = tool.extract_text(html);
        assert_eq!(text, "Title Some bold text.");
        assert!(!text.contains("alert"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn multiline_script_blocks_are_removed() {
        let tool = WebBrowseTool::new();
        let html = "<script>\nlet a = 1;\nlet b = 2;\n</script>visible";
        assert_eq!(tool.extract_text(html), "visible");
    }

    #[test]
    fn output_is_capped_at_20k_chars() {
        let tool = WebBrowseTool::new();
        let html = format!("<p>{}</p>", "word ".repeat(10_000));
        let text = tool.extract_text(&html);
        assert!(text.chars().count() <= MAX_PAGE_CHARS);
    }

    #[test]
    fn action_targets_the_url() {
        let tool = WebBrowseTool::new();
        let mut input = Map::new();
        input.insert("url".into(), serde_json::json!("https://example.com/page"));
        let (action, target) = tool.action(&input).unwrap();
        assert_eq!(action, PolicyAction::HttpRequest);
        assert_eq!(target, "https://example.com/page");
    }
}
