//! Web page fetching with crude HTML-to-text reduction.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde_json::json;

use super::{truncate_output, Tool, ToolFuture};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_LIMIT_CHARS: usize = 30_000;
const USER_AGENT: &str = concat!("olu-agent/", env!("CARGO_PKG_VERSION"));

pub struct FetchWebPageTool {
    http: reqwest::Client,
}

impl FetchWebPageTool {
    pub fn new() -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("failed to build http client: {e}"))?;
        Ok(Self { http })
    }
}

impl Tool for FetchWebPageTool {
    fn name(&self) -> &str {
        "fetch_webpage"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its content as plain text (HTML markup stripped)."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "The URL to fetch"}
            },
            "required": ["url"]
        })
    }

    fn call(&self, args: serde_json::Value) -> ToolFuture {
        let http = self.http.clone();
        Box::pin(async move {
            let url = args
                .get("url")
                .and_then(|v| v.as_str())
                .ok_or("missing required argument 'url'")?
                .to_string();

            let response = http
                .get(&url)
                .send()
                .await
                .map_err(|e| format!("could not fetch {url}: {e}"))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| format!("could not read body of {url}: {e}"))?;

            let text = if looks_like_html(&body) { html_to_text(&body) } else { body };
            let text = format!("[Status {}]\n{}", status.as_u16(), text.trim());

            Ok(truncate_output(text, PAGE_LIMIT_CHARS, "page"))
        })
    }
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start().get(..256).unwrap_or(body.trim_start());
    let head = head.to_lowercase();
    head.starts_with("<!doctype html") || head.contains("<html")
}

/// Strip scripts, styles, and tags; collapse the leftover whitespace.
/// Good enough for a model to read, not a real HTML parser.
fn html_to_text(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static STYLE: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    static BLANK: OnceLock<Regex> = OnceLock::new();

    let script = SCRIPT.get_or_init(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap());
    let style = STYLE.get_or_init(|| Regex::new(r"(?is)<style\b.*?</style>").unwrap());
    let tag = TAG.get_or_init(|| Regex::new(r"(?s)<[^>]+>").unwrap());
    let blank = BLANK.get_or_init(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());

    let text = script.replace_all(html, " ");
    let text = style.replace_all(&text, " ");
    let text = tag.replace_all(&text, "\n");

    let text: String = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    blank.replace_all(&text, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_styles_and_tags() {
        let html = r#"<!DOCTYPE html><html><head>
            <style>body { color: red; }</style>
            <script>alert("hi");</script>
            </head><body><h1>Title</h1><p>Some <b>bold</b> text.</p></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("Title"));
        assert!(text.contains("bold"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn html_detection() {
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(looks_like_html("  <html lang=\"en\">"));
        assert!(!looks_like_html("{\"json\": true}"));
        assert!(!looks_like_html("plain text body"));
    }

    #[test]
    fn plain_text_survives_unchanged() {
        let text = html_to_text("line one\nline two");
        assert_eq!(text, "line one\nline two");
    }
}
