use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Node, Selector};

use crate::error::{LinklyticsError, Result};

/// Pulls a post's body text out of its rendered page.
pub trait ContentExtractor: Send + Sync {
    /// `None` when the page has no post region (login wall, deleted post, ...).
    /// A region with no text yields an empty string.
    fn extract(&self, html: &str) -> Option<String>;
}

/// Body text of the first element matching a CSS selector.
pub struct SelectorExtractor {
    selector: Selector,
}

impl SelectorExtractor {
    pub fn new(css: &str) -> Result<Self> {
        let selector = Selector::parse(css)
            .map_err(|e| LinklyticsError::Config(format!("invalid content selector {:?}: {}", css, e)))?;
        Ok(Self { selector })
    }
}

impl ContentExtractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let region = document.select(&self.selector).next()?;

        // <br> is the only line break the post renderer emits besides raw newlines.
        let mut raw = String::new();
        for node in region.descendants() {
            match node.value() {
                Node::Text(text) => raw.push_str(text),
                Node::Element(el) if el.name() == "br" => raw.push('\n'),
                _ => {}
            }
        }

        Some(clean_lines(&raw))
    }
}

// Source indentation and non-breaking spaces inside a line.
static INLINE_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x{a0}]+").unwrap());

/// Trim each line and squeeze its inner spacing, keeping the line structure intact.
fn clean_lines(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .split('\n')
        .map(|line| INLINE_SPACE_RE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
