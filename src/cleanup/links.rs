use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;

pub const DEFAULT_UNSUBSCRIBE_PATTERNS: &[&str] =
    &["unsubscribe", "opt.?out", "subscription.*preferences"];

/// Gmail marks provider-verified redirect links with this attribute.
pub const DEFAULT_REDIRECT_MARKER: &str = "data-saferedirecturl";

/// Finds candidate unsubscribe URLs in a message body.
///
/// An anchor's `href` is kept when its visible text matches one of the
/// patterns (case-insensitive) or when it carries the redirect marker
/// attribute. Either signal alone is enough.
///
/// Only HTML anchors are considered: bare URLs in plain-text bodies are not
/// detected.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    patterns: Vec<Regex>,
    marker: String,
}

impl LinkExtractor {
    pub fn new<S: AsRef<str>>(patterns: &[S], marker: impl Into<String>) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid unsubscribe pattern '{}'", p.as_ref()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            marker: marker.into(),
        })
    }

    pub fn extract(&self, body: &str) -> BTreeSet<String> {
        let mut links = BTreeSet::new();
        if body.trim().is_empty() {
            return links;
        }

        let Ok(anchor_sel) = Selector::parse("a[href]") else {
            return links;
        };

        let document = Html::parse_document(body);
        for anchor in document.select(&anchor_sel) {
            let href = anchor.value().attr("href").unwrap_or("");
            if href.is_empty() {
                continue;
            }
            if self.has_marker(anchor) || self.text_matches(anchor) {
                links.insert(href.to_string());
            }
        }
        links
    }

    fn has_marker(&self, anchor: ElementRef<'_>) -> bool {
        !self.marker.is_empty() && anchor.value().attr(&self.marker).is_some()
    }

    fn text_matches(&self, anchor: ElementRef<'_>) -> bool {
        let text = visible_text(anchor);
        if text.is_empty() {
            return false;
        }
        self.patterns.iter().any(|re| re.is_match(&text))
    }
}

impl Default for LinkExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_UNSUBSCRIBE_PATTERNS, DEFAULT_REDIRECT_MARKER)
            .expect("default unsubscribe patterns compile")
    }
}

fn visible_text(elem: ElementRef<'_>) -> String {
    elem.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
