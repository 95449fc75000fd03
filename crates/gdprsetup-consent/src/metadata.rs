//! Page metadata carrying the compiled policy.

use serde::Serialize;

use crate::csp::CSP_HEADER;

/// Name of the metadata entry pages expose the policy under.
pub const METADATA_KEY: &str = "gdprCSP";

/// One `<meta http-equiv>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub http_equiv: String,
    pub content: String,
}

impl PageMetadata {
    pub fn for_csp(csp: impl Into<String>) -> Self {
        Self {
            http_equiv: CSP_HEADER.to_string(),
            content: csp.into(),
        }
    }

    /// `{ "gdprCSP": { "http_equiv": ..., "content": ... } }`
    pub fn to_entry(&self) -> serde_json::Value {
        serde_json::json!({ METADATA_KEY: self })
    }

    pub fn to_meta_tag(&self) -> String {
        format!(
            r#"<meta http-equiv="{}" content="{}">"#,
            escape_attr(&self.http_equiv),
            escape_attr(&self.content)
        )
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
