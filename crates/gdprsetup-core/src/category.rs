//! Consent categories and their CSP fragments.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// A named class of tracking/embedding behaviour the visitor can allow.
///
/// Serialized with the plugin's original keys:
/// `{ "consent": "analytics", "policy": "connect-src a.example", "default": false }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCategory {
    /// Unique consent key, also the key in the visitor's consent cookie.
    #[serde(rename = "consent")]
    pub consent_key: String,
    /// CSP directive fragment emitted when the category is granted. May be empty.
    #[serde(rename = "policy", default)]
    pub csp_fragment: String,
    /// Posture used when the visitor has not decided on this category yet.
    #[serde(rename = "default", default)]
    pub default_granted: bool,
}

impl PolicyCategory {
    pub fn new(
        consent_key: impl Into<String>,
        csp_fragment: impl Into<String>,
        default_granted: bool,
    ) -> Self {
        Self {
            consent_key: consent_key.into(),
            csp_fragment: csp_fragment.into(),
            default_granted,
        }
    }

    /// The fragment with whitespace runs (line breaks included) collapsed to
    /// single spaces and the ends trimmed, or `None` if nothing remains.
    pub fn normalized_fragment(&self) -> Option<String> {
        let fragment = self.csp_fragment.split_whitespace().collect::<Vec<_>>().join(" ");
        (!fragment.is_empty()).then_some(fragment)
    }
}

/// Deserialize a category list leniently.
///
/// A missing value or anything that is not an array yields an empty list;
/// array entries that do not form a category are skipped.
pub fn deserialize_categories<'de, D>(deserializer: D) -> Result<Vec<PolicyCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(categories_from_value(value))
}

/// Build a category list from an arbitrary JSON value. See [`deserialize_categories`].
pub fn categories_from_value(value: serde_json::Value) -> Vec<PolicyCategory> {
    match value {
        serde_json::Value::Array(entries) => entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                match serde_json::from_value::<PolicyCategory>(entry) {
                    Ok(category) => Some(category),
                    Err(e) => {
                        warn!("Skipping consent category #{}: {}", index, e);
                        None
                    }
                }
            })
            .collect(),
        serde_json::Value::Null => Vec::new(),
        other => {
            warn!(
                "Consent policy list is not an array (got {}), treating as empty",
                json_kind(&other)
            );
            Vec::new()
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_original_keys() {
        let category: PolicyCategory = serde_json::from_value(json!({
            "consent": "analytics",
            "policy": "connect-src a.example",
            "default": true,
        }))
        .unwrap();
        assert_eq!(category, PolicyCategory::new("analytics", "connect-src a.example", true));
    }

    #[test]
    fn test_missing_policy_and_default() {
        let category: PolicyCategory =
            serde_json::from_value(json!({ "consent": "essential" })).unwrap();
        assert_eq!(category.csp_fragment, "");
        assert!(!category.default_granted);
        assert_eq!(category.normalized_fragment(), None);
    }

    #[test]
    fn test_normalized_fragment() {
        let category = PolicyCategory::new("ads", "  img-src b.example \n", true);
        assert_eq!(category.normalized_fragment().as_deref(), Some("img-src b.example"));
        assert_eq!(PolicyCategory::new("x", "   ", true).normalized_fragment(), None);
    }

    #[test]
    fn test_multi_line_fragment_is_joined() {
        let category = PolicyCategory::new(
            "video",
            "frame-src  https://a.example;\r\n\tscript-src\nhttps://b.example",
            true,
        );
        assert_eq!(
            category.normalized_fragment().as_deref(),
            Some("frame-src https://a.example; script-src https://b.example")
        );
    }

    #[test]
    fn test_non_array_list_is_empty() {
        assert!(categories_from_value(json!("analytics")).is_empty());
        assert!(categories_from_value(json!({ "consent": "ads" })).is_empty());
        assert!(categories_from_value(serde_json::Value::Null).is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let list = categories_from_value(json!([
            { "consent": "analytics", "policy": "connect-src a.example" },
            { "policy": "img-src nowhere.example" },
            42,
            { "consent": "ads", "policy": "img-src b.example", "default": true },
        ]));
        let keys: Vec<_> = list.iter().map(|c| c.consent_key.as_str()).collect();
        assert_eq!(keys, vec!["analytics", "ads"]);
    }
}
