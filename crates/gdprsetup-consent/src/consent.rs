//! Consent evaluation — stored visitor choices reconciled with category defaults.

use std::collections::BTreeMap;

use gdprsetup_core::PolicyCategory;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::csp::{compile_csp, compile_header_csp};

/// Visitor decisions keyed by consent key. Absent keys are undecided.
pub type ConsentRecord = BTreeMap<String, bool>;

/// Why a stored consent blob produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "lowercase")]
pub enum EmptyReason {
    /// No cookie was sent.
    Absent,
    /// The cookie could not be read as a `{ key: bool }` object.
    Malformed(String),
}

/// Result of reading the stored consent blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredConsent {
    Parsed(ConsentRecord),
    Empty(EmptyReason),
}

impl StoredConsent {
    /// The parsed record, or an empty one.
    pub fn into_record(self) -> ConsentRecord {
        match self {
            Self::Parsed(record) => record,
            Self::Empty(_) => ConsentRecord::new(),
        }
    }

    pub fn empty_reason(&self) -> Option<&EmptyReason> {
        match self {
            Self::Parsed(_) => None,
            Self::Empty(reason) => Some(reason),
        }
    }
}

/// Read a stored consent blob, keeping the failure reason.
pub fn try_parse_stored_consent(raw: Option<&str>) -> StoredConsent {
    let Some(raw) = raw else {
        return StoredConsent::Empty(EmptyReason::Absent);
    };
    match serde_json::from_str::<ConsentRecord>(raw) {
        Ok(record) => StoredConsent::Parsed(record),
        Err(e) => {
            debug!("Discarding malformed stored consent: {}", e);
            StoredConsent::Empty(EmptyReason::Malformed(e.to_string()))
        }
    }
}

/// Read a stored consent blob. Never fails: anything unreadable is an empty record.
pub fn parse_stored_consent(raw: Option<&str>) -> ConsentRecord {
    try_parse_stored_consent(raw).into_record()
}

/// Each category's default posture.
pub fn default_consents(categories: Option<&[PolicyCategory]>) -> ConsentRecord {
    categories
        .unwrap_or_default()
        .iter()
        .map(|c| (c.consent_key.clone(), c.default_granted))
        .collect()
}

/// Fully populated consent map: stored decisions, plus defaults for every
/// configured category the visitor has not decided on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectiveConsent(ConsentRecord);

impl EffectiveConsent {
    pub fn is_granted(&self, consent_key: &str) -> bool {
        self.0.get(consent_key).copied().unwrap_or(false)
    }

    pub fn get(&self, consent_key: &str) -> Option<bool> {
        self.0.get(consent_key).copied()
    }

    pub fn as_record(&self) -> &ConsentRecord {
        &self.0
    }

    pub fn into_record(self) -> ConsentRecord {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Overlay the stored record on the category defaults.
///
/// Stored keys that are no longer configured are kept. Neither input is
/// modified, so the result is the same however often it is recomputed.
pub fn resolve_effective_consent(
    stored: &ConsentRecord,
    categories: &[PolicyCategory],
) -> EffectiveConsent {
    let resolved = categories.iter().fold(stored.clone(), |mut acc, category| {
        acc.entry(category.consent_key.clone())
            .or_insert(category.default_granted);
        acc
    });
    EffectiveConsent(resolved)
}

/// Serialized effective consent, for the cookie and the client bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedConsent {
    Encoded(String),
    Fallback { reason: String },
}

impl EncodedConsent {
    /// The JSON text, `{}` when encoding failed.
    pub fn as_json(&self) -> &str {
        match self {
            Self::Encoded(json) => json,
            Self::Fallback { .. } => "{}",
        }
    }
}

pub fn encode_consent(effective: &EffectiveConsent) -> EncodedConsent {
    match serde_json::to_string(effective) {
        Ok(json) => EncodedConsent::Encoded(json),
        Err(e) => {
            warn!("Failed to encode effective consent: {}", e);
            EncodedConsent::Fallback {
                reason: e.to_string(),
            }
        }
    }
}

/// Outcome of evaluating one visitor's stored consent.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Set when the stored blob was absent or unreadable.
    pub empty_reason: Option<EmptyReason>,
    pub effective: EffectiveConsent,
    pub csp: String,
    /// `csp` restricted to fragments that are valid header text.
    pub header_csp: String,
}

/// Evaluates visitor consent against an ordered category list.
#[derive(Debug, Clone, Default)]
pub struct ConsentEvaluator {
    categories: Vec<PolicyCategory>,
}

impl ConsentEvaluator {
    pub fn new(categories: Vec<PolicyCategory>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[PolicyCategory] {
        &self.categories
    }

    pub fn defaults(&self) -> ConsentRecord {
        default_consents(Some(&self.categories))
    }

    /// Parse, reconcile and compile in one pass.
    pub fn evaluate(&self, raw: Option<&str>) -> Evaluation {
        let stored = try_parse_stored_consent(raw);
        let empty_reason = stored.empty_reason().cloned();
        let effective = resolve_effective_consent(&stored.into_record(), &self.categories);
        let csp = compile_csp(&effective, &self.categories);
        let header_csp = compile_header_csp(&effective, &self.categories);
        Evaluation {
            empty_reason,
            effective,
            csp,
            header_csp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<PolicyCategory> {
        vec![
            PolicyCategory::new("analytics", "connect-src a.example", false),
            PolicyCategory::new("ads", "img-src b.example", true),
        ]
    }

    fn record(entries: &[(&str, bool)]) -> ConsentRecord {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_parse_valid_record() {
        let parsed = parse_stored_consent(Some(r#"{"ads":false,"analytics":true}"#));
        assert_eq!(parsed, record(&[("ads", false), ("analytics", true)]));
    }

    #[test]
    fn test_parse_malformed_is_empty() {
        assert!(parse_stored_consent(Some("not-json")).is_empty());
        assert!(parse_stored_consent(None).is_empty());
        assert!(parse_stored_consent(Some("")).is_empty());
        assert!(parse_stored_consent(Some("[true, false]")).is_empty());
        assert!(parse_stored_consent(Some(r#"{"ads":"yes"}"#)).is_empty());
        assert!(parse_stored_consent(Some("null")).is_empty());
    }

    #[test]
    fn test_parse_reasons() {
        assert_eq!(
            try_parse_stored_consent(None),
            StoredConsent::Empty(EmptyReason::Absent)
        );
        assert!(matches!(
            try_parse_stored_consent(Some("{")),
            StoredConsent::Empty(EmptyReason::Malformed(_))
        ));
        assert_eq!(
            try_parse_stored_consent(Some("{}")),
            StoredConsent::Parsed(ConsentRecord::new())
        );
    }

    #[test]
    fn test_default_consents() {
        let cats = categories();
        assert_eq!(
            default_consents(Some(&cats)),
            record(&[("analytics", false), ("ads", true)])
        );
        assert!(default_consents(None).is_empty());
    }

    #[test]
    fn test_fallback_completeness() {
        let cats = categories();
        let stored = record(&[("analytics", true)]);
        let effective = resolve_effective_consent(&stored, &cats);
        for category in &cats {
            let expected = stored
                .get(&category.consent_key)
                .copied()
                .unwrap_or(category.default_granted);
            assert_eq!(effective.get(&category.consent_key), Some(expected));
        }
    }

    #[test]
    fn test_resolution_does_not_touch_input() {
        let stored = record(&[("analytics", true)]);
        let before = stored.clone();
        let _ = resolve_effective_consent(&stored, &categories());
        assert_eq!(stored, before);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let cats = categories();
        let stored = record(&[("ads", false)]);
        let first = resolve_effective_consent(&stored, &cats);
        let second = resolve_effective_consent(&stored, &cats);
        assert_eq!(first, second);
        assert_eq!(resolve_effective_consent(first.as_record(), &cats), first);
    }

    #[test]
    fn test_unknown_stored_keys_are_kept() {
        let effective =
            resolve_effective_consent(&record(&[("retired", true)]), &categories());
        assert_eq!(effective.get("retired"), Some(true));
        assert_eq!(effective.len(), 3);
    }

    #[test]
    fn test_stored_ads_denied() {
        let evaluation = ConsentEvaluator::new(categories()).evaluate(Some(r#"{"ads": false}"#));
        assert_eq!(
            evaluation.effective.as_record(),
            &record(&[("analytics", false), ("ads", false)])
        );
        assert_eq!(evaluation.csp, ";");
        assert_eq!(evaluation.empty_reason, None);
    }

    #[test]
    fn test_no_stored_record() {
        let evaluation = ConsentEvaluator::new(categories()).evaluate(None);
        assert_eq!(
            evaluation.effective.as_record(),
            &record(&[("analytics", false), ("ads", true)])
        );
        assert_eq!(evaluation.csp, "img-src b.example ;");
        assert_eq!(evaluation.header_csp, evaluation.csp);
        assert_eq!(evaluation.empty_reason, Some(EmptyReason::Absent));
    }

    #[test]
    fn test_malformed_cookie_degrades_to_defaults() {
        let evaluation = ConsentEvaluator::new(categories()).evaluate(Some("%7Bbroken"));
        assert!(matches!(evaluation.empty_reason, Some(EmptyReason::Malformed(_))));
        assert_eq!(evaluation.csp, "img-src b.example ;");
    }

    #[test]
    fn test_no_categories() {
        let evaluator = ConsentEvaluator::default();
        assert!(evaluator.defaults().is_empty());
        let evaluation = evaluator.evaluate(None);
        assert!(evaluation.effective.is_empty());
        assert_eq!(evaluation.csp, ";");
    }

    #[test]
    fn test_encode_consent() {
        let effective = resolve_effective_consent(&ConsentRecord::new(), &categories());
        let encoded = encode_consent(&effective);
        assert_eq!(encoded.as_json(), r#"{"ads":true,"analytics":false}"#);
        assert_eq!(
            encode_consent(&EffectiveConsent::default()),
            EncodedConsent::Encoded("{}".into())
        );
    }
}
