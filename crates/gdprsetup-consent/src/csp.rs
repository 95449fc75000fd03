//! Content-Security-Policy compilation.

use gdprsetup_core::PolicyCategory;
use tracing::warn;

use crate::consent::EffectiveConsent;

/// Header / meta `http-equiv` name the compiled policy is attached under.
pub const CSP_HEADER: &str = "Content-Security-Policy";

/// Concatenate the fragments of granted categories, in declaration order.
///
/// Every emitted fragment has its whitespace runs collapsed to single spaces
/// and is followed by one space, and the result always ends with `;`. With
/// nothing granted the policy is `";"`. Repeated directives are passed
/// through as-is.
pub fn compile_csp(effective: &EffectiveConsent, categories: &[PolicyCategory]) -> String {
    compile(effective, categories, |_| true)
}

/// Like [`compile_csp`], but leaves out fragments that cannot travel in an
/// HTTP header (anything outside visible ASCII), so the header is always
/// sent. A dropped fragment only blocks what its category would have allowed.
pub fn compile_header_csp(effective: &EffectiveConsent, categories: &[PolicyCategory]) -> String {
    compile(effective, categories, |fragment| {
        let safe = is_header_safe(fragment);
        if !safe {
            warn!("Leaving non-ASCII CSP fragment out of the header: {}", fragment);
        }
        safe
    })
}

fn compile(
    effective: &EffectiveConsent,
    categories: &[PolicyCategory],
    keep: impl Fn(&str) -> bool,
) -> String {
    let mut policy = String::new();
    for category in categories {
        if !effective.is_granted(&category.consent_key) {
            continue;
        }
        if let Some(fragment) = category.normalized_fragment() {
            if keep(&fragment) {
                policy.push_str(&fragment);
                policy.push(' ');
            }
        }
    }
    policy.push(';');
    policy
}

fn is_header_safe(fragment: &str) -> bool {
    fragment.bytes().all(|b| (0x20..0x7f).contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::{resolve_effective_consent, ConsentRecord};

    fn effective(entries: &[(&str, bool)]) -> EffectiveConsent {
        let record: ConsentRecord = entries.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        resolve_effective_consent(&record, &[])
    }

    #[test]
    fn test_declaration_order() {
        let categories = vec![
            PolicyCategory::new("video", "frame-src https://www.youtube.com", false),
            PolicyCategory::new("analytics", "connect-src a.example", false),
            PolicyCategory::new("ads", "img-src b.example", false),
        ];
        let granted = effective(&[("ads", true), ("video", true), ("analytics", true)]);
        assert_eq!(
            compile_csp(&granted, &categories),
            "frame-src https://www.youtube.com connect-src a.example img-src b.example ;"
        );
    }

    #[test]
    fn test_denied_and_empty_fragments_skipped() {
        let categories = vec![
            PolicyCategory::new("essential", "", true),
            PolicyCategory::new("analytics", "connect-src a.example", false),
            PolicyCategory::new("ads", "  img-src b.example  ", true),
            PolicyCategory::new("blank", "   ", true),
        ];
        let consent = effective(&[
            ("essential", true),
            ("analytics", false),
            ("ads", true),
            ("blank", true),
        ]);
        assert_eq!(compile_csp(&consent, &categories), "img-src b.example ;");
    }

    #[test]
    fn test_empty_policy_is_terminated() {
        assert_eq!(compile_csp(&EffectiveConsent::default(), &[]), ";");
        let categories = vec![PolicyCategory::new("ads", "img-src b.example", true)];
        assert_eq!(compile_csp(&effective(&[("ads", false)]), &categories), ";");
    }

    #[test]
    fn test_undecided_category_is_not_granted() {
        let categories = vec![PolicyCategory::new("ads", "img-src b.example", true)];
        assert_eq!(compile_csp(&EffectiveConsent::default(), &categories), ";");
    }

    #[test]
    fn test_repeated_directives_not_merged() {
        let categories = vec![
            PolicyCategory::new("a", "script-src a.example;", false),
            PolicyCategory::new("b", "script-src b.example;", false),
        ];
        let consent = effective(&[("a", true), ("b", true)]);
        assert_eq!(
            compile_csp(&consent, &categories),
            "script-src a.example; script-src b.example; ;"
        );
    }

    #[test]
    fn test_multi_line_fragment() {
        let categories = vec![PolicyCategory::new(
            "ads",
            "img-src b.example;\nscript-src c.example",
            true,
        )];
        let consent = effective(&[("ads", true)]);
        assert_eq!(
            compile_csp(&consent, &categories),
            "img-src b.example; script-src c.example ;"
        );
        assert_eq!(
            compile_header_csp(&consent, &categories),
            compile_csp(&consent, &categories)
        );
    }

    #[test]
    fn test_header_policy_skips_non_ascii_fragments() {
        let categories = vec![
            PolicyCategory::new("books", "img-src bücher.example", true),
            PolicyCategory::new("ads", "img-src b.example", true),
        ];
        let consent = effective(&[("books", true), ("ads", true)]);
        assert_eq!(
            compile_csp(&consent, &categories),
            "img-src bücher.example img-src b.example ;"
        );
        assert_eq!(compile_header_csp(&consent, &categories), "img-src b.example ;");
    }

    #[test]
    fn test_unconfigured_keys_emit_nothing() {
        let categories = vec![PolicyCategory::new("ads", "img-src b.example", false)];
        assert_eq!(compile_csp(&effective(&[("retired", true)]), &categories), ";");
    }
}
