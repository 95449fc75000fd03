//! Client bootstrap payload for the consent popup script.

use gdprsetup_core::SiteConfig;
use serde::Serialize;
use tracing::warn;

use crate::consent::EffectiveConsent;
use crate::fingerprint::PolicyVersion;

/// Global the settings object is assigned to in the page.
pub const SETTINGS_VAR: &str = "gdprPrivacySetupPluginSettings";
/// Entry point of the client script.
pub const INIT_CALL: &str = "gdprPrivacySetupPlugin.init";

/// Settings object consumed by the client-side consent script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientBootstrap {
    pub setup_page: String,
    pub setup_consent: String,
    pub deny_consent: String,
    pub input_prefix: String,
    pub modal_content_id: String,
    pub cookie_name: String,
    pub privacy_settings_button_class: String,
    pub accept_btn_class: String,
    pub deny_btn_class: String,
    pub deny_redirection_target: String,
    pub defer_info_popup: u64,
    pub consent_expires: u32,
    pub policy_version: String,
    pub user_consent: EffectiveConsent,
}

impl ClientBootstrap {
    pub fn new(config: &SiteConfig, version: &PolicyVersion, effective: EffectiveConsent) -> Self {
        Self {
            setup_page: config.privacy_page_route.clone(),
            setup_consent: config.consent_button_text.clone(),
            deny_consent: config.deny_button_text.clone(),
            input_prefix: config.input_prefix.clone(),
            modal_content_id: config.modal_window_id.clone(),
            cookie_name: version.cookie_name(),
            privacy_settings_button_class: config.privacy_settings_btn_class.clone(),
            accept_btn_class: config.consent_button_class.clone(),
            deny_btn_class: config.deny_button_class.clone(),
            deny_redirection_target: config.deny_redirection_target.clone(),
            defer_info_popup: config.defer_info_popup_time,
            consent_expires: config.consent_expires_time,
            policy_version: version.fingerprint.clone(),
            user_consent: effective,
        }
    }

    /// Settings as JSON. If the consent map cannot be encoded the payload is
    /// sent with an empty `userConsent` instead.
    pub fn to_json(&self) -> String {
        match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode client bootstrap, dropping user consent: {}", e);
                let minimal = Self {
                    user_consent: EffectiveConsent::default(),
                    ..self.clone()
                };
                serde_json::to_string_pretty(&minimal).unwrap_or_else(|_| "{}".into())
            }
        }
    }

    /// Inline script that hands the settings to the client.
    pub fn to_init_script(&self) -> String {
        // Keep a `</script>` inside any configured string from closing the tag.
        let json = self.to_json().replace("</", "<\\/");
        format!(
            "var {var} = {json};\n{init}({var});",
            var = SETTINGS_VAR,
            json = json,
            init = INIT_CALL
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::{resolve_effective_consent, ConsentRecord};
    use gdprsetup_core::PolicyCategory;

    fn bootstrap() -> ClientBootstrap {
        let config = SiteConfig {
            privacy_page_route: "/privacy".into(),
            deny_redirection_target: "https://example.com/".into(),
            defer_info_popup_time: 3,
            consent_expires_time: 90,
            ..SiteConfig::default()
        };
        let categories = vec![PolicyCategory::new("ads", "img-src b.example", true)];
        let effective = resolve_effective_consent(&ConsentRecord::new(), &categories);
        ClientBootstrap::new(&config, &PolicyVersion::of("v1"), effective)
    }

    #[test]
    fn test_payload_fields() {
        let payload: serde_json::Value = serde_json::from_str(&bootstrap().to_json()).unwrap();
        let version = PolicyVersion::of("v1");

        assert_eq!(payload["setupPage"], "/privacy");
        assert_eq!(payload["setupConsent"], "Accept");
        assert_eq!(payload["denyConsent"], "Deny");
        assert_eq!(payload["cookieName"], version.cookie_name());
        assert_eq!(payload["policyVersion"], version.fingerprint);
        assert_eq!(payload["acceptBtnClass"], "btn btn-primary");
        assert_eq!(payload["denyBtnClass"], "btn btn-secondary");
        assert_eq!(payload["privacySettingsButtonClass"], "gdpr-privacy-settings");
        assert_eq!(payload["modalContentId"], "gdpr-privacy-modal");
        assert_eq!(payload["inputPrefix"], "gdpr_");
        assert_eq!(payload["denyRedirectionTarget"], "https://example.com/");
        assert_eq!(payload["deferInfoPopup"], 3);
        assert_eq!(payload["consentExpires"], 90);
        assert_eq!(payload["userConsent"]["ads"], true);
    }

    #[test]
    fn test_init_script() {
        let script = bootstrap().to_init_script();
        assert!(script.starts_with("var gdprPrivacySetupPluginSettings = {"));
        assert!(script.ends_with("gdprPrivacySetupPlugin.init(gdprPrivacySetupPluginSettings);"));
    }

    #[test]
    fn test_init_script_escapes_closing_tag() {
        let mut payload = bootstrap();
        payload.setup_consent = "</script><script>alert(1)</script>".into();
        let script = payload.to_init_script();
        assert!(!script.contains("</script>"));
        assert!(script.contains(r"<\/script>"));
    }
}
