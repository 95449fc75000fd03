//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::category::{deserialize_categories, PolicyCategory};
use crate::error::Result;

pub const DEFAULT_PORT: u16 = 3010;
pub const DEFAULT_PRIVACY_ROUTE: &str = "/privacy-info";
pub const DEFAULT_CONSENT_EXPIRES_DAYS: u32 = 365;

/// Paths to the files the server keeps in its data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Site / plugin options (`data/site.json`).
    pub site_config_file: PathBuf,
    /// Last persisted policy fingerprint (`data/policy-version.json`).
    pub policy_version_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            site_config_file: root.join("site.json"),
            policy_version_file: root.join("policy-version.json"),
            root,
        })
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
}

impl ServerConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            port,
            data_paths: DataPaths::new(data_dir)?,
        })
    }
}

/// Site-level privacy options, persisted as `site.json`.
///
/// Keys follow the original plugin option names so existing exports load
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_privacy_route")]
    pub privacy_page_route: String,
    /// Full privacy policy text. Its fingerprint names the consent cookie.
    #[serde(rename = "privacyInfo", default)]
    pub privacy_info: String,
    #[serde(
        rename = "consentPolicyList",
        default,
        deserialize_with = "deserialize_categories"
    )]
    pub consent_policy_list: Vec<PolicyCategory>,
    #[serde(rename = "consentButtonText", default = "default_accept_text")]
    pub consent_button_text: String,
    #[serde(rename = "consentButtonClass", default = "default_accept_class")]
    pub consent_button_class: String,
    #[serde(rename = "denyButtonText", default = "default_deny_text")]
    pub deny_button_text: String,
    #[serde(rename = "denyButtonClass", default = "default_deny_class")]
    pub deny_button_class: String,
    #[serde(rename = "privacySettingsBtnClass", default = "default_settings_class")]
    pub privacy_settings_btn_class: String,
    #[serde(rename = "inputPrefix", default = "default_input_prefix")]
    pub input_prefix: String,
    #[serde(rename = "modalWindowId", default = "default_modal_id")]
    pub modal_window_id: String,
    #[serde(rename = "denyRedirectionTarget", default)]
    pub deny_redirection_target: String,
    /// Seconds before the consent popup is shown.
    #[serde(rename = "deferInfoPopupTime", default)]
    pub defer_info_popup_time: u64,
    /// Consent cookie lifetime in days.
    #[serde(rename = "consentExpiresTime", default = "default_expires")]
    pub consent_expires_time: u32,
    /// Path to config file (not serialized).
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_true() -> bool {
    true
}
fn default_privacy_route() -> String {
    DEFAULT_PRIVACY_ROUTE.into()
}
fn default_accept_text() -> String {
    "Accept".into()
}
fn default_accept_class() -> String {
    "btn btn-primary".into()
}
fn default_deny_text() -> String {
    "Deny".into()
}
fn default_deny_class() -> String {
    "btn btn-secondary".into()
}
fn default_settings_class() -> String {
    "gdpr-privacy-settings".into()
}
fn default_input_prefix() -> String {
    "gdpr_".into()
}
fn default_modal_id() -> String {
    "gdpr-privacy-modal".into()
}
fn default_expires() -> u32 {
    DEFAULT_CONSENT_EXPIRES_DAYS
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            privacy_page_route: default_privacy_route(),
            privacy_info: String::new(),
            consent_policy_list: Vec::new(),
            consent_button_text: default_accept_text(),
            consent_button_class: default_accept_class(),
            deny_button_text: default_deny_text(),
            deny_button_class: default_deny_class(),
            privacy_settings_btn_class: default_settings_class(),
            input_prefix: default_input_prefix(),
            modal_window_id: default_modal_id(),
            deny_redirection_target: String::new(),
            defer_info_popup_time: 0,
            consent_expires_time: DEFAULT_CONSENT_EXPIRES_DAYS,
            config_path: PathBuf::new(),
        }
    }
}

impl SiteConfig {
    /// Load config from a JSON file, or return defaults.
    ///
    /// A missing file is the normal first-run case; a malformed one is
    /// logged and replaced by defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config = match Self::try_load(config_path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(
                    "Ignoring unreadable site config {}: {}",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        };
        config.config_path = config_path.to_path_buf();
        config
    }

    /// Load config, distinguishing "no file" (`Ok(None)`) from a broken file.
    pub fn try_load(config_path: &Path) -> Result<Option<Self>> {
        let data = match std::fs::read_to_string(config_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut config = Self::from_json_str(&data)?;
        config.config_path = config_path.to_path_buf();
        Ok(Some(config))
    }

    /// Parse site options. Keys set to `null` (blank options in an export)
    /// fall back to their defaults like missing keys do.
    pub fn from_json_str(data: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(data)?;
        if let serde_json::Value::Object(options) = &mut value {
            options.retain(|key, option| {
                if option.is_null() {
                    debug!("Site option {} is null, using default", key);
                }
                !option.is_null()
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved site config to {}", self.config_path.display());
        Ok(())
    }

    /// Write a default `site.json` at `config_path` unless one exists.
    /// Returns whether a file was written.
    pub fn init(config_path: &Path) -> Result<bool> {
        if config_path.exists() {
            info!("Site config already exists at {}", config_path.display());
            return Ok(false);
        }
        let config = Self {
            config_path: config_path.to_path_buf(),
            ..Self::default()
        };
        config.save()?;
        Ok(true)
    }

    /// Configured categories, in declaration order.
    pub fn categories(&self) -> &[PolicyCategory] {
        &self.consent_policy_list
    }

    /// Whether `path` is the configured privacy information route.
    pub fn is_privacy_route(&self, path: &str) -> bool {
        let route = self.privacy_page_route.trim_end_matches('/');
        !route.is_empty() && route == path.trim_end_matches('/')
    }
}
