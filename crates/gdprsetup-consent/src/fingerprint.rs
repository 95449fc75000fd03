//! Policy version tracking — fingerprints the privacy text and detects changes.
//!
//! The fingerprint names the consent cookie (`consent_<fingerprint>`), so a
//! changed policy makes every previously stored decision invisible and the
//! visitor is asked again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gdprsetup_core::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Prefix of the consent cookie name; the policy fingerprint follows it.
pub const COOKIE_PREFIX: &str = "consent_";

/// Compute the SHA-256 fingerprint of the policy text, hex encoded.
pub fn compute_fingerprint(policy_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(policy_text.as_bytes());
    hex::encode(hasher.finalize())
}

/// True when no fingerprint was stored or it no longer matches `current_text`.
pub fn has_policy_changed(stored: Option<&str>, current_text: &str) -> bool {
    match stored {
        Some(stored) => stored != compute_fingerprint(current_text),
        None => true,
    }
}

/// Persistence for the last seen policy fingerprint.
///
/// Writes must be idempotent: two requests that detect the same change may
/// both save the same value.
pub trait FingerprintStore: Send + Sync {
    /// Last persisted fingerprint, `None` if absent or unreadable.
    fn load(&self) -> Option<String>;
    /// Persist a new fingerprint.
    fn save(&self, fingerprint: &str) -> Result<()>;
}

/// In-process fingerprint store.
#[derive(Default)]
pub struct MemoryFingerprintStore {
    value: RwLock<Option<String>>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already persisted fingerprint.
    pub fn with_fingerprint(fingerprint: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(fingerprint.into())),
        }
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn load(&self) -> Option<String> {
        self.value.read().clone()
    }

    fn save(&self, fingerprint: &str) -> Result<()> {
        *self.value.write() = Some(fingerprint.to_string());
        Ok(())
    }
}

/// On-disk record written by [`FileFingerprintStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredFingerprint {
    fingerprint: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
}

/// Fingerprint store backed by a small JSON file.
pub struct FileFingerprintStore {
    path: PathBuf,
}

impl FileFingerprintStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FingerprintStore for FileFingerprintStore {
    fn load(&self) -> Option<String> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredFingerprint>(&data) {
            Ok(stored) => Some(stored.fingerprint),
            Err(e) => {
                warn!(
                    "Ignoring malformed fingerprint file {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn save(&self, fingerprint: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = StoredFingerprint {
            fingerprint: fingerprint.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&self.path, json)
            .map_err(|e| Error::Persistence(format!("{}: {}", self.path.display(), e)))
    }
}

/// The current policy version as seen by one refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyVersion {
    pub fingerprint: String,
    /// Whether the stored fingerprint was absent or different.
    pub changed: bool,
}

impl PolicyVersion {
    /// Version of `policy_text`, without consulting any store.
    pub fn of(policy_text: &str) -> Self {
        Self {
            fingerprint: compute_fingerprint(policy_text),
            changed: false,
        }
    }

    /// Name of the cookie that holds consent for this policy version.
    pub fn cookie_name(&self) -> String {
        format!("{}{}", COOKIE_PREFIX, self.fingerprint)
    }
}

/// Compares the policy text against the persisted fingerprint.
pub struct PolicyVersionTracker {
    store: Arc<dyn FingerprintStore>,
}

impl PolicyVersionTracker {
    pub fn new(store: Arc<dyn FingerprintStore>) -> Self {
        Self { store }
    }

    /// Whether `policy_text` differs from the persisted baseline.
    pub fn has_changed(&self, policy_text: &str) -> bool {
        has_policy_changed(self.store.load().as_deref(), policy_text)
    }

    /// Compute the current version and persist it if it changed.
    ///
    /// A failed save is logged and otherwise ignored; the next refresh will
    /// see the stale value and try again.
    pub fn refresh(&self, policy_text: &str) -> PolicyVersion {
        let fingerprint = compute_fingerprint(policy_text);
        let stored = self.store.load();
        let changed = stored.as_deref() != Some(fingerprint.as_str());

        if changed {
            match self.store.save(&fingerprint) {
                Ok(()) => info!(
                    "Privacy policy version changed: {} -> {}",
                    stored.as_deref().unwrap_or("<none>"),
                    fingerprint
                ),
                Err(e) => warn!("Failed to persist policy fingerprint: {}", e),
            }
        } else {
            debug!("Privacy policy version unchanged: {}", fingerprint);
        }

        PolicyVersion {
            fingerprint,
            changed,
        }
    }
}
