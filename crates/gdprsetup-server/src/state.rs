//! Shared application state.

use std::sync::Arc;

use gdprsetup_consent::{
    ConsentEvaluator, FileFingerprintStore, FingerprintStore, PolicyVersion, PolicyVersionTracker,
};
use gdprsetup_core::{ServerConfig, SiteConfig};
use parking_lot::RwLock;
use tracing::info;

/// Site configuration together with everything derived from it at load time.
pub struct SiteState {
    pub config: SiteConfig,
    pub version: PolicyVersion,
    pub evaluator: ConsentEvaluator,
}

impl SiteState {
    fn build(config: SiteConfig, tracker: &PolicyVersionTracker) -> Self {
        let version = tracker.refresh(&config.privacy_info);
        let evaluator = ConsentEvaluator::new(config.consent_policy_list.clone());
        Self {
            config,
            version,
            evaluator,
        }
    }

    pub fn cookie_name(&self) -> String {
        self.version.cookie_name()
    }
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub tracker: PolicyVersionTracker,
    site: RwLock<Arc<SiteState>>,
}

impl AppState {
    /// State backed by the files in the configured data directory.
    pub fn new(config: ServerConfig) -> Self {
        let store = FileFingerprintStore::new(&config.data_paths.policy_version_file);
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: ServerConfig, store: Arc<dyn FingerprintStore>) -> Self {
        let tracker = PolicyVersionTracker::new(store);
        let site = SiteState::build(
            SiteConfig::load(&config.data_paths.site_config_file),
            &tracker,
        );
        info!(
            "Loaded site config: {} categories, policy version {}",
            site.config.categories().len(),
            site.version.fingerprint
        );

        Self {
            config,
            tracker,
            site: RwLock::new(Arc::new(site)),
        }
    }

    /// Current site state. Handlers hold the snapshot, never the lock.
    pub fn site(&self) -> Arc<SiteState> {
        self.site.read().clone()
    }

    /// Re-read the site config from disk and refresh the policy version.
    pub fn reload(&self) -> Arc<SiteState> {
        let config = SiteConfig::load(&self.config.data_paths.site_config_file);
        let site = Arc::new(SiteState::build(config, &self.tracker));
        *self.site.write() = site.clone();
        info!("Reloaded site config, policy version {}", site.version.fingerprint);
        site
    }
}
