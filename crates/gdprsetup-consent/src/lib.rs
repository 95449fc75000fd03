//! Consent engine — policy fingerprinting, consent reconciliation, CSP compilation.
//!
//! Fingerprints the privacy text to name the consent cookie, reconciles the
//! visitor's stored choices with the configured category defaults, and
//! compiles the granted categories into a Content-Security-Policy value.
//! Page metadata and the client bootstrap payload are built from the result.

pub mod bootstrap;
pub mod consent;
pub mod cookie;
pub mod csp;
pub mod fingerprint;
pub mod metadata;

pub use bootstrap::ClientBootstrap;
pub use consent::{
    default_consents, encode_consent, parse_stored_consent, resolve_effective_consent,
    try_parse_stored_consent, ConsentEvaluator, ConsentRecord, EffectiveConsent, EmptyReason,
    EncodedConsent, Evaluation, StoredConsent,
};
pub use cookie::{find_cookie, ConsentCookie};
pub use csp::{compile_csp, compile_header_csp, CSP_HEADER};
pub use fingerprint::{
    compute_fingerprint, has_policy_changed, FileFingerprintStore, FingerprintStore,
    MemoryFingerprintStore, PolicyVersion, PolicyVersionTracker,
};
pub use gdprsetup_core::PolicyCategory;
pub use metadata::PageMetadata;
