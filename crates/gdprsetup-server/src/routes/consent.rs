//! Consent evaluation routes — CSP header, consent cookie, client bootstrap.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use gdprsetup_consent::{
    find_cookie, ClientBootstrap, ConsentCookie, EmptyReason, Evaluation, PageMetadata,
};
use tracing::{debug, warn};

use crate::state::{AppState, SiteState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/consent", get(evaluate_consent))
        .route("/consent/bootstrap.js", get(bootstrap_script))
        .route("/consent/categories", get(list_categories))
        .route("/consent/status", get(consent_status))
}

// ---------------------------------------------------------------
// Helpers shared with the privacy page
// ---------------------------------------------------------------

/// Evaluate the consent cookie sent with this request.
pub(crate) fn evaluate_request(site: &SiteState, headers: &HeaderMap) -> Evaluation {
    let cookie_name = site.cookie_name();
    let raw = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| find_cookie(value, &cookie_name));
    site.evaluator.evaluate(raw.as_deref())
}

/// Add the `Content-Security-Policy` header from the header-safe policy.
///
/// The header is never left out: a value that still fails to encode falls
/// back to the deny-all `;`.
pub(crate) fn insert_csp(headers: &mut HeaderMap, evaluation: &Evaluation) {
    let value = HeaderValue::from_str(&evaluation.header_csp).unwrap_or_else(|e| {
        warn!("Compiled CSP is not a valid header value, denying all: {}", e);
        HeaderValue::from_static(";")
    });
    headers.insert(header::CONTENT_SECURITY_POLICY, value);
}

fn stored_consent_label(reason: Option<&EmptyReason>) -> &'static str {
    match reason {
        None => "parsed",
        Some(EmptyReason::Absent) => "absent",
        Some(EmptyReason::Malformed(_)) => "malformed",
    }
}

// ---------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------

/// GET /api/consent — evaluate the visitor's stored consent.
async fn evaluate_consent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let site = state.site();
    let mut response_headers = HeaderMap::new();

    if !site.config.enabled {
        return (
            response_headers,
            Json(serde_json::json!({ "enabled": false })),
        );
    }

    let evaluation = evaluate_request(&site, &headers);
    insert_csp(&mut response_headers, &evaluation);

    // Only a visitor who already decided gets the cookie renewed; writing
    // defaults for everyone else would suppress the consent prompt.
    if evaluation.empty_reason.is_none() {
        let cookie = ConsentCookie::for_consent(
            &site.version,
            &evaluation.effective,
            site.config.consent_expires_time,
        );
        match HeaderValue::from_str(&cookie.to_set_cookie(chrono::Utc::now())) {
            Ok(value) => {
                response_headers.insert(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Consent cookie is not a valid header value: {}", e),
        }
    } else {
        debug!(
            "No usable consent cookie: {}",
            stored_consent_label(evaluation.empty_reason.as_ref())
        );
    }

    let metadata = PageMetadata::for_csp(evaluation.csp.clone());
    (
        response_headers,
        Json(serde_json::json!({
            "enabled": true,
            "cookieName": site.cookie_name(),
            "policyVersion": site.version.fingerprint,
            "policyChangedAtLoad": site.version.changed,
            "consentRequired": evaluation.empty_reason.is_some(),
            "storedConsent": stored_consent_label(evaluation.empty_reason.as_ref()),
            "effectiveConsent": evaluation.effective,
            "csp": evaluation.csp,
            "metadata": metadata.to_entry(),
            "metaTag": metadata.to_meta_tag(),
        })),
    )
}

/// GET /api/consent/bootstrap.js — inline settings for the client script.
async fn bootstrap_script(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let site = state.site();
    if !site.config.enabled {
        return StatusCode::NO_CONTENT.into_response();
    }

    let evaluation = evaluate_request(&site, &headers);
    let bootstrap = ClientBootstrap::new(&site.config, &site.version, evaluation.effective);
    (
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        bootstrap.to_init_script(),
    )
        .into_response()
}

/// GET /api/consent/categories — configured categories, in order.
async fn list_categories(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let site = state.site();
    let categories = site.evaluator.categories();
    Json(serde_json::json!({
        "categories": categories,
        "defaults": site.evaluator.defaults(),
        "count": categories.len(),
    }))
}

/// GET /api/consent/status
async fn consent_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let site = state.site();
    Json(serde_json::json!({
        "enabled": site.config.enabled,
        "policyVersion": site.version.fingerprint,
        "policyChangedAtLoad": site.version.changed,
        "cookieName": site.cookie_name(),
        "privacyPageRoute": site.config.privacy_page_route,
        "categories": site.evaluator.categories().len(),
    }))
}
