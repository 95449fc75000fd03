//! Admin routes — reload the site config and refresh the policy version.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/policy-version/refresh", post(refresh_policy_version))
}

/// POST /api/admin/policy-version/refresh
async fn refresh_policy_version(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let site = state.reload();
    Json(serde_json::json!({
        "policyVersion": site.version.fingerprint,
        "cookieName": site.cookie_name(),
        "changed": site.version.changed,
        "categories": site.evaluator.categories().len(),
    }))
}
