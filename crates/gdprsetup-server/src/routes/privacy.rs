//! Built-in privacy information page.
//!
//! Served for the configured privacy route when nothing else answers it, so
//! the consent popup always has a page to link to.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::routes::consent::{evaluate_request, insert_csp};
use crate::state::AppState;

/// Router fallback: the privacy text for the privacy route, 404 elsewhere.
///
/// The page is read-only; other methods on the privacy route get 405.
pub async fn privacy_page(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let site = state.site();
    if !site.config.is_privacy_route(uri.path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, HeaderValue::from_static("GET, HEAD"))],
        )
            .into_response();
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/markdown; charset=utf-8"),
    );
    if site.config.enabled {
        let evaluation = evaluate_request(&site, &headers);
        insert_csp(&mut response_headers, &evaluation);
    }

    (response_headers, site.config.privacy_info.clone()).into_response()
}
