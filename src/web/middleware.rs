//! Request middleware: per-IP rate limiting, access-key verification for the
//! keyed routes, and HTTP Basic admin authentication for key management.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use tracing::warn;

use super::response_types::ApiError;
use super::AppState;
use crate::error::HoustonError;

/// The header carrying the tenant key on every authenticated request.
pub const ACCESS_KEY_HEADER: &str = "x-access-key";

pub(crate) fn access_key(headers: &HeaderMap) -> String {
    headers
        .get(ACCESS_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Reject requests from IPs that exceed the token bucket. Runs on every
/// route, including the status probe.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    if let Some(ip) = ip {
        if !state.limiter.allow(ip) {
            warn!(%ip, "client has made too many requests; rate limiting");
            return ApiError(HoustonError::TooManyRequests).into_response();
        }
    }
    next.run(request).await
}

/// Verify the access key before any keyed route runs: present, not a
/// reserved name, and known to the store.
pub async fn check_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = access_key(request.headers());
    match state.api.check_key(&key).await {
        Ok(()) => next.run(request).await,
        Err(e) => ApiError(e).into_response(),
    }
}

/// Admin routes require HTTP Basic credentials with username `admin` unless
/// the server runs without a password.
pub async fn check_admin_password(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.api.admin_protected() {
        return next.run(request).await;
    }

    let Some((username, password)) = basic_credentials(request.headers()) else {
        return ApiError(HoustonError::BadCredentials).into_response();
    };
    match state.api.verify_admin(&username, &password) {
        Ok(()) => next.run(request).await,
        Err(e) => ApiError(e).into_response(),
    }
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
